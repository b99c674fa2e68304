pub mod check;
pub mod import;

pub use check::run_config_check;
pub use import::run_import;
