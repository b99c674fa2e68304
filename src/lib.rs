pub mod commands;
pub mod config;
pub mod error;
pub mod query;
pub mod registry;
pub mod server;
pub mod state;
pub mod store;
pub mod web;
