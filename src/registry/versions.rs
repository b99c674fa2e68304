//! Version selection over a plugin's embedded `versions` array.
//!
//! The array is kept newest first by whoever writes it; nothing here sorts.
//!
//! Two policies live side by side:
//! - [`select`] (plugin detail) keeps the LAST version matching a channel or
//!   version string.
//! - [`summarize`] (bulk update check) keeps the FIRST version of each
//!   channel.
//!
//! The two disagree when a channel has more than one version. Both behaviours
//! are relied on by API clients, so they are kept as they are.

use super::types::{Channel, Version, VersionRequest, VersionSummary};

pub fn select(versions: &[Version], request: &VersionRequest) -> Vec<Version> {
    let picked = match request {
        VersionRequest::Latest => versions.first(),
        VersionRequest::Channel(channel) => versions
            .iter()
            .filter(|v| v.channel() == Some(*channel))
            .last(),
        VersionRequest::Exact(wanted) => versions.iter().filter(|v| &v.version == wanted).last(),
    };

    picked.cloned().into_iter().collect()
}

/// Newest version string plus the first version of each channel.
/// Channel types are matched exactly as stored (`Release`, `Beta`, `Alpha`).
/// `None` for an empty version list.
pub fn summarize(versions: &[Version]) -> Option<VersionSummary> {
    let latest = versions.first()?;

    let first_of = |channel: Channel| {
        versions
            .iter()
            .find(|v| v.kind == channel.stored_name())
            .map(|v| v.version.clone())
    };

    Some(VersionSummary {
        latest: latest.version.clone(),
        release: first_of(Channel::Release),
        beta: first_of(Channel::Beta),
        alpha: first_of(Channel::Alpha),
    })
}
