//! Version check
//!
//! Fetches the releases page on a background thread, extracts the newest
//! tag, and posts a command back to the tick loop when it beats the running
//! version. Every failure mode is a debug log followed by silence.

use regex::Regex;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::constants::net;
use crate::error::UpdateError;
use crate::tray::PetCommand;

/// Fire-and-forget check; the result, if any, arrives as
/// [`PetCommand::UpdateAvailable`] on the command channel.
pub fn spawn_check(sender: Sender<PetCommand>, current_version: &str) {
    let current = current_version.to_string();
    let _ = thread::Builder::new()
        .name("update-check".into())
        .spawn(move || match fetch_latest_version() {
            Ok(latest) => {
                if version_greater_than(&latest, &current) {
                    let _ = sender.send(PetCommand::UpdateAvailable(latest));
                } else {
                    debug!(latest = %latest, current = %current, "already up to date");
                }
            }
            Err(err) => debug!(error = %err, "update check skipped"),
        });
}

fn fetch_latest_version() -> Result<String, UpdateError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(net::HTTP_TIMEOUT_SECS))
        .user_agent(net::USER_AGENT)
        .build()?;
    let body = client
        .get(net::RELEASES_URL)
        .send()?
        .error_for_status()?
        .text()?;
    latest_tag(&body).ok_or(UpdateError::NoVersionFound)
}

/// First release tag on the page; the releases feed lists newest first
fn latest_tag(body: &str) -> Option<String> {
    let pattern = Regex::new(net::TAG_PATTERN).expect("tag pattern compiles");
    pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|tag| tag.as_str().to_string())
}

/// Split a `v1.2.3`-ish tag into numeric parts; non-numeric tags compare
/// as empty and therefore never win.
fn normalize_version(version: &str) -> Vec<u32> {
    version
        .trim_start_matches('v')
        .split('.')
        .map_while(|part| part.parse().ok())
        .collect()
}

/// Numeric comparison with zero-padding, so `v1.10` beats `v1.9` and
/// `v1.2` equals `v1.2.0`.
pub fn version_greater_than(a: &str, b: &str) -> bool {
    let mut left = normalize_version(a);
    let mut right = normalize_version(b);
    if left.is_empty() || right.is_empty() {
        return false;
    }
    let len = left.len().max(right.len());
    left.resize(len, 0);
    right.resize(len, 0);
    left > right
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_patch_wins() {
        assert!(version_greater_than("v1.0.2", "v1.0.1"));
        assert!(!version_greater_than("v1.0.1", "v1.0.2"));
    }

    #[test]
    fn numeric_compare_beats_lexicographic() {
        assert!(version_greater_than("v1.10.0", "v1.9.9"));
    }

    #[test]
    fn short_versions_pad_with_zeros() {
        assert!(!version_greater_than("v1.2", "v1.2.0"));
        assert!(version_greater_than("v1.2.1", "v1.2"));
    }

    #[test]
    fn unparseable_versions_never_win() {
        assert!(!version_greater_than("dev", "v1.0.0"));
        assert!(!version_greater_than("v2.0.0", "dev"));
    }

    #[test]
    fn tag_is_extracted_from_release_page_markup() {
        let body = r#"
            <a href="/scamper-pet/scamper/releases/tag/v0.4.1">v0.4.1</a>
            <a href="/scamper-pet/scamper/releases/tag/v0.4.0">v0.4.0</a>
        "#;
        assert_eq!(latest_tag(body).as_deref(), Some("v0.4.1"));
    }

    #[test]
    fn page_without_tags_yields_none() {
        assert_eq!(latest_tag("<html><body>nothing here</body></html>"), None);
    }
}
