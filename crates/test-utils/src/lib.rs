#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Agora composer test utilities.
//!
//! Helpers for integration testing: fixtures, recording collaborators,
//! gated fakes for ordering tests, and an in-process HTTP server that
//! mimics the community API.

pub mod mocks;
pub mod server;

use std::collections::HashMap;

use agora_composer::ComposerConfig;
use agora_composer::block::RawBlock;
use agora_composer::upload::LocalFile;
use serde_json::json;

pub use mocks::{
    GatedHost, HttpComposer, MockLinkPreview, MockPostClient, MockUploader, RecordingNotifier,
    TestComposer,
};
pub use server::TestServer;

/// Path the composer is shown on in tests.
pub const SUBMIT_PATH: &str = "/c/sample/submit";

/// Where a successful submission from [`SUBMIT_PATH`] lands.
pub const COMMUNITY_PATH: &str = "/c/sample";

/// Default configuration pointed at `api_url`.
pub fn test_config(api_url: &str) -> ComposerConfig {
    ComposerConfig::from_vars(&HashMap::from([(
        "AGORA_API_URL".to_string(),
        api_url.to_string(),
    )]))
    .unwrap()
}

/// A header block as a surface would emit it.
pub fn header_block(text: &str, level: u8) -> RawBlock {
    RawBlock::new("header", json!({ "text": text, "level": level }))
}

/// A paragraph block as a surface would emit it.
pub fn paragraph_block(text: &str) -> RawBlock {
    RawBlock::new("paragraph", json!({ "text": text }))
}

/// Smallest bytes `infer` recognizes as a PNG.
pub fn png_bytes() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ]
}

/// A PNG file selected in an image block.
pub fn png_file(name: &str) -> LocalFile {
    LocalFile::new(name, png_bytes())
}

/// Assertion helpers.
pub mod assert {
    use agora_composer::notify::{Notification, NotificationKind};

    /// Assert that exactly one notification was shown and it has `kind`.
    pub fn single_notification(notifications: &[Notification], kind: NotificationKind) {
        assert_eq!(
            notifications.len(),
            1,
            "Expected exactly one notification, got: {notifications:?}"
        );
        assert_eq!(notifications[0].kind, kind, "Unexpected kind: {notifications:?}");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }
}
