//! Configuration loaded from environment variables.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default highlight.js stylesheet handed to the code box tool.
pub const DEFAULT_CODE_THEME_URL: &str =
    "https://cdn.jsdelivr.net/gh/highlightjs/cdn-release@9.18.1/build/styles/dracula.min.css";

/// Composer configuration.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Base URL of the community API (default: http://localhost:3000).
    pub api_url: String,

    /// Upload endpoint path, relative to `api_url` (default: /api/uploadthing).
    pub upload_path: String,

    /// Link metadata endpoint used by the link tool (default: /api/link).
    pub link_metadata_path: String,

    /// Absolute URL queried by the inline link autocomplete.
    pub link_search_url: String,

    /// Query parameter carrying the autocomplete search term (default: search).
    pub link_query_param: String,

    /// Stylesheet for the code box tool.
    pub code_theme_url: String,

    /// Theme name for the code box tool (default: atom-one-dark).
    pub code_theme_name: String,

    /// Light/dark default for the code box language picker (default: light).
    pub code_default_theme: String,

    /// Largest file the image uploader will send (default: 4 MiB).
    pub max_upload_bytes: usize,

    /// Timeout applied to every HTTP call (default: 30s).
    pub http_timeout: Duration,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            upload_path: "/api/uploadthing".to_string(),
            link_metadata_path: "/api/link".to_string(),
            link_search_url: "https://techcrunch.com/".to_string(),
            link_query_param: "search".to_string(),
            code_theme_url: DEFAULT_CODE_THEME_URL.to_string(),
            code_theme_name: "atom-one-dark".to_string(),
            code_default_theme: "light".to_string(),
            max_upload_bytes: 4 * 1024 * 1024,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl ComposerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from a fixed set of variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_url = lookup("AGORA_API_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let upload_path = lookup("AGORA_UPLOAD_PATH").unwrap_or(defaults.upload_path);

        let link_metadata_path =
            lookup("AGORA_LINK_METADATA_PATH").unwrap_or(defaults.link_metadata_path);

        let link_search_url = lookup("AGORA_LINK_SEARCH_URL").unwrap_or(defaults.link_search_url);

        let link_query_param =
            lookup("AGORA_LINK_QUERY_PARAM").unwrap_or(defaults.link_query_param);

        let code_theme_url = lookup("AGORA_CODE_THEME_URL").unwrap_or(defaults.code_theme_url);

        let code_theme_name = lookup("AGORA_CODE_THEME_NAME").unwrap_or(defaults.code_theme_name);

        let code_default_theme =
            lookup("AGORA_CODE_DEFAULT_THEME").unwrap_or(defaults.code_default_theme);

        let max_upload_bytes = match lookup("AGORA_MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .context("AGORA_MAX_UPLOAD_BYTES must be a valid usize")?,
            None => defaults.max_upload_bytes,
        };

        let http_timeout = match lookup("AGORA_HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .context("AGORA_HTTP_TIMEOUT_SECS must be a valid u64")?,
            ),
            None => defaults.http_timeout,
        };

        Ok(Self {
            api_url,
            upload_path,
            link_metadata_path,
            link_search_url,
            link_query_param,
            code_theme_url,
            code_theme_name,
            code_default_theme,
            max_upload_bytes,
            http_timeout,
        })
    }
}
