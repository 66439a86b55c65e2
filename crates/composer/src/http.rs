//! Shared HTTP client for the community API.

use anyhow::{Context, Result};
use url::Url;

use crate::config::ComposerConfig;

/// A `reqwest` client bound to the community API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base: Url,
}

impl ApiClient {
    /// Build the client from configuration.
    pub fn new(config: &ComposerConfig) -> Result<Self> {
        let base = Url::parse(&config.api_url)
            .with_context(|| format!("AGORA_API_URL is not a valid URL: {}", config.api_url))?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, base })
    }

    /// Resolve a path (or absolute URL) against the API base.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_absolute_paths() {
        let api = ApiClient::new(&ComposerConfig {
            api_url: "http://localhost:4000".to_string(),
            ..ComposerConfig::default()
        })
        .unwrap();
        assert_eq!(
            api.endpoint("/api/community/post/create").unwrap().as_str(),
            "http://localhost:4000/api/community/post/create"
        );
        assert_eq!(
            api.endpoint("https://techcrunch.com/").unwrap().as_str(),
            "https://techcrunch.com/"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ApiClient::new(&ComposerConfig {
            api_url: "not a url".to_string(),
            ..ComposerConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("AGORA_API_URL"));
    }
}
