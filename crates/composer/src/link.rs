//! Link metadata and link autocomplete lookups.
//!
//! Both are optional extras for the link tools: a failed lookup logs a
//! warning and yields nothing, it never blocks authoring.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::block::LinkMeta;

/// One autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSuggestion {
    pub name: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Transport used by the link tools. Endpoints come from tool configuration.
#[async_trait]
pub trait LinkPreview: Send + Sync {
    /// Fetch preview metadata for `link` from `endpoint?url=<link>`.
    async fn fetch_meta(&self, endpoint: &Url, link: &str) -> Option<LinkMeta>;

    /// Query `endpoint?<param>=<query>` for suggestions.
    async fn search(&self, endpoint: &Url, param: &str, query: &str) -> Vec<LinkSuggestion>;
}

/// `{ "success": 1, "meta": { ... } }`
#[derive(Debug, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    success: serde_json::Value,
    #[serde(default)]
    meta: LinkMeta,
}

impl MetaResponse {
    fn succeeded(&self) -> bool {
        match &self.success {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
            _ => false,
        }
    }
}

/// Link lookups over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLinkPreview {
    client: reqwest::Client,
}

impl HttpLinkPreview {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl LinkPreview for HttpLinkPreview {
    async fn fetch_meta(&self, endpoint: &Url, link: &str) -> Option<LinkMeta> {
        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair("url", link);

        match self.get_json::<MetaResponse>(url).await {
            Ok(response) if response.succeeded() => {
                debug!(link, "link metadata fetched");
                Some(response.meta)
            }
            Ok(_) => {
                warn!(link, "link metadata endpoint reported failure");
                None
            }
            Err(e) => {
                warn!(link, error = %e, "link metadata lookup failed");
                None
            }
        }
    }

    async fn search(&self, endpoint: &Url, param: &str, query: &str) -> Vec<LinkSuggestion> {
        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair(param, query);

        match self.get_json::<Vec<LinkSuggestion>>(url).await {
            Ok(items) => items,
            Err(e) => {
                warn!(query, error = %e, "link search failed");
                Vec::new()
            }
        }
    }
}
