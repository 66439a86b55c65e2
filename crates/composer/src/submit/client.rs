//! Post creation transport.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::block::EditorOutput;
use crate::error::SubmitError;
use crate::form::CommunityId;
use crate::http::ApiClient;

/// Post creation endpoint, relative to the API base.
pub const CREATE_POST_PATH: &str = "/api/community/post/create";

/// Body of the create call: `{ title, content, communityId }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCreationRequest {
    pub title: String,
    pub content: EditorOutput,
    pub community_id: CommunityId,
}

/// What the transport reports back to the pipeline.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// The server accepted the post. Carries the (opaque) response body.
    Success(Value),
    Failure(SubmitError),
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success(_))
    }
}

/// Sends a post to the backend. One call, no retry.
#[async_trait]
pub trait PostClient: Send + Sync {
    async fn create_post(&self, request: &PostCreationRequest) -> SubmissionOutcome;
}

/// [`PostClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPostClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpPostClient {
    pub fn new(api: &ApiClient) -> anyhow::Result<Self> {
        let endpoint = api
            .endpoint(CREATE_POST_PATH)
            .context("invalid post creation endpoint")?;
        Ok(Self {
            client: api.client().clone(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, request: &PostCreationRequest) -> Result<Value, SubmitError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SubmitError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // The body is opaque: keep JSON when it parses, the raw text otherwise.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[async_trait]
impl PostClient for HttpPostClient {
    async fn create_post(&self, request: &PostCreationRequest) -> SubmissionOutcome {
        debug!(endpoint = %self.endpoint, community = %request.community_id, "creating post");
        match self.send(request).await {
            Ok(body) => SubmissionOutcome::Success(body),
            Err(e) => {
                warn!(error = %e, "post creation failed");
                SubmissionOutcome::Failure(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::block::{Block, BlockKind, HeaderData};
    use crate::config::ComposerConfig;

    #[test]
    fn request_uses_camel_case() {
        let request = PostCreationRequest {
            title: "Hello World".to_string(),
            content: EditorOutput {
                time: 1,
                blocks: vec![Block::new(BlockKind::Header(HeaderData {
                    text: "Hi".to_string(),
                    level: 2,
                    extra: Default::default(),
                }))],
                version: "2.28.2".to_string(),
            },
            community_id: CommunityId::new("c1"),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "title": "Hello World",
                "content": {
                    "time": 1,
                    "blocks": [{ "type": "header", "data": { "text": "Hi", "level": 2 } }],
                    "version": "2.28.2",
                },
                "communityId": "c1",
            })
        );
    }

    #[test]
    fn endpoint_is_resolved_against_api() {
        let api = ApiClient::new(&ComposerConfig::default()).unwrap();
        let client = HttpPostClient::new(&api).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:3000/api/community/post/create"
        );
    }
}
