//! The document being authored.

use serde::{Deserialize, Serialize};

use crate::block::EditorOutput;
use crate::form::CommunityId;

/// Title plus content. `content` stays `None` until the editor has saved once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    pub content: Option<EditorOutput>,
    pub community_id: CommunityId,
}

impl Document {
    pub fn new(community_id: CommunityId) -> Self {
        Self {
            title: String::new(),
            content: None,
            community_id,
        }
    }

    pub fn block_count(&self) -> usize {
        self.content.as_ref().map_or(0, |c| c.blocks.len())
    }
}
