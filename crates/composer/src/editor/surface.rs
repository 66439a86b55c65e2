//! Block-editing surface interface.
//!
//! A surface is the live editing area blocks are authored in. Hosts mount a
//! surface on a named holder with a tool registry; the editor manager owns
//! the mounted surface until it is destroyed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::block::RawBlock;
use crate::tools::ToolRegistry;

/// Mount point the composer binds its surface to.
pub const EDITOR_HOLDER: &str = "editor";

/// Placeholder shown in an empty surface.
pub const PLACEHOLDER: &str = "Type something awesome! .. ";

/// What a surface returns from `save`, before tool validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Options handed to [`SurfaceHost::mount`].
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub holder: String,
    pub placeholder: String,
    pub inline_toolbar: bool,
    /// Initial content.
    pub data: SavedOutput,
    pub tools: Arc<ToolRegistry>,
}

impl MountOptions {
    /// Options for a fresh, empty composer surface.
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            holder: EDITOR_HOLDER.to_string(),
            placeholder: PLACEHOLDER.to_string(),
            inline_toolbar: true,
            data: SavedOutput::default(),
            tools,
        }
    }
}

/// A mounted editing surface.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Produce the current ordered blocks.
    async fn save(&self) -> anyhow::Result<SavedOutput>;

    /// Release the surface. Must be safe to call more than once.
    fn destroy(&self);
}

/// Something that can mount surfaces.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    /// Mount a surface. Resolves once the surface is ready for input.
    async fn mount(&self, options: MountOptions) -> anyhow::Result<Arc<dyn Surface>>;
}
