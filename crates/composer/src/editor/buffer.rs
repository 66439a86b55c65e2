//! In-process surface backed by a block buffer.
//!
//! Used by the CLI and by tests: blocks are appended programmatically, image
//! and link blocks go through the same tool configuration a live surface
//! would use.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::block::RawBlock;
use crate::tools::ToolRegistry;
use crate::upload::LocalFile;

use super::surface::{EDITOR_HOLDER, MountOptions, SavedOutput, Surface, SurfaceHost};

/// Version string reported in saved output.
pub const BUFFER_VERSION: &str = concat!("agora-buffer/", env!("CARGO_PKG_VERSION"));

/// A surface holding its blocks in memory.
pub struct BufferSurface {
    holder: String,
    placeholder: String,
    tools: Arc<ToolRegistry>,
    blocks: Mutex<Vec<RawBlock>>,
    destroyed: AtomicBool,
}

impl BufferSurface {
    fn mount(options: MountOptions) -> Self {
        Self {
            holder: options.holder,
            placeholder: options.placeholder,
            tools: options.tools,
            blocks: Mutex::new(options.data.blocks),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Append a block. Returns its id.
    pub fn insert(&self, tool: &str, data: Value) -> anyhow::Result<String> {
        let id = Uuid::now_v7().simple().to_string();
        self.push(RawBlock::new(tool, data).with_id(id.clone()))?;
        Ok(id)
    }

    /// Append blocks loaded from elsewhere, keeping their ids.
    pub fn load(&self, blocks: Vec<RawBlock>) -> anyhow::Result<()> {
        for block in blocks {
            self.push(block)?;
        }
        Ok(())
    }

    fn push(&self, block: RawBlock) -> anyhow::Result<()> {
        if self.is_destroyed() {
            bail!("surface destroyed");
        }
        if !self
            .tools
            .get(&block.tool)
            .is_some_and(|tool| tool.emits_blocks())
        {
            bail!("no block tool named '{}'", block.tool);
        }
        debug!(tool = %block.tool, "block inserted");
        self.blocks.lock().push(block);
        Ok(())
    }

    /// Remove a block by id.
    pub fn remove(&self, id: &str) -> bool {
        let mut blocks = self.blocks.lock();
        let before = blocks.len();
        blocks.retain(|b| b.id.as_deref() != Some(id));
        blocks.len() != before
    }

    pub fn blocks(&self) -> Vec<RawBlock> {
        self.blocks.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }

    /// Upload a file through the image tool and add an image block for it.
    ///
    /// An upload failure stays with this call; no block is added.
    pub async fn attach_image(&self, file: LocalFile) -> anyhow::Result<String> {
        let name = file.name.clone();
        let uploaded = self
            .tools
            .upload_image(file)
            .await
            .with_context(|| format!("failed to upload {name}"))?;
        self.insert("image", image_data(&uploaded.resource_url))
    }

    /// Add an image block for an already-hosted image.
    pub async fn attach_image_url(&self, url: &str) -> anyhow::Result<String> {
        let uploader = self
            .tools
            .uploader()
            .context("image tool has no uploader")?;
        let uploaded = uploader.upload_by_url(url).await?;
        self.insert("image", image_data(&uploaded.resource_url))
    }

    /// Add a link block, with preview metadata when the endpoint has any.
    pub async fn attach_link(&self, link: &str) -> anyhow::Result<String> {
        let meta = self.tools.link_meta(link).await.unwrap_or_default();
        self.insert("linkTool", json!({ "link": link, "meta": meta }))
    }
}

fn image_data(url: &str) -> Value {
    json!({
        "file": { "url": url },
        "caption": "",
        "withBorder": false,
        "withBackground": false,
        "stretched": false,
    })
}

#[async_trait]
impl Surface for BufferSurface {
    async fn save(&self) -> anyhow::Result<SavedOutput> {
        if self.is_destroyed() {
            bail!("surface destroyed");
        }
        Ok(SavedOutput {
            time: Some(Utc::now().timestamp_millis()),
            blocks: self.blocks(),
            version: Some(BUFFER_VERSION.to_string()),
        })
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            self.blocks.lock().clear();
            debug!(holder = %self.holder, "buffer surface destroyed");
        }
    }
}

/// Mounts [`BufferSurface`]s on a fixed set of holders.
pub struct BufferHost {
    holders: HashSet<String>,
    surfaces: Mutex<Vec<Arc<BufferSurface>>>,
}

impl BufferHost {
    /// A host exposing the composer's default holder.
    pub fn new() -> Self {
        Self::with_holders([EDITOR_HOLDER])
    }

    pub fn with_holders<I, S>(holders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            holders: holders.into_iter().map(Into::into).collect(),
            surfaces: Mutex::new(Vec::new()),
        }
    }

    /// Every surface mounted so far, destroyed or not.
    pub fn surfaces(&self) -> Vec<Arc<BufferSurface>> {
        self.surfaces.lock().clone()
    }

    /// Number of surfaces not yet destroyed.
    pub fn live_surfaces(&self) -> usize {
        self.surfaces
            .lock()
            .iter()
            .filter(|s| !s.is_destroyed())
            .count()
    }

    /// The most recent live surface.
    pub fn surface(&self) -> Option<Arc<BufferSurface>> {
        self.surfaces
            .lock()
            .iter()
            .rev()
            .find(|s| !s.is_destroyed())
            .cloned()
    }
}

impl Default for BufferHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SurfaceHost for BufferHost {
    async fn mount(&self, options: MountOptions) -> anyhow::Result<Arc<dyn Surface>> {
        if !self.holders.contains(&options.holder) {
            bail!("mount point '{}' not found", options.holder);
        }
        let surface = Arc::new(BufferSurface::mount(options));
        self.surfaces.lock().push(surface.clone());
        debug!(holder = %surface.holder, "buffer surface mounted");
        Ok(surface)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn options() -> MountOptions {
        MountOptions::new(Arc::new(ToolRegistry::new()))
    }

    #[tokio::test]
    async fn mount_uses_options() {
        let host = BufferHost::new();
        host.mount(options()).await.unwrap();
        let surface = host.surface().unwrap();
        assert_eq!(surface.holder(), "editor");
        assert_eq!(surface.placeholder(), "Type something awesome! .. ");
        assert!(surface.is_empty());
    }

    #[tokio::test]
    async fn unknown_holder_fails() {
        let host = BufferHost::with_holders(["other"]);
        let err = host.mount(options()).await.err().unwrap();
        assert!(err.to_string().contains("mount point 'editor' not found"));
    }

    #[tokio::test]
    async fn unregistered_tool_is_rejected() {
        let host = BufferHost::new();
        host.mount(options()).await.unwrap();
        let surface = host.surface().unwrap();
        let err = surface.insert("paragraph", json!({ "text": "x" })).unwrap_err();
        assert!(err.to_string().contains("no block tool named 'paragraph'"));
    }

    #[tokio::test]
    async fn destroyed_surface_refuses_to_save() {
        let host = BufferHost::new();
        let surface = host.mount(options()).await.unwrap();
        surface.destroy();
        surface.destroy();
        assert!(surface.save().await.is_err());
        assert_eq!(host.live_surfaces(), 0);
        assert!(host.surface().is_none());
    }
}
