//! Editor instance manager.
//!
//! Owns the single live surface of one composer. State machine:
//!
//! ```text
//! Absent -> Initializing -> Ready -> Destroyed
//!              \-> Absent (mount failed)      \-> Absent (reset)
//! ```
//!
//! State lives behind a `parking_lot::Mutex` that is never held across an
//! await. Every initialization gets a generation number; a mount that
//! resolves after its generation was superseded is destroyed on the spot.

pub mod buffer;
pub mod surface;

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::block::EditorOutput;
use crate::error::{ComposerError, ComposerResult};
use crate::tools::{ToolRegistry, ToolSettings};

pub use buffer::{BufferHost, BufferSurface};
pub use surface::{EDITOR_HOLDER, MountOptions, PLACEHOLDER, SavedOutput, Surface, SurfaceHost};

/// Lifecycle state of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Absent,
    Initializing,
    Ready,
    Destroyed,
}

/// The live surface together with the tools it was mounted with.
#[derive(Clone)]
pub struct EditorHandle {
    generation: u64,
    surface: Arc<dyn Surface>,
    tools: Arc<ToolRegistry>,
}

impl EditorHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }
}

impl fmt::Debug for EditorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorHandle")
            .field("generation", &self.generation)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

struct Inner {
    state: EditorState,
    generation: u64,
    handle: Option<EditorHandle>,
}

/// Creates, serializes and destroys the composer's surface.
pub struct EditorManager {
    host: Arc<dyn SurfaceHost>,
    settings: ToolSettings,
    inner: Mutex<Inner>,
}

impl EditorManager {
    pub fn new(host: Arc<dyn SurfaceHost>, settings: ToolSettings) -> Self {
        Self {
            host,
            settings,
            inner: Mutex::new(Inner {
                state: EditorState::Absent,
                generation: 0,
                handle: None,
            }),
        }
    }

    pub fn state(&self) -> EditorState {
        self.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EditorState::Ready
    }

    /// The live handle, if the editor is ready.
    pub fn handle(&self) -> Option<EditorHandle> {
        self.inner.lock().handle.clone()
    }

    /// Tools of the live surface.
    pub fn tools(&self) -> Option<Arc<ToolRegistry>> {
        self.inner.lock().handle.as_ref().map(|h| h.tools.clone())
    }

    /// Build the tool registry and mount the surface.
    ///
    /// A no-op while initializing or ready. Fails with
    /// [`ComposerError::EditorDestroyed`] once destroyed, including when
    /// `destroy` ran while this mount was in flight.
    pub async fn initialize(&self) -> ComposerResult<()> {
        let generation = {
            let mut inner = self.inner.lock();
            match inner.state {
                EditorState::Initializing | EditorState::Ready => {
                    debug!(state = ?inner.state, "editor already initialized");
                    return Ok(());
                }
                EditorState::Destroyed => return Err(ComposerError::EditorDestroyed),
                EditorState::Absent => {}
            }
            inner.generation += 1;
            inner.state = EditorState::Initializing;
            inner.generation
        };
        debug!(generation, "initializing editor");

        let tools = match ToolRegistry::standard(&self.settings) {
            Ok(tools) => Arc::new(tools),
            Err(e) => {
                self.abandon(generation);
                warn!(error = %e, "tool registry rejected");
                return Err(e);
            }
        };

        let surface = match self.host.mount(MountOptions::new(tools.clone())).await {
            Ok(surface) => surface,
            Err(e) => {
                self.abandon(generation);
                warn!(error = %e, "surface mount failed");
                return Err(ComposerError::Initialization(e));
            }
        };

        {
            let mut inner = self.inner.lock();
            if inner.generation == generation && inner.state == EditorState::Initializing {
                info!(generation, tools = tools.len(), "editor ready");
                inner.state = EditorState::Ready;
                inner.handle = Some(EditorHandle {
                    generation,
                    surface,
                    tools,
                });
                return Ok(());
            }
        }

        debug!(generation, "discarding surface mounted after destroy");
        surface.destroy();
        Err(ComposerError::EditorDestroyed)
    }

    /// Return to `Absent` after a failed initialization, unless the attempt
    /// was already superseded.
    fn abandon(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == EditorState::Initializing {
            inner.state = EditorState::Absent;
        }
    }

    /// Save the surface and run its blocks through the tool registry.
    pub async fn serialize(&self) -> ComposerResult<EditorOutput> {
        let handle = {
            let inner = self.inner.lock();
            match (inner.state, &inner.handle) {
                (EditorState::Ready, Some(handle)) => handle.clone(),
                _ => return Err(ComposerError::EditorNotReady),
            }
        };

        let saved = handle.surface.save().await.map_err(ComposerError::Save)?;
        let blocks = handle.tools.serialize_blocks(saved.blocks)?;
        debug!(blocks = blocks.len(), "editor serialized");

        Ok(EditorOutput {
            time: saved.time.unwrap_or_else(|| Utc::now().timestamp_millis()),
            blocks,
            version: saved.version.unwrap_or_default(),
        })
    }

    /// Release the surface. A no-op when absent or already destroyed.
    pub fn destroy(&self) {
        let handle = {
            let mut inner = self.inner.lock();
            match inner.state {
                EditorState::Absent | EditorState::Destroyed => return,
                EditorState::Initializing | EditorState::Ready => {}
            }
            inner.state = EditorState::Destroyed;
            inner.generation += 1;
            inner.handle.take()
        };

        if let Some(handle) = handle {
            handle.surface.destroy();
        }
        debug!("editor destroyed");
    }

    /// Make a destroyed editor mountable again. Returns whether the state
    /// changed. Mounts still in flight from before the reset keep a stale
    /// generation and are discarded when they resolve.
    pub fn reset(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != EditorState::Destroyed {
            return false;
        }
        inner.state = EditorState::Absent;
        debug!(generation = inner.generation, "editor reset");
        true
    }
}

impl fmt::Debug for EditorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EditorManager")
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .finish_non_exhaustive()
    }
}

impl Drop for EditorManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use url::Url;

    use crate::block::{BlockKind, LinkMeta};
    use crate::config::ComposerConfig;
    use crate::error::UploadError;
    use crate::link::{LinkPreview, LinkSuggestion};
    use crate::upload::{LocalFile, UploadResult, Uploader};

    struct NoUploads;

    #[async_trait]
    impl Uploader for NoUploads {
        async fn upload_by_file(&self, _file: LocalFile) -> Result<UploadResult, UploadError> {
            Err(UploadError::NoUploader)
        }
    }

    struct NoLinks;

    #[async_trait]
    impl LinkPreview for NoLinks {
        async fn fetch_meta(&self, _endpoint: &Url, _link: &str) -> Option<LinkMeta> {
            None
        }

        async fn search(&self, _endpoint: &Url, _param: &str, _query: &str) -> Vec<LinkSuggestion> {
            Vec::new()
        }
    }

    fn settings() -> ToolSettings {
        ToolSettings::new(
            &ComposerConfig::default(),
            Arc::new(NoUploads),
            Arc::new(NoLinks),
        )
    }

    fn manager(host: &Arc<BufferHost>) -> EditorManager {
        EditorManager::new(host.clone(), settings())
    }

    #[tokio::test]
    async fn initialize_twice_mounts_once() {
        let host = Arc::new(BufferHost::new());
        let editor = manager(&host);
        editor.initialize().await.unwrap();
        editor.initialize().await.unwrap();
        assert_eq!(editor.state(), EditorState::Ready);
        assert_eq!(host.surfaces().len(), 1);
        assert_eq!(editor.handle().unwrap().generation(), 1);
    }

    #[tokio::test]
    async fn serialize_before_ready_fails() {
        let host = Arc::new(BufferHost::new());
        let editor = manager(&host);
        let err = editor.serialize().await.unwrap_err();
        assert!(matches!(err, ComposerError::EditorNotReady));
    }

    #[tokio::test]
    async fn serialize_returns_typed_blocks_in_order() {
        let host = Arc::new(BufferHost::new());
        let editor = manager(&host);
        editor.initialize().await.unwrap();
        let surface = host.surface().unwrap();
        surface
            .insert("header", json!({ "text": "Hello World", "level": 2 }))
            .unwrap();
        surface.insert("paragraph", json!({ "text": "body" })).unwrap();

        let output = editor.serialize().await.unwrap();
        assert_eq!(output.blocks.len(), 2);
        assert!(matches!(output.blocks[0].kind, BlockKind::Header(_)));
        assert_eq!(output.blocks[1].tool(), "paragraph");
        assert!(output.time > 0);
    }

    #[tokio::test]
    async fn destroy_is_idempotent_and_final() {
        let host = Arc::new(BufferHost::new());
        let editor = manager(&host);

        editor.destroy();
        assert_eq!(editor.state(), EditorState::Absent);

        editor.initialize().await.unwrap();
        editor.destroy();
        editor.destroy();
        assert_eq!(editor.state(), EditorState::Destroyed);
        assert!(editor.handle().is_none());
        assert_eq!(host.live_surfaces(), 0);

        let err = editor.initialize().await.unwrap_err();
        assert!(matches!(err, ComposerError::EditorDestroyed));
    }

    #[tokio::test]
    async fn reset_allows_a_fresh_surface() {
        let host = Arc::new(BufferHost::new());
        let editor = manager(&host);
        assert!(!editor.reset());

        editor.initialize().await.unwrap();
        assert!(!editor.reset());
        editor.destroy();
        assert!(editor.reset());
        assert_eq!(editor.state(), EditorState::Absent);

        editor.initialize().await.unwrap();
        assert_eq!(editor.state(), EditorState::Ready);
        assert_eq!(host.surfaces().len(), 2);
        assert_eq!(host.live_surfaces(), 1);
        assert_eq!(editor.handle().unwrap().generation(), 3);
    }

    #[tokio::test]
    async fn missing_holder_returns_to_absent() {
        let host = Arc::new(BufferHost::with_holders(["sidebar"]));
        let editor = manager(&host);
        let err = editor.initialize().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(editor.state(), EditorState::Absent);
    }

    #[tokio::test]
    async fn bad_tool_config_is_reported_before_mounting() {
        let host = Arc::new(BufferHost::new());
        let mut settings = settings();
        settings.code_theme_name = String::new();
        let editor = EditorManager::new(host.clone(), settings);
        let err = editor.initialize().await.unwrap_err();
        assert!(matches!(err, ComposerError::ToolConfig { .. }));
        assert!(host.surfaces().is_empty());
        assert_eq!(editor.state(), EditorState::Absent);
    }

    #[tokio::test]
    async fn drop_destroys_the_surface() {
        let host = Arc::new(BufferHost::new());
        {
            let editor = manager(&host);
            editor.initialize().await.unwrap();
            assert_eq!(host.live_surfaces(), 1);
        }
        assert_eq!(host.live_surfaces(), 0);
    }
}
