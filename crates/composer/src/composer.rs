//! The post composer: title, editor and submission wired together.
//!
//! Lifecycle:
//! 1. `mount(LifecyclePhase::Ready)` initializes the editor, then focuses
//!    the title one scheduling tick later
//! 2. `set_title` / surface edits
//! 3. `submit`
//! 4. `unmount` (or drop) destroys the editor; a later `mount` starts a
//!    fresh one

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::ComposerConfig;
use crate::document::Document;
use crate::editor::{EditorManager, SurfaceHost};
use crate::error::ComposerResult;
use crate::form::{CommunityId, PostForm};
use crate::http::ApiClient;
use crate::link::{HttpLinkPreview, LinkPreview};
use crate::navigate::Navigator;
use crate::notify::Notifier;
use crate::submit::{HttpPostClient, PostClient, SubmissionState, SubmitReport, Submitter};
use crate::tools::ToolSettings;
use crate::upload::{HttpUploader, Uploader};

/// Whether the composer runs in a live client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// No client yet (e.g. server-side rendering). Nothing is mounted.
    NotReady,
    Ready,
}

/// Moves input focus to the title field.
pub trait TitleFocus: Send + Sync {
    fn focus_title(&self);
}

impl<F> TitleFocus for F
where
    F: Fn() + Send + Sync,
{
    fn focus_title(&self) {
        self();
    }
}

/// External collaborators of a composer.
#[derive(Clone)]
pub struct Collaborators {
    pub host: Arc<dyn SurfaceHost>,
    pub uploader: Arc<dyn Uploader>,
    pub links: Arc<dyn LinkPreview>,
    pub client: Arc<dyn PostClient>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
    pub focus: Arc<dyn TitleFocus>,
}

/// One mounted post composer.
pub struct Composer {
    editor: EditorManager,
    submitter: Submitter,
    focus: Arc<dyn TitleFocus>,
    document: Mutex<Document>,
}

impl Composer {
    pub fn new(config: &ComposerConfig, community_id: CommunityId, c: Collaborators) -> Self {
        let settings = ToolSettings::new(config, c.uploader, c.links);
        Self {
            editor: EditorManager::new(c.host, settings),
            submitter: Submitter::new(c.client, c.notifier, c.navigator),
            focus: c.focus,
            document: Mutex::new(Document::new(community_id)),
        }
    }

    /// A composer talking to the community API over HTTP.
    pub fn http(
        config: &ComposerConfig,
        community_id: CommunityId,
        host: Arc<dyn SurfaceHost>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        focus: Arc<dyn TitleFocus>,
    ) -> anyhow::Result<Self> {
        let api = ApiClient::new(config)?;
        let collaborators = Collaborators {
            host,
            uploader: Arc::new(HttpUploader::new(
                &api,
                &config.upload_path,
                config.max_upload_bytes,
            )?),
            links: Arc::new(HttpLinkPreview::new(api.client().clone())),
            client: Arc::new(HttpPostClient::new(&api)?),
            notifier,
            navigator,
            focus,
        };
        Ok(Self::new(config, community_id, collaborators))
    }

    /// Mount the composer. Returns whether anything was rendered.
    pub async fn mount(&self, phase: LifecyclePhase) -> ComposerResult<bool> {
        if phase == LifecyclePhase::NotReady {
            debug!("client not ready, composer renders nothing");
            return Ok(false);
        }

        if self.editor.reset() {
            debug!("remounting after unmount");
        }
        self.editor.initialize().await?;

        // Focus after the surface has had a tick to settle.
        tokio::task::yield_now().await;
        if self.editor.is_ready() {
            self.focus.focus_title();
        }
        Ok(true)
    }

    /// Tear down the editor. Safe to call repeatedly.
    pub fn unmount(&self) {
        self.editor.destroy();
    }

    pub fn editor(&self) -> &EditorManager {
        &self.editor
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.submitter.state()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.document.lock().title = title.into();
    }

    /// Snapshot of the document.
    pub fn document(&self) -> Document {
        self.document.lock().clone()
    }

    /// Submit the current title and editor content.
    pub async fn submit(&self) -> SubmitReport {
        let form = {
            let document = self.document.lock();
            PostForm {
                title: document.title.clone(),
                community_id: document.community_id.clone(),
            }
        };

        let report = self.submitter.submit(&self.editor, &form).await;
        if let Some(payload) = report.payload() {
            self.document.lock().content = Some(payload.content.clone());
        }
        report
    }
}

impl Drop for Composer {
    fn drop(&mut self) {
        self.unmount();
    }
}
