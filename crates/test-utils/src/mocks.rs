//! Recording and gated collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use agora_composer::block::LinkMeta;
use agora_composer::editor::{BufferHost, BufferSurface, MountOptions, Surface, SurfaceHost};
use agora_composer::error::{SubmitError, UploadError};
use agora_composer::form::CommunityId;
use agora_composer::link::{LinkPreview, LinkSuggestion};
use agora_composer::navigate::History;
use agora_composer::notify::{Notification, Notifier};
use agora_composer::submit::{PostClient, PostCreationRequest, SubmissionOutcome};
use agora_composer::upload::{LocalFile, UploadResult, Uploader, check_file};
use agora_composer::{Collaborators, Composer, ComposerConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{Notify, Semaphore};
use url::Url;

use crate::SUBMIT_PATH;
use crate::server::TestServer;

/// Body the post endpoint answers with when it refuses a post.
pub const REJECTION_BODY: &str = "Could not post to community at this time, please try later";

/// Notifier that keeps everything it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.shown.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.shown.lock().len()
    }

    pub fn destructive(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .iter()
            .filter(|n| n.is_destructive())
            .cloned()
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.shown.lock().push(notification);
    }
}

/// A [`BufferHost`] whose mounts wait until released.
pub struct GatedHost {
    buffer: BufferHost,
    gate: Semaphore,
    entered: Notify,
}

impl GatedHost {
    pub fn new() -> Self {
        Self {
            buffer: BufferHost::new(),
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// Let one pending (or future) mount through.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Wait until a mount has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn buffer(&self) -> &BufferHost {
        &self.buffer
    }
}

impl Default for GatedHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SurfaceHost for GatedHost {
    async fn mount(&self, options: MountOptions) -> anyhow::Result<Arc<dyn Surface>> {
        self.entered.notify_one();
        self.gate.acquire().await?.forget();
        self.buffer.mount(options).await
    }
}

/// Post client with a switchable outcome that records every request.
pub struct MockPostClient {
    failing: AtomicBool,
    requests: Mutex<Vec<PostCreationRequest>>,
    gate: Option<Semaphore>,
    entered: Notify,
}

impl MockPostClient {
    /// A client whose posts succeed.
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            gate: None,
            entered: Notify::new(),
        }
    }

    /// A client whose posts fail with a 500.
    pub fn failing() -> Self {
        let client = Self::new();
        client.set_failing(true);
        client
    }

    /// A client that holds every call until [`release`](Self::release).
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Wait until a call is in flight.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<PostCreationRequest> {
        self.requests.lock().clone()
    }
}

impl Default for MockPostClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostClient for MockPostClient {
    async fn create_post(&self, request: &PostCreationRequest) -> SubmissionOutcome {
        self.requests.lock().push(request.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.failing.load(Ordering::SeqCst) {
            SubmissionOutcome::Failure(SubmitError::Status {
                status: 500,
                body: REJECTION_BODY.to_string(),
            })
        } else {
            SubmissionOutcome::Success(json!("OK"))
        }
    }
}

/// Uploader that runs the local checks and hands back a fake CDN URL.
#[derive(Debug)]
pub struct MockUploader {
    max_bytes: usize,
    uploads: Mutex<Vec<String>>,
}

impl MockUploader {
    pub fn new() -> Self {
        Self {
            max_bytes: ComposerConfig::default().max_upload_bytes,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            ..Self::new()
        }
    }

    /// Names of the files uploaded so far.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }
}

impl Default for MockUploader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload_by_file(&self, file: LocalFile) -> Result<UploadResult, UploadError> {
        check_file(&file, self.max_bytes)?;
        self.uploads.lock().push(file.name.clone());
        Ok(UploadResult::uploaded(format!(
            "https://utfs.io/f/{}",
            file.name
        )))
    }
}

/// Link lookups answered from memory.
#[derive(Debug, Default)]
pub struct MockLinkPreview {
    fetched: Mutex<Vec<String>>,
    searched: Mutex<Vec<String>>,
}

impl MockLinkPreview {
    pub fn new() -> Self {
        Self::default()
    }

    /// `endpoint?url=link` for every metadata lookup.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    pub fn searched(&self) -> Vec<String> {
        self.searched.lock().clone()
    }
}

#[async_trait]
impl LinkPreview for MockLinkPreview {
    async fn fetch_meta(&self, endpoint: &Url, link: &str) -> Option<LinkMeta> {
        self.fetched.lock().push(format!("{endpoint}?url={link}"));
        Some(LinkMeta {
            title: Some(format!("Preview of {link}")),
            ..LinkMeta::default()
        })
    }

    async fn search(&self, _endpoint: &Url, param: &str, query: &str) -> Vec<LinkSuggestion> {
        self.searched.lock().push(format!("{param}={query}"));
        vec![LinkSuggestion {
            name: query.to_string(),
            href: format!("https://example.com/{query}"),
            description: None,
        }]
    }
}

/// A composer wired to in-memory collaborators, with handles to all of them.
pub struct TestComposer {
    pub composer: Composer,
    pub host: Arc<BufferHost>,
    pub notifier: Arc<RecordingNotifier>,
    pub history: Arc<History>,
    pub client: Arc<MockPostClient>,
    pub uploader: Arc<MockUploader>,
    pub links: Arc<MockLinkPreview>,
    pub focused: Arc<AtomicUsize>,
}

impl TestComposer {
    /// Posts succeed.
    pub fn new() -> Self {
        Self::with_client(MockPostClient::new())
    }

    pub fn with_client(client: MockPostClient) -> Self {
        let host = Arc::new(BufferHost::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let history = Arc::new(History::new(SUBMIT_PATH));
        let client = Arc::new(client);
        let uploader = Arc::new(MockUploader::new());
        let links = Arc::new(MockLinkPreview::new());
        let focused = Arc::new(AtomicUsize::new(0));

        let focus_count = focused.clone();
        let composer = Composer::new(
            &ComposerConfig::default(),
            CommunityId::new("sample"),
            Collaborators {
                host: host.clone(),
                uploader: uploader.clone(),
                links: links.clone(),
                client: client.clone(),
                notifier: notifier.clone(),
                navigator: history.clone(),
                focus: Arc::new(move || {
                    focus_count.fetch_add(1, Ordering::SeqCst);
                }),
            },
        );

        Self {
            composer,
            host,
            notifier,
            history,
            client,
            uploader,
            links,
            focused,
        }
    }

    /// The mounted surface.
    pub fn surface(&self) -> Arc<BufferSurface> {
        self.host.surface().expect("composer is not mounted")
    }

    pub fn focus_count(&self) -> usize {
        self.focused.load(Ordering::SeqCst)
    }
}

impl Default for TestComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// A composer talking HTTP to a [`TestServer`].
pub struct HttpComposer {
    pub composer: Composer,
    pub host: Arc<BufferHost>,
    pub notifier: Arc<RecordingNotifier>,
    pub history: Arc<History>,
}

impl HttpComposer {
    pub fn new(server: &TestServer) -> Self {
        let host = Arc::new(BufferHost::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let history = Arc::new(History::new(SUBMIT_PATH));
        let composer = Composer::http(
            &server.config(),
            CommunityId::new("sample"),
            host.clone(),
            notifier.clone(),
            history.clone(),
            Arc::new(|| {}),
        )
        .unwrap();
        Self {
            composer,
            host,
            notifier,
            history,
        }
    }

    pub fn surface(&self) -> Arc<BufferSurface> {
        self.host.surface().expect("composer is not mounted")
    }
}
