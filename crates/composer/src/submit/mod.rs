//! Submission pipeline.
//!
//! ```text
//! Idle --submit--> Submitting --ok--> Succeeded
//!                       \--err--> Failed --> Idle
//! ```
//!
//! Each step of an attempt settles before the next starts: validate,
//! serialize, send, then side effects. A submit while another is in flight
//! is rejected without side effects.

pub mod client;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::editor::EditorManager;
use crate::error::{ComposerError, SubmitError};
use crate::form::{self, PostForm, VALIDATION_TITLE, ValidationErrorSet};
use crate::navigate::{Navigator, parent_path};
use crate::notify::{Notification, Notifier};

pub use client::{
    CREATE_POST_PATH, HttpPostClient, PostClient, PostCreationRequest, SubmissionOutcome,
};

/// Where the pipeline is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// How a submit call ended.
#[derive(Debug)]
pub enum SubmitReport {
    /// The editor was not ready. Nothing happened.
    NotReady,
    /// Another submission is in flight. Nothing happened.
    Busy,
    /// The form failed validation; one notification per field was shown.
    Invalid(ValidationErrorSet),
    /// The editor could not produce valid content.
    SerializeFailed(ComposerError),
    Published {
        payload: PostCreationRequest,
        response: Value,
        destination: String,
    },
    Failed {
        payload: PostCreationRequest,
        error: SubmitError,
    },
}

impl SubmitReport {
    pub fn is_published(&self) -> bool {
        matches!(self, SubmitReport::Published { .. })
    }

    /// The payload that was sent, if the attempt got that far.
    pub fn payload(&self) -> Option<&PostCreationRequest> {
        match self {
            SubmitReport::Published { payload, .. } | SubmitReport::Failed { payload, .. } => {
                Some(payload)
            }
            _ => None,
        }
    }
}

/// Runs submissions and their side effects.
pub struct Submitter {
    client: Arc<dyn PostClient>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<SubmissionState>,
}

/// Puts the pipeline back to `Idle` if an attempt is dropped mid-flight.
struct Attempt<'a> {
    state: &'a Mutex<SubmissionState>,
}

impl Attempt<'_> {
    fn finish(self, to: SubmissionState) {
        *self.state.lock() = to;
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if *state == SubmissionState::Submitting {
            *state = SubmissionState::Idle;
        }
    }
}

impl Submitter {
    pub fn new(
        client: Arc<dyn PostClient>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client,
            notifier,
            navigator,
            state: Mutex::new(SubmissionState::Idle),
        }
    }

    pub fn state(&self) -> SubmissionState {
        *self.state.lock()
    }

    /// Claim the pipeline, or `None` when an attempt is already running.
    fn begin(&self) -> Option<Attempt<'_>> {
        let mut state = self.state.lock();
        if *state == SubmissionState::Submitting {
            return None;
        }
        *state = SubmissionState::Submitting;
        Some(Attempt { state: &self.state })
    }

    /// Submit the form with the editor's current content.
    pub async fn submit(&self, editor: &EditorManager, form: &PostForm) -> SubmitReport {
        if !editor.is_ready() {
            debug!("submit ignored, editor not ready");
            return SubmitReport::NotReady;
        }
        if self.state() == SubmissionState::Submitting {
            debug!("submit ignored, already submitting");
            return SubmitReport::Busy;
        }

        let fields = match form::validate(form) {
            Ok(fields) => fields,
            Err(errors) => {
                debug!(errors = %errors, "post form invalid");
                for notification in errors.notifications() {
                    self.notifier.notify(notification);
                }
                return SubmitReport::Invalid(errors);
            }
        };

        let Some(attempt) = self.begin() else {
            return SubmitReport::Busy;
        };

        let content = match editor.serialize().await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "editor content could not be serialized");
                self.notifier
                    .notify(Notification::destructive(VALIDATION_TITLE, e.to_string()));
                attempt.finish(SubmissionState::Idle);
                return SubmitReport::SerializeFailed(e);
            }
        };

        let payload = PostCreationRequest {
            title: fields.title,
            content,
            community_id: fields.community_id,
        };

        match self.client.create_post(&payload).await {
            SubmissionOutcome::Success(response) => {
                info!(
                    community = %payload.community_id,
                    blocks = payload.content.blocks.len(),
                    "post published"
                );
                self.notifier.notify(Notification::published());
                let destination = parent_path(&self.navigator.current_path());
                self.navigator.push(&destination);
                self.navigator.refresh();
                attempt.finish(SubmissionState::Succeeded);
                SubmitReport::Published {
                    payload,
                    response,
                    destination,
                }
            }
            SubmissionOutcome::Failure(error) => {
                warn!(error = %error, "post not published");
                self.notifier.notify(Notification::not_published());
                *self.state.lock() = SubmissionState::Failed;
                attempt.finish(SubmissionState::Idle);
                SubmitReport::Failed { payload, error }
            }
        }
    }
}
