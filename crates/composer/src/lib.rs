//! Agora post composer library.
//!
//! Block tool registry, editor lifecycle, image uploads and post submission
//! for the community post composer. The `agora-compose` binary drives it
//! headlessly.

pub mod block;
pub mod composer;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod form;
pub mod http;
pub mod link;
pub mod navigate;
pub mod notify;
pub mod submit;
pub mod tools;
pub mod upload;

pub use composer::{Collaborators, Composer, LifecyclePhase, TitleFocus};
pub use config::ComposerConfig;
pub use error::{ComposerError, ComposerResult, SubmitError, UploadError};
