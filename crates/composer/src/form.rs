//! Post form validation.
//!
//! The title is the only user-editable field. The community id comes from
//! the page context and is passed through unchecked.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::notify::Notification;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 128;

/// Title used for every validation notification.
pub const VALIDATION_TITLE: &str = "Something went wrong";

/// Identifier of the community a post is created in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityId(String);

impl CommunityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommunityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Raw form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostForm {
    pub title: String,
    pub community_id: CommunityId,
}

/// Fields that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFields {
    pub title: String,
    pub community_id: CommunityId,
}

/// Field name to message, one entry per violated field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrorSet {
    errors: BTreeMap<String, String>,
}

impl ValidationErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field. The first message per field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(f, m)| (f.as_str(), m.as_str()))
    }

    /// One destructive notification per violated field.
    pub fn notifications(&self) -> Vec<Notification> {
        self.errors
            .values()
            .map(|message| Notification::destructive(VALIDATION_TITLE, message.clone()))
            .collect()
    }
}

impl fmt::Display for ValidationErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

/// Check a title. Lengths count Unicode scalar values.
pub fn validate_title(title: &str) -> Result<(), &'static str> {
    if title.trim().is_empty() {
        return Err("Title is required");
    }
    let chars = title.chars().count();
    if chars < TITLE_MIN_CHARS {
        return Err("Title must be at least 3 characters long");
    }
    if chars > TITLE_MAX_CHARS {
        return Err("Title must be less than 128 characters long");
    }
    Ok(())
}

/// Validate the form.
pub fn validate(form: &PostForm) -> Result<ValidFields, ValidationErrorSet> {
    let mut errors = ValidationErrorSet::new();

    if let Err(message) = validate_title(&form.title) {
        errors.add("title", message);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidFields {
        title: form.title.clone(),
        community_id: form.community_id.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn form(title: &str) -> PostForm {
        PostForm {
            title: title.to_string(),
            community_id: CommunityId::new("c1"),
        }
    }

    #[test]
    fn empty_title_is_required() {
        let errors = validate(&form("")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("title"), Some("Title is required"));
    }

    #[test]
    fn whitespace_title_is_required() {
        let errors = validate(&form("   ")).unwrap_err();
        assert_eq!(errors.get("title"), Some("Title is required"));
    }

    #[test]
    fn short_title_rejected() {
        let errors = validate(&form("ab")).unwrap_err();
        assert_eq!(
            errors.get("title"),
            Some("Title must be at least 3 characters long")
        );
    }

    #[test]
    fn long_title_rejected() {
        let errors = validate(&form(&"a".repeat(129))).unwrap_err();
        assert_eq!(
            errors.get("title"),
            Some("Title must be less than 128 characters long")
        );
        assert!(validate(&form(&"a".repeat(128))).is_ok());
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        assert!(validate_title("héé").is_ok());
        assert!(validate_title(&"é".repeat(128)).is_ok());
    }

    #[test]
    fn valid_form_passes_community_through() {
        let fields = validate(&form("Hello World")).unwrap();
        assert_eq!(fields.title, "Hello World");
        assert_eq!(fields.community_id.as_str(), "c1");
    }

    #[test]
    fn notifications_one_per_field() {
        let mut errors = ValidationErrorSet::new();
        errors.add("title", "Title is required");
        errors.add("title", "ignored");
        errors.add("body", "Body is required");
        let notifications = errors.notifications();
        assert_eq!(notifications.len(), 2);
        assert!(notifications.iter().all(Notification::is_destructive));
        assert!(notifications.iter().all(|n| n.title == VALIDATION_TITLE));
        assert_eq!(errors.to_string(), "body: Body is required; title: Title is required");
    }
}
