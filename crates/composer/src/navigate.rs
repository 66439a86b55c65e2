//! Navigation after a successful submission.

use parking_lot::Mutex;
use serde::Serialize;

/// Router seam.
pub trait Navigator: Send + Sync {
    /// The path the composer is shown on.
    fn current_path(&self) -> String;

    /// Go to `path`.
    fn push(&self, path: &str);

    /// Reload data for the current view.
    fn refresh(&self);
}

/// Drop the last `/`-delimited segment of `path`.
///
/// `/c/sample/submit` becomes `/c/sample`. An empty result is `/`.
pub fn parent_path(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop();
    let parent = segments.join("/");
    if parent.is_empty() {
        "/".to_string()
    } else {
        parent
    }
}

/// A navigation side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "path", rename_all = "lowercase")]
pub enum NavigationEvent {
    Push(String),
    Refresh,
}

/// In-memory navigator that records what it was asked to do.
#[derive(Debug)]
pub struct History {
    current: Mutex<String>,
    events: Mutex<Vec<NavigationEvent>>,
}

impl History {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(path.into()),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<NavigationEvent> {
        self.events.lock().clone()
    }

    /// Paths pushed so far, in order.
    pub fn pushes(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                NavigationEvent::Push(path) => Some(path.clone()),
                NavigationEvent::Refresh => None,
            })
            .collect()
    }
}

impl Navigator for History {
    fn current_path(&self) -> String {
        self.current.lock().clone()
    }

    fn push(&self, path: &str) {
        *self.current.lock() = path.to_string();
        self.events
            .lock()
            .push(NavigationEvent::Push(path.to_string()));
    }

    fn refresh(&self) {
        self.events.lock().push(NavigationEvent::Refresh);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parent_path_drops_last_segment() {
        assert_eq!(parent_path("/c/sample/submit"), "/c/sample");
        assert_eq!(parent_path("/c/sample/"), "/c/sample");
        assert_eq!(parent_path("/submit"), "/");
        assert_eq!(parent_path("/"), "/");
        assert_eq!(parent_path(""), "/");
    }

    #[test]
    fn history_records_pushes_and_refreshes() {
        let history = History::new("/c/sample/submit");
        history.push("/c/sample");
        history.refresh();
        assert_eq!(history.current_path(), "/c/sample");
        assert_eq!(
            history.events(),
            [
                NavigationEvent::Push("/c/sample".to_string()),
                NavigationEvent::Refresh
            ]
        );
        assert_eq!(history.pushes(), ["/c/sample"]);
    }
}
