//! Navigation side effects
//!
//! The reactor and the context never touch a browser; they go through a
//! [`Navigator`]. [`MemoryNavigator`] keeps the history in memory for demos
//! and tests.

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::routes::normalize;

pub trait Navigator: Send + Sync {
    /// The current location, query string included.
    fn current_path(&self) -> String;

    fn push(&self, path: &str);

    fn replace(&self, path: &str);

    /// Re-runs server rendering for the current location.
    fn refresh(&self);

    /// Full page load, dropping all client state.
    fn hard_navigate(&self, path: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    Refresh,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    pub kind: NavigationKind,
    pub path: String,
}

#[derive(Debug, Default)]
struct History {
    current: String,
    entries: Vec<NavigationEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNavigator {
    history: Arc<Mutex<History>>,
}

impl MemoryNavigator {
    pub fn new(start: &str) -> Self {
        Self {
            history: Arc::new(Mutex::new(History {
                current: start.to_string(),
                entries: Vec::new(),
            })),
        }
    }

    /// Every navigation so far, oldest first.
    pub fn history(&self) -> Vec<NavigationEntry> {
        self.lock().entries.clone()
    }

    /// Navigations that changed the location.
    pub fn hops(&self) -> Vec<String> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.kind != NavigationKind::Refresh)
            .map(|e| e.path.clone())
            .collect()
    }

    /// Moves to `path` without recording anything, like the user typing a URL.
    pub fn visit(&self, path: &str) {
        self.lock().current = path.to_string();
    }

    pub fn clear_history(&self) {
        self.lock().entries.clear();
    }

    /// Normalized current path.
    pub fn route(&self) -> String {
        normalize(&self.lock().current)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, kind: NavigationKind, path: &str) {
        debug!("Navigation {:?} -> {}", kind, path);
        let mut history = self.lock();
        if kind != NavigationKind::Refresh {
            history.current = path.to_string();
        }
        history.entries.push(NavigationEntry {
            kind,
            path: path.to_string(),
        });
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.lock().current.clone()
    }

    fn push(&self, path: &str) {
        self.record(NavigationKind::Push, path);
    }

    fn replace(&self, path: &str) {
        self.record(NavigationKind::Replace, path);
    }

    fn refresh(&self) {
        let current = self.current_path();
        self.record(NavigationKind::Refresh, &current);
    }

    fn hard_navigate(&self, path: &str) {
        self.record(NavigationKind::Hard, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_moves() {
        let nav = MemoryNavigator::new("/");
        nav.push("/login?returnUrl=%2F");
        nav.refresh();
        nav.hard_navigate("/login");

        assert_eq!(nav.route(), "/login");
        assert_eq!(nav.hops(), vec!["/login?returnUrl=%2F", "/login"]);
        assert_eq!(nav.history()[1].kind, NavigationKind::Refresh);
        assert_eq!(nav.history()[1].path, "/login?returnUrl=%2F");
    }

    #[test]
    fn visit_is_not_recorded() {
        let nav = MemoryNavigator::new("/");
        nav.visit("/client/dashboard");
        assert_eq!(nav.current_path(), "/client/dashboard");
        assert!(nav.history().is_empty());
    }
}
