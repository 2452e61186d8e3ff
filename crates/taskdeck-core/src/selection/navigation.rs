//! Clearing a selection when navigation leaves its section.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::debug;

use super::cache::{EntityKind, SelectionCache};

/// Whether `path` has `marker` as one of its segments. Query and fragment
/// are ignored.
pub fn is_within_section(path: &str, marker: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    !marker.is_empty() && path.split('/').any(|segment| segment == marker)
}

/// Watches route paths for one section and clears one selection kind on exit.
///
/// A scope starts armed, since it is created on entering the section. It
/// fires once on the first path outside the section and re-arms when a
/// path inside is seen again.
pub struct SectionScope {
    cache: Arc<SelectionCache>,
    kind: EntityKind,
    marker: String,
    armed: bool,
}

impl SectionScope {
    pub fn new(cache: Arc<SelectionCache>, kind: EntityKind, marker: &str) -> Self {
        Self {
            cache,
            kind,
            marker: marker.to_string(),
            armed: true,
        }
    }

    /// Feed one path. Returns `true` when it cleared the selection.
    pub fn observe(&mut self, path: &str) -> bool {
        if is_within_section(path, &self.marker) {
            self.armed = true;
            return false;
        }
        if !self.armed {
            return false;
        }
        self.armed = false;
        debug!(path = %path, marker = %self.marker, kind = %self.kind, "Left section");
        self.cache.clear(self.kind);
        true
    }

    /// Observe every path of `paths` until it ends. Returns how many times
    /// the selection was cleared.
    pub async fn watch<S>(mut self, paths: S) -> usize
    where
        S: Stream<Item = String>,
    {
        futures::pin_mut!(paths);
        let mut cleared = 0;
        while let Some(path) = paths.next().await {
            if self.observe(&path) {
                cleared += 1;
            }
        }
        cleared
    }

    pub fn spawn<S>(self, paths: S) -> JoinHandle<usize>
    where
        S: Stream<Item = String> + Send + 'static,
    {
        tokio::spawn(self.watch(paths))
    }
}
