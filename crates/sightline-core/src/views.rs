//! Revision counters for the cached views.
//!
//! Mutating operations call [`ViewRevisions::invalidate`]; list endpoints turn
//! the current revision into an `ETag` so clients re-fetch only after a write.

use std::sync::atomic::{AtomicU64, Ordering};

use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum View {
    Gallery,
    Chat,
}

#[derive(Debug)]
pub struct ViewRevisions {
    /// Distinguishes tags across restarts, when counters start over.
    epoch: i64,
    gallery: AtomicU64,
    chat: AtomicU64,
}

impl Default for ViewRevisions {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRevisions {
    pub fn new() -> Self {
        Self {
            epoch: chrono::Utc::now().timestamp_micros(),
            gallery: AtomicU64::new(0),
            chat: AtomicU64::new(0),
        }
    }

    fn counter(&self, view: View) -> &AtomicU64 {
        match view {
            View::Gallery => &self.gallery,
            View::Chat => &self.chat,
        }
    }

    /// Mark `view` stale. Returns the new revision.
    pub fn invalidate(&self, view: View) -> u64 {
        let rev = self.counter(view).fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(view = %view, revision = rev, "view invalidated");
        rev
    }

    pub fn revision(&self, view: View) -> u64 {
        self.counter(view).load(Ordering::Acquire)
    }

    /// Strong entity tag for the current revision, quotes included.
    pub fn etag(&self, view: View) -> String {
        format!("\"{}-{:x}-{}\"", view.as_ref(), self.epoch, self.revision(view))
    }
}
