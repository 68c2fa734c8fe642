//! Preview handles for selected clips.
//!
//! A [`PreviewHandle`] registers its file in a shared [`PreviewRegistry`] so
//! the page can stream it back into a `<video>` element. Dropping the handle
//! revokes the entry, so the registry never holds more entries than there are
//! live selections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::media::MediaFile;

/// Shared lookup from preview id to the file being previewed.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<RwLock<HashMap<Uuid, Arc<MediaFile>>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` and return the handle that owns the entry.
    pub fn acquire(&self, file: Arc<MediaFile>) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.entries.write().insert(id, file);
        tracing::debug!(preview = %id, "Preview acquired");
        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<MediaFile>> {
        self.entries.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn revoke(&self, id: &Uuid) {
        if self.entries.write().remove(id).is_some() {
            tracing::debug!(preview = %id, "Preview revoked");
        }
    }
}

/// Owned registration of one preview. Revoked on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path the page loads the preview from.
    pub fn url(&self) -> String {
        format!("/preview/{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.revoke(&self.id);
    }
}
