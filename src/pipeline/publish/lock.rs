use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// Per-document exclusive access, in process.
///
/// Cheap to clone; clones share the same set of held documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentLocks {
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `document_id` without blocking.
    ///
    /// Returns `None` if another operation already holds it.
    pub fn try_acquire(&self, document_id: Uuid) -> Option<DocumentGuard> {
        let mut held = self.held.lock().ok()?;
        if !held.insert(document_id) {
            return None;
        }
        Some(DocumentGuard {
            held: Arc::clone(&self.held),
            document_id,
        })
    }

    pub fn is_held(&self, document_id: &Uuid) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(document_id))
            .unwrap_or(false)
    }
}

/// RAII guard. Dropping it releases the document.
pub struct DocumentGuard {
    held: Arc<Mutex<HashSet<Uuid>>>,
    document_id: Uuid,
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.document_id);
        }
    }
}
