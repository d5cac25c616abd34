use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// In-process store of downloaded bodies, addressed by `blob:` URLs.
///
/// Every [`LocalRef`] handed out is counted as created, and counted as
/// released when it is dropped. A view that owns its refs therefore cannot
/// leak or double-free them.
#[derive(Debug, Default)]
pub struct BlobRegistry {
    blobs: Mutex<HashMap<u64, Blob>>,
    next_id: AtomicU64,
    created: AtomicUsize,
    released: AtomicUsize,
}

#[derive(Debug)]
struct Blob {
    mime: Option<String>,
    bytes: Arc<[u8]>,
}

impl BlobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores `bytes` and returns the owning handle.
    pub fn create(self: &Arc<Self>, mime: Option<String>, bytes: Vec<u8>) -> LocalRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let len = bytes.len();
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Blob {
                    mime: mime.clone(),
                    bytes: bytes.into(),
                },
            );
        self.created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(id, len, "Blob created");
        LocalRef {
            id,
            mime,
            len,
            registry: Arc::clone(self),
        }
    }

    pub fn bytes(&self, local: &LocalRef) -> Option<Arc<[u8]>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&local.id)
            .map(|b| Arc::clone(&b.bytes))
    }

    pub fn mime(&self, local: &LocalRef) -> Option<String> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&local.id)
            .and_then(|b| b.mime.clone())
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }

    /// Refs created and not yet released.
    pub fn live(&self) -> usize {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, id: u64) {
        let removed = self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(_) => {
                self.released.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(id, "Blob released");
            }
            None => tracing::error!(id, "Blob released twice"),
        }
    }
}

/// Owning handle to a blob in a [`BlobRegistry`]. Dropping it releases the blob.
pub struct LocalRef {
    id: u64,
    mime: Option<String>,
    len: usize,
    registry: Arc<BlobRegistry>,
}

impl LocalRef {
    /// `blob:` URL identifying this ref within the process.
    pub fn url(&self) -> String {
        format!("blob:murmur/{}", self.id)
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Releases the blob now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LocalRef {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

impl fmt::Debug for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalRef")
            .field("url", &self.url())
            .field("mime", &self.mime)
            .field("len", &self.len)
            .finish()
    }
}
