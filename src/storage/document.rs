//! Filesystem document store.
//!
//! Stores each memory as a revisioned JSON document, with attachment
//! payloads kept out-of-line as blob files so reads without attachments
//! stay cheap. Upserts to the same id are serialized by a per-id lock,
//! the natural point of contention; optimistic-concurrency retries are
//! the store's responsibility, not the caller's.

use crate::models::{Memory, MemoryId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Bounded retries for upserts racing an external writer.
const MAX_UPSERT_RETRIES: u32 = 3;

/// Lock-map size that triggers eviction of idle per-id locks.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// Trait for keyed, revisioned, attachment-capable document stores.
pub trait DocumentStore: Send + Sync {
    /// Retrieves a document by id. Attachment payloads are only loaded
    /// when `with_attachments` is set; otherwise stubs carry the
    /// metadata.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] when the id is absent.
    fn get(&self, id: &MemoryId, with_attachments: bool) -> Result<Memory>;

    /// Lists every stored document, attachments stubbed.
    fn all(&self) -> Result<Vec<Memory>>;

    /// Removes a document and its attachment payloads.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] when the id is absent.
    fn remove(&self, id: &MemoryId) -> Result<()>;

    /// Applies `merge` to whatever currently exists under `id` (or
    /// nothing, if absent) and persists the result.
    ///
    /// The merge function may be re-applied against a newer revision on
    /// conflict; exhausted retries surface as [`Error::StoreConflict`].
    fn upsert(
        &self,
        id: &MemoryId,
        merge: &mut dyn FnMut(Option<Memory>) -> Result<Memory>,
    ) -> Result<()>;

    /// Removes every document, leaving the store ready for immediate use.
    fn clear(&self) -> Result<()>;
}

/// On-disk envelope around a document.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    rev: u64,
    doc: Memory,
}

/// Document store backed by one directory per scope.
pub struct FilesystemDocumentStore {
    docs_path: PathBuf,
    blobs_path: PathBuf,
    /// Per-id write locks.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FilesystemDocumentStore {
    /// Opens (creating if needed) a store rooted at `base`.
    pub fn open(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        let docs_path = base.join("docs");
        let blobs_path = base.join("attachments");
        fs::create_dir_all(&docs_path).map_err(|e| Error::op("create_store_dir", e))?;
        fs::create_dir_all(&blobs_path).map_err(|e| Error::op("create_store_dir", e))?;
        Ok(Self {
            docs_path,
            blobs_path,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Content-addressed filename for an id; ids are URIs and cannot be
    /// used as paths directly.
    fn doc_key(id: &MemoryId) -> String {
        hex::encode(Sha256::digest(id.as_str().as_bytes()))
    }

    fn doc_path(&self, id: &MemoryId) -> PathBuf {
        self.docs_path.join(format!("{}.json", Self::doc_key(id)))
    }

    fn blob_dir(&self, id: &MemoryId) -> PathBuf {
        self.blobs_path.join(Self::doc_key(id))
    }

    fn blob_path(&self, id: &MemoryId, attachment_key: &str) -> PathBuf {
        let key = hex::encode(Sha256::digest(attachment_key.as_bytes()));
        self.blob_dir(id).join(format!("{key}.bin"))
    }

    fn lock_for(&self, id: &MemoryId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // Evict locks nobody holds once the map gets large, otherwise it
        // grows by one entry per id touched for the life of the process.
        if locks.len() > LOCK_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(
            locks
                .entry(id.as_str().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    fn read_envelope(&self, id: &MemoryId) -> Result<Option<Envelope>> {
        let path = self.doc_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::op("read_document", e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::op("parse_document", e))
    }

    /// Persists the envelope atomically (temp file + rename).
    fn write_envelope(&self, id: &MemoryId, envelope: &Envelope) -> Result<()> {
        let body =
            serde_json::to_vec(envelope).map_err(|e| Error::op("serialize_document", e))?;
        let path = self.doc_path(id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| Error::op("write_document", e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::op("write_document", e))
    }

    /// Writes new payloads and prunes blobs not in the attachment set.
    fn sync_blobs(&self, id: &MemoryId, memory: &Memory) -> Result<()> {
        let dir = self.blob_dir(id);
        let Some(attachments) = &memory.attachments else {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| Error::op("prune_attachments", e))?;
            }
            return Ok(());
        };
        fs::create_dir_all(&dir).map_err(|e| Error::op("write_attachment", e))?;

        let mut keep = Vec::new();
        for (key, attachment) in attachments {
            let path = self.blob_path(id, key);
            if let Some(data) = &attachment.data {
                fs::write(&path, data).map_err(|e| Error::op("write_attachment", e))?;
            }
            keep.push(path);
        }
        // The new set replaces all current attachments.
        for entry in fs::read_dir(&dir).map_err(|e| Error::op("prune_attachments", e))? {
            let entry = entry.map_err(|e| Error::op("prune_attachments", e))?;
            if !keep.contains(&entry.path()) {
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}

impl DocumentStore for FilesystemDocumentStore {
    fn get(&self, id: &MemoryId, with_attachments: bool) -> Result<Memory> {
        let envelope = self
            .read_envelope(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let mut memory = envelope.doc;
        if with_attachments {
            if let Some(attachments) = &mut memory.attachments {
                for (key, attachment) in attachments.iter_mut() {
                    let path = self.blob_path(id, key);
                    match fs::read(&path) {
                        Ok(data) => attachment.data = Some(data),
                        Err(e) => {
                            tracing::warn!(id = %id, key = %key, error = %e, "attachment payload missing");
                        }
                    }
                }
            }
        }
        Ok(memory)
    }

    fn all(&self) -> Result<Vec<Memory>> {
        let mut memories = Vec::new();
        for entry in fs::read_dir(&self.docs_path).map_err(|e| Error::op("list_documents", e))? {
            let entry = entry.map_err(|e| Error::op("list_documents", e))?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(|e| Error::op("read_document", e))
                .and_then(|bytes| {
                    serde_json::from_slice::<Envelope>(&bytes)
                        .map_err(|e| Error::op("parse_document", e))
                });
            match parsed {
                Ok(envelope) => memories.push(envelope.doc),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable document");
                }
            }
        }
        Ok(memories)
    }

    fn remove(&self, id: &MemoryId) -> Result<()> {
        let guard = self.lock_for(id);
        let _held = guard.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let path = self.doc_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(id.to_string()));
            }
            Err(e) => return Err(Error::op("remove_document", e)),
        }
        let blob_dir = self.blob_dir(id);
        if blob_dir.exists() {
            let _ = fs::remove_dir_all(&blob_dir);
        }
        Ok(())
    }

    fn upsert(
        &self,
        id: &MemoryId,
        merge: &mut dyn FnMut(Option<Memory>) -> Result<Memory>,
    ) -> Result<()> {
        let guard = self.lock_for(id);
        let _held = guard.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        for _ in 0..MAX_UPSERT_RETRIES {
            let current = self.read_envelope(id)?;
            let rev = current.as_ref().map_or(0, |e| e.rev);
            let merged = merge(current.map(|e| e.doc))?;

            // An external writer may have bumped the revision since the
            // read; re-apply the merge against the newer state.
            let latest = self.read_envelope(id)?.map_or(0, |e| e.rev);
            if latest != rev {
                tracing::debug!(id = %id, "revision moved during upsert, retrying");
                continue;
            }

            self.sync_blobs(id, &merged)?;
            let mut doc = merged;
            // Payloads live out-of-line; the document carries stubs.
            if let Some(attachments) = &mut doc.attachments {
                for attachment in attachments.values_mut() {
                    attachment.data = None;
                }
            }
            return self.write_envelope(id, &Envelope { rev: rev + 1, doc });
        }
        Err(Error::StoreConflict {
            id: id.to_string(),
            retries: MAX_UPSERT_RETRIES,
        })
    }

    fn clear(&self) -> Result<()> {
        for path in [&self.docs_path, &self.blobs_path] {
            if path.exists() {
                fs::remove_dir_all(path).map_err(|e| Error::op("clear_store", e))?;
            }
            fs::create_dir_all(path).map_err(|e| Error::op("clear_store", e))?;
        }
        Ok(())
    }
}
