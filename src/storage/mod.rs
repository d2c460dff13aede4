//! Two-tier persistent index.
//!
//! [`Index`] pairs a document store (source of truth for memories and
//! their attachments) with a full-text search index over their text.
//! Writes go to the document store first; search state is derived and
//! can always be rebuilt from the documents, so search maintenance is
//! best-effort while document maintenance fails loudly.

pub mod document;
pub mod search;

pub use document::{DocumentStore, FilesystemDocumentStore};
pub use search::{InvertedSearchIndex, RESERVED_PREFIX, SearchIndex};

use crate::models::{Memory, MemoryId, RecalledMemory};
use crate::{Error, Result};
use std::path::Path;

/// Default sort key for listings.
const DEFAULT_SORT_KEY: &str = "createdAt";

/// The combined document and search index for one scope.
pub struct Index {
    store: FilesystemDocumentStore,
    search: InvertedSearchIndex,
}

impl Index {
    /// Opens the index rooted at `base`, loading any persisted search
    /// state.
    pub fn open(base: impl AsRef<Path>) -> Result<Self> {
        let store = FilesystemDocumentStore::open(base)?;
        let search = InvertedSearchIndex::new();
        search.load(&store)?;
        Ok(Self { store, search })
    }

    /// Indexes a batch of memories.
    ///
    /// Each memory is upserted with merge semantics (new values win,
    /// keys absent from the new memory keep their stored values, a new
    /// attachment set replaces the old one wholesale) and then fed to
    /// the search index. A failure for one memory is logged and the
    /// rest of the batch proceeds.
    pub fn index(&self, memories: &[Memory]) {
        for memory in memories {
            if let Err(e) = self.index_one(memory) {
                tracing::error!(id = %memory.id, error = %e, "failed to index memory");
            }
        }
    }

    fn index_one(&self, memory: &Memory) -> Result<()> {
        let incoming =
            serde_json::to_value(memory).map_err(|e| Error::op("serialize_memory", e))?;
        self.store.upsert(&memory.id, &mut |existing| {
            let mut base = match &existing {
                Some(current) => serde_json::to_value(current)
                    .map_err(|e| Error::op("serialize_memory", e))?,
                None => serde_json::Value::Object(serde_json::Map::new()),
            };
            let created = base.get("createdAt").cloned();
            if let (Some(base), Some(incoming)) = (base.as_object_mut(), incoming.as_object()) {
                for (key, value) in incoming {
                    base.insert(key.clone(), value.clone());
                }
                // The creation timestamp is assigned once and survives
                // every later re-index of the same id.
                if let Some(created) = created {
                    base.insert("createdAt".to_string(), created);
                }
            }
            serde_json::from_value(base).map_err(|e| Error::op("merge_memory", e))
        })?;
        self.search.update(&memory.id, &memory.text);
        Ok(())
    }

    /// Retrieves one memory.
    ///
    /// With `hydrate` set, embedded children referenced by id are
    /// resolved one level deep; unresolvable references are dropped
    /// rather than failing the read.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] when the id is absent.
    pub fn get_by_id(
        &self,
        id: &MemoryId,
        with_attachments: bool,
        hydrate: bool,
    ) -> Result<Memory> {
        let mut memory = self.store.get(id, with_attachments)?;
        if hydrate {
            self.hydrate(&mut memory);
        }
        Ok(memory)
    }

    /// Resolves `embeddedIds` into `embedded`, one level deep.
    fn hydrate(&self, memory: &mut Memory) {
        let Some(ids) = &memory.embedded_ids else {
            return;
        };
        let mut children = Vec::new();
        for child_id in ids {
            match self.store.get(child_id, false) {
                Ok(child) => children.push(child),
                Err(e) => {
                    tracing::debug!(parent = %memory.id, child = %child_id, error = %e, "dropping unresolvable embedded reference");
                }
            }
        }
        if !children.is_empty() {
            memory.embedded = Some(children);
        }
    }

    /// Full-text search over top-level memories.
    ///
    /// A hit whose document no longer exists, or that turns out to be
    /// embedded, indicates search state lagging the document store; such
    /// hits are logged and dropped rather than surfaced.
    pub fn search(&self, query: &str) -> Result<Vec<RecalledMemory>> {
        let hits = self.search.search(query);
        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let mut memory = match self.store.get(&id, false) {
                Ok(memory) => memory,
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "search hit has no document, dropping");
                    continue;
                }
            };
            if !memory.is_top_level() {
                tracing::warn!(id = %id, "search hit is an embedded memory, dropping");
                continue;
            }
            self.hydrate(&mut memory);
            results.push(RecalledMemory {
                memory,
                score: Some(score),
            });
        }
        Ok(results)
    }

    /// Lists top-level memories, newest first by default.
    ///
    /// `sort_key` names a field of the serialized memory; ordering is
    /// descending lexicographic over that field's JSON text. The default
    /// `createdAt` key is rendered at fixed nanosecond precision so the
    /// lexicographic order is chronological.
    pub fn all(
        &self,
        limit: usize,
        skip: usize,
        sort_key: Option<&str>,
    ) -> Result<Vec<RecalledMemory>> {
        let sort_key = sort_key.unwrap_or(DEFAULT_SORT_KEY);
        let mut entries: Vec<(String, Memory)> = Vec::new();
        for mut memory in self.store.all()? {
            if memory.id.as_str().starts_with(RESERVED_PREFIX) || !memory.is_top_level() {
                continue;
            }
            self.hydrate(&mut memory);
            // chrono's serde output has variable fractional-second
            // precision, which does not sort lexicographically; render
            // the default key at fixed width instead.
            let key = if sort_key == DEFAULT_SORT_KEY {
                memory
                    .created_at
                    .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
            } else {
                serde_json::to_value(&memory)
                    .ok()
                    .and_then(|v| v.get(sort_key).map(ToString::to_string))
                    .unwrap_or_default()
            };
            entries.push((key, memory));
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(_, memory)| RecalledMemory {
                memory,
                score: None,
            })
            .collect())
    }

    /// Removes a memory from both tiers.
    ///
    /// Search removal happens first and is best-effort; document removal
    /// fails loudly so a missing id surfaces as [`Error::NotFound`].
    pub fn remove(&self, id: &MemoryId) -> Result<()> {
        self.search.remove(id);
        self.store.remove(id)
    }

    /// Persists the search state into the document store.
    pub fn save(&self) -> Result<()> {
        self.search.save(&self.store)
    }

    /// Reloads the search state from the document store.
    pub fn load(&self) -> Result<()> {
        self.search.load(&self.store)
    }

    /// Drops every document and all search state.
    pub fn clear(&self) -> Result<()> {
        self.search.clear();
        self.store.clear()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::SchemaType;
    use url::Url;

    fn memory(url: &str, text: &str) -> Memory {
        let url = Url::parse(url).unwrap();
        let mut m = Memory::new(MemoryId::from(&url), SchemaType::WebPage, url);
        m.name = "page".to_string();
        m.text = text.to_string();
        m
    }

    fn open() -> (Index, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (Index::open(dir.path()).unwrap(), dir)
    }

    #[test]
    fn indexed_memory_is_searchable() {
        let (index, _dir) = open();
        index.index(&[memory("https://a.com/x", "findable words here")]);
        let hits = index.search("findable").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id.as_str(), "https://a.com/x");
        assert!(hits[0].score.is_some());
    }

    #[test]
    fn reindex_merges_and_keeps_creation_time() {
        let (index, _dir) = open();
        let mut first = memory("https://a.com/x", "original");
        first.summary = "kept summary".to_string();
        index.index(std::slice::from_ref(&first));
        let created = index
            .get_by_id(&first.id, false, false)
            .unwrap()
            .created_at;

        let mut second = memory("https://a.com/x", "updated text");
        second.summary = String::new();
        second.created_at = created + chrono::Duration::hours(1);
        index.index(std::slice::from_ref(&second));

        let stored = index.get_by_id(&first.id, false, false).unwrap();
        assert_eq!(stored.text, "updated text");
        assert_eq!(stored.created_at, created);
        // Empty string is still a present value and wins the merge.
        assert_eq!(stored.summary, "");
        assert!(index.search("original").unwrap().is_empty());
    }

    #[test]
    fn batch_continues_past_a_failing_upsert() {
        use sha2::{Digest, Sha256};

        let (index, dir) = open();
        // Corrupt the on-disk document for the second id so its upsert
        // fails when the merge reads the current revision.
        let key = hex::encode(Sha256::digest(b"https://a.com/2"));
        std::fs::write(dir.path().join("docs").join(format!("{key}.json")), b"{nope").unwrap();

        index.index(&[
            memory("https://a.com/1", "alpha"),
            memory("https://a.com/2", "beta"),
            memory("https://a.com/3", "gamma"),
        ]);
        assert_eq!(index.search("alpha").unwrap().len(), 1);
        assert!(index.search("beta").unwrap().is_empty());
        assert_eq!(index.search("gamma").unwrap().len(), 1);
    }

    #[test]
    fn search_hit_without_a_document_is_dropped() {
        use sha2::{Digest, Sha256};

        let (index, dir) = open();
        index.index(&[
            memory("https://a.com/gone", "shared words"),
            memory("https://a.com/kept", "shared words"),
        ]);

        // Delete one backing document out from under the search index.
        let key = hex::encode(Sha256::digest(b"https://a.com/gone"));
        std::fs::remove_file(dir.path().join("docs").join(format!("{key}.json"))).unwrap();

        let hits = index.search("shared").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id.as_str(), "https://a.com/kept");
    }

    #[test]
    fn embedded_memories_never_surface_in_search() {
        let (index, _dir) = open();
        let page_url = Url::parse("https://a.com/page").unwrap();
        let clip_url = Url::parse("https://a.com/clip.mp4").unwrap();

        let mut page = memory(page_url.as_str(), "page text media");
        page.embedded_ids = Some(vec![MemoryId::from(&clip_url)]);
        let mut clip = Memory::new(
            MemoryId::from(&clip_url),
            SchemaType::VideoObject,
            clip_url,
        );
        clip.text = "clip media".to_string();
        clip.embedded_in_id = Some(page.id.clone());
        index.index(&[page.clone(), clip]);

        let hits = index.search("media").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id, page.id);
        // The page hit arrives hydrated with its child.
        assert_eq!(hits[0].memory.embedded.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn hydration_drops_unresolvable_children() {
        let (index, _dir) = open();
        let mut page = memory("https://a.com/page", "text");
        page.embedded_ids = Some(vec![MemoryId::from("https://a.com/never-stored.mp4")]);
        index.index(std::slice::from_ref(&page));

        let got = index.get_by_id(&page.id, false, true).unwrap();
        assert!(got.embedded.is_none());
        assert!(got.embedded_ids.is_some());
    }

    #[test]
    fn all_lists_newest_first_and_pages() {
        let (index, _dir) = open();
        for i in 0..3 {
            let mut m = memory(&format!("https://a.com/{i}"), "text");
            m.created_at = chrono::DateTime::from_timestamp(1_700_000_000 + i, 0).unwrap();
            index.index(std::slice::from_ref(&m));
        }

        let all = index.all(10, 0, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].memory.id.as_str(), "https://a.com/2");
        assert!(all[0].score.is_none());

        let paged = index.all(1, 1, None).unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].memory.id.as_str(), "https://a.com/1");
    }

    #[test]
    fn listing_order_is_chronological_across_subsecond_precision() {
        let (index, _dir) = open();
        // 0.123s vs 0.123456s within the same second: variable-precision
        // RFC 3339 text would sort these the wrong way around.
        let mut older = memory("https://a.com/older", "text");
        older.created_at = chrono::DateTime::from_timestamp(1_700_000_000, 123_000_000).unwrap();
        let mut newer = memory("https://a.com/newer", "text");
        newer.created_at = chrono::DateTime::from_timestamp(1_700_000_000, 123_456_000).unwrap();
        index.index(&[older, newer]);

        let all = index.all(10, 0, None).unwrap();
        assert_eq!(all[0].memory.id.as_str(), "https://a.com/newer");
        assert_eq!(all[1].memory.id.as_str(), "https://a.com/older");
    }

    #[test]
    fn reserved_documents_stay_out_of_listings() {
        let (index, _dir) = open();
        index.index(&[memory("https://a.com/x", "text")]);
        index.save().unwrap();
        let all = index.all(10, 0, None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].memory.id.as_str(), "https://a.com/x");
    }

    #[test]
    fn remove_clears_both_tiers() {
        let (index, _dir) = open();
        let m = memory("https://a.com/x", "ephemeral");
        index.index(std::slice::from_ref(&m));
        index.remove(&m.id).unwrap();

        assert!(matches!(
            index.get_by_id(&m.id, false, false),
            Err(Error::NotFound(_))
        ));
        assert!(index.search("ephemeral").unwrap().is_empty());
        assert!(matches!(index.remove(&m.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn search_state_survives_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = Index::open(dir.path()).unwrap();
            index.index(&[memory("https://a.com/x", "durable")]);
            index.save().unwrap();
        }
        let reopened = Index::open(dir.path()).unwrap();
        assert_eq!(reopened.search("durable").unwrap().len(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let (index, _dir) = open();
        index.index(&[memory("https://a.com/x", "gone")]);
        index.save().unwrap();
        index.clear().unwrap();
        assert!(index.search("gone").unwrap().is_empty());
        assert!(index.all(10, 0, None).unwrap().is_empty());
    }
}
