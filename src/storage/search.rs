//! In-memory inverted search index.
//!
//! Tokenized full-text search over memory text, held entirely in memory
//! and persisted as an attachment on a reserved document inside the
//! document store, so one directory tree holds the whole index state.

use super::document::DocumentStore;
use crate::models::{Attachment, Memory, MemoryId, SchemaType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use url::Url;

/// Document id prefix reserved for index bookkeeping.
pub const RESERVED_PREFIX: &str = "memoria/";

/// Reserved document the serialized search state is attached to.
const SEARCH_DOC_ID: &str = "memoria/search/index";

/// Trait for the full-text side of the index.
pub trait SearchIndex: Send + Sync {
    /// Adds or replaces the indexed text for an id.
    fn update(&self, id: &MemoryId, text: &str);

    /// Returns matching ids with scores, best first.
    fn search(&self, query: &str) -> Vec<(MemoryId, f32)>;

    /// Drops an id from the index. Unknown ids are a no-op; removal is
    /// best-effort by contract.
    fn remove(&self, id: &MemoryId);

    /// Drops all indexed state.
    fn clear(&self);
}

/// Serialized shape of the index state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SearchData {
    /// term -> document id -> term frequency.
    postings: HashMap<String, HashMap<String, u32>>,
    /// document id -> terms, for removal without a full postings scan.
    docs: HashMap<String, HashSet<String>>,
}

/// Term-frequency ranked inverted index.
#[derive(Debug, Default)]
pub struct InvertedSearchIndex {
    data: RwLock<SearchData>,
}

/// Lowercased alphanumeric runs; everything else separates tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl InvertedSearchIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists the index state into `store` under the reserved id.
    pub fn save(&self, store: &dyn DocumentStore) -> Result<()> {
        let body = {
            let data = self.data.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            serde_json::to_vec(&*data).map_err(|e| Error::op("serialize_search_index", e))?
        };
        let id = MemoryId::from(SEARCH_DOC_ID);
        store.upsert(&id, &mut |_| {
            let url = Url::parse("memoria:search/index")
                .map_err(|e| Error::op("search_index_url", e))?;
            let mut doc = Memory::new(id.clone(), SchemaType::Dataset, url);
            doc.name = "search index".to_string();
            let mut attachments = BTreeMap::new();
            attachments.insert(
                SEARCH_DOC_ID.to_string(),
                Attachment::new("application/json", body.clone()),
            );
            doc.attachments = Some(attachments);
            Ok(doc)
        })
    }

    /// Loads persisted state from `store`, replacing the current state.
    /// A store without a persisted index yields an empty one.
    pub fn load(&self, store: &dyn DocumentStore) -> Result<()> {
        let id = MemoryId::from(SEARCH_DOC_ID);
        let doc = match store.get(&id, true) {
            Ok(doc) => doc,
            Err(Error::NotFound(_)) => {
                tracing::debug!("no persisted search index, starting empty");
                self.clear();
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let body = doc
            .attachments
            .as_ref()
            .and_then(|a| a.get(SEARCH_DOC_ID))
            .and_then(|a| a.data.as_deref())
            .ok_or_else(|| Error::op("load_search_index", "persisted index has no payload"))?;
        let loaded: SearchData =
            serde_json::from_slice(body).map_err(|e| Error::op("parse_search_index", e))?;
        let mut data = self.data.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *data = loaded;
        Ok(())
    }
}

impl SearchIndex for InvertedSearchIndex {
    fn update(&self, id: &MemoryId, text: &str) {
        let tokens = tokenize(text);
        let mut data = self.data.write().unwrap_or_else(std::sync::PoisonError::into_inner);

        // Replace semantics: drop the previous postings for this id first.
        if let Some(old_terms) = data.docs.remove(id.as_str()) {
            for term in old_terms {
                if let Some(per_doc) = data.postings.get_mut(&term) {
                    per_doc.remove(id.as_str());
                    if per_doc.is_empty() {
                        data.postings.remove(&term);
                    }
                }
            }
        }

        let mut terms = HashSet::new();
        for token in tokens {
            *data
                .postings
                .entry(token.clone())
                .or_default()
                .entry(id.as_str().to_string())
                .or_insert(0) += 1;
            terms.insert(token);
        }
        data.docs.insert(id.as_str().to_string(), terms);
    }

    fn search(&self, query: &str) -> Vec<(MemoryId, f32)> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }
        let data = self.data.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut scores: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            if let Some(per_doc) = data.postings.get(token) {
                for (doc, tf) in per_doc {
                    #[allow(clippy::cast_precision_loss)]
                    let tf = *tf as f32;
                    *scores.entry(doc.as_str()).or_insert(0.0) += tf;
                }
            }
        }
        let mut hits: Vec<(MemoryId, f32)> = scores
            .into_iter()
            .map(|(doc, score)| (MemoryId::from(doc), score))
            .collect();
        // Score descending, then id for a stable order.
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.as_str().cmp(b.0.as_str()))
        });
        hits
    }

    fn remove(&self, id: &MemoryId) {
        let mut data = self.data.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(terms) = data.docs.remove(id.as_str()) else {
            tracing::debug!(id = %id, "id not in search index, nothing to remove");
            return;
        };
        for term in terms {
            if let Some(per_doc) = data.postings.get_mut(&term) {
                per_doc.remove(id.as_str());
                if per_doc.is_empty() {
                    data.postings.remove(&term);
                }
            }
        }
    }

    fn clear(&self) {
        let mut data = self.data.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *data = SearchData::default();
    }
}
