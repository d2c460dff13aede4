//! Memory types and identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Unique identifier for a memory.
///
/// Always URI-shaped: either the resource's canonical location
/// (`https://...`, `file://...`) or a content-derived `cid:` URI.
/// Immutable once assigned; doubles as the document-store primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a new memory ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the ID back into a URL.
    pub fn to_url(&self) -> crate::Result<Url> {
        Url::parse(&self.0)
            .map_err(|e| crate::Error::InvalidInput(format!("id '{}' is not a URI: {e}", self.0)))
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&Url> for MemoryId {
    fn from(url: &Url) -> Self {
        Self(url.to_string())
    }
}

/// Schema discriminator for a memory.
///
/// A closed set of tagged variants with [`SchemaType::Thing`] as the
/// explicit fallback, so dispatch tables over it are exhaustively
/// checkable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemaType {
    /// A web page.
    WebPage,
    /// A still image.
    ImageObject,
    /// An audio recording.
    AudioObject,
    /// A video.
    VideoObject,
    /// A document file (PDF and similar).
    DigitalDocument,
    /// An internal dataset (reserved for serialized index structures).
    Dataset,
    /// Fallback for anything unclassified.
    #[default]
    Thing,
}

impl SchemaType {
    /// Returns the schema type as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebPage => "WebPage",
            Self::ImageObject => "ImageObject",
            Self::AudioObject => "AudioObject",
            Self::VideoObject => "VideoObject",
            Self::DigitalDocument => "DigitalDocument",
            Self::Dataset => "Dataset",
            Self::Thing => "Thing",
        }
    }
}

/// A binary payload associated with a memory.
///
/// Payload bytes are stored out-of-line by the document store; a read
/// without attachments yields a stub with `data: None` and the length
/// metadata intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Media type of the payload.
    pub content_type: String,
    /// Payload size in bytes.
    pub length: u64,
    /// The payload itself, when loaded.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "super::b64_opt")]
    pub data: Option<Vec<u8>>,
}

impl Attachment {
    /// Creates an attachment carrying its payload.
    #[must_use]
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            length: data.len() as u64,
            data: Some(data),
        }
    }

    /// Returns a copy without the payload, keeping the metadata.
    #[must_use]
    pub fn stub(&self) -> Self {
        Self {
            content_type: self.content_type.clone(),
            length: self.length,
            data: None,
        }
    }
}

/// The canonical stored unit of remembered content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Stable URI identifier; the document-store primary key.
    #[serde(rename = "@id")]
    pub id: MemoryId,
    /// Schema discriminator.
    #[serde(rename = "@type")]
    pub schema_type: SchemaType,
    /// Origin location of the resource.
    pub url: Url,
    /// Display name (headline of a search result).
    pub name: String,
    /// Short summary shown in listings.
    #[serde(rename = "abstract")]
    pub summary: String,
    /// Full text used for search indexing.
    pub text: String,
    /// Media type of the source resource.
    #[serde(rename = "encodingFormat")]
    pub encoding_format: String,
    /// When this memory was first committed. Assigned once, never mutated.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Attachment payloads keyed by attachment id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<BTreeMap<String, Attachment>>,
    /// Ordered id-refs to child memories.
    #[serde(rename = "embeddedIds", default, skip_serializing_if = "Option::is_none")]
    pub embedded_ids: Option<Vec<MemoryId>>,
    /// Back-reference to the parent memory; unset for top-level memories.
    #[serde(rename = "embeddedInId", default, skip_serializing_if = "Option::is_none")]
    pub embedded_in_id: Option<MemoryId>,
    /// Hydrated child memories. Populated at read time by the index
    /// façade; parsers and enhancers leave this unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Vec<Memory>>,
}

impl Memory {
    /// Creates a memory with the given identity and empty content fields.
    #[must_use]
    pub fn new(id: MemoryId, schema_type: SchemaType, url: Url) -> Self {
        Self {
            id,
            schema_type,
            url,
            name: String::new(),
            summary: String::new(),
            text: String::new(),
            encoding_format: String::new(),
            created_at: Utc::now(),
            attachments: None,
            embedded_ids: None,
            embedded_in_id: None,
            embedded: None,
        }
    }

    /// Whether this memory is top-level (not embedded in another).
    ///
    /// Listing and search must filter on this flag.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.embedded_in_id.is_none()
    }

    /// Attaches the given payload under this memory's own id, replacing
    /// any existing attachment set.
    pub fn attach_source(&mut self, content_type: impl Into<String>, data: Vec<u8>) {
        let mut attachments = BTreeMap::new();
        attachments.insert(self.id.to_string(), Attachment::new(content_type, data));
        self.attachments = Some(attachments);
    }
}

/// A memory returned from a read path, with an optional recall score.
#[derive(Debug, Clone, Serialize)]
pub struct RecalledMemory {
    /// The stored memory.
    pub memory: Memory,
    /// Search ranking score, when recalled via full-text search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn memory_id_round_trips_through_url() {
        let id = MemoryId::from(&url("https://example.com/a"));
        assert_eq!(id.as_str(), "https://example.com/a");
        assert_eq!(id.to_url().unwrap(), url("https://example.com/a"));
    }

    #[test]
    fn top_level_flag_follows_embedded_in_id() {
        let mut m = Memory::new(
            MemoryId::from("cid:abc"),
            SchemaType::Thing,
            url("https://example.com"),
        );
        assert!(m.is_top_level());
        m.embedded_in_id = Some(MemoryId::from("https://example.com/parent"));
        assert!(!m.is_top_level());
    }

    #[test]
    fn attachment_survives_json_round_trip() {
        let mut m = Memory::new(
            MemoryId::from("cid:abc"),
            SchemaType::Thing,
            url("https://example.com"),
        );
        m.attach_source("application/octet-stream", vec![0, 159, 146, 150]);

        let json = serde_json::to_string(&m).unwrap();
        let back: Memory = serde_json::from_str(&json).unwrap();
        let att = &back.attachments.unwrap()["cid:abc"];
        assert_eq!(att.data.as_deref(), Some(&[0u8, 159, 146, 150][..]));
        assert_eq!(att.length, 4);
    }

    #[test]
    fn attachment_stub_drops_payload_only() {
        let att = Attachment::new("image/png", vec![1, 2, 3]);
        let stub = att.stub();
        assert_eq!(stub.length, 3);
        assert_eq!(stub.content_type, "image/png");
        assert!(stub.data.is_none());
    }
}
