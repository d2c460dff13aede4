//! Parser dispatch.
//!
//! A committed resource is turned into zero-or-more memories by a
//! format-specific strategy. Dispatch is over [`MediaKind`], a closed set
//! of variants with an explicit binary fallback, so the table is
//! exhaustively checkable. The built-in strategies are intentionally
//! shallow; rich extraction belongs to external parser collaborators.

pub mod html;

use crate::models::{Committable, Memory, MemoryId, SchemaType};
use crate::{Error, Result};
use url::Url;

/// Maximum length of a derived abstract, in characters.
const ABSTRACT_CHARS: usize = 280;

/// Closed classification of committable media types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// `text/html`.
    Html,
    /// `text/plain`.
    PlainText,
    /// `text/markdown`.
    Markdown,
    /// `text/uri-list`.
    UriList,
    /// `image/*`.
    Image,
    /// `audio/*`.
    Audio,
    /// `video/*`.
    Video,
    /// `application/pdf`.
    Pdf,
    /// Fallback for everything else.
    Binary,
}

impl MediaKind {
    /// Classifies a media type string.
    #[must_use]
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or(media_type)
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/html" => Self::Html,
            "text/plain" => Self::PlainText,
            "text/markdown" => Self::Markdown,
            "text/uri-list" => Self::UriList,
            "application/pdf" => Self::Pdf,
            _ if essence.starts_with("image/") => Self::Image,
            _ if essence.starts_with("audio/") => Self::Audio,
            _ if essence.starts_with("video/") => Self::Video,
            _ => Self::Binary,
        }
    }
}

/// Parser dispatch over the closed [`MediaKind`] set.
#[derive(Debug, Default)]
pub struct ParserRegistry;

impl ParserRegistry {
    /// Creates the registry of built-in strategies.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses a committable into memories. The first element is the
    /// primary memory of the submission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the payload is empty.
    pub fn parse(&self, committable: &Committable) -> Result<Vec<Memory>> {
        if committable.blob.is_empty() {
            return Err(Error::InvalidInput(format!(
                "empty payload for {}",
                committable.url
            )));
        }
        let kind = MediaKind::from_media_type(&committable.encoding_format);
        tracing::debug!(url = %committable.url, kind = ?kind, "parsing committable");
        let memories = match kind {
            MediaKind::Html => parse_html(committable),
            // A crawled resource can itself be a uri-list; index it as text.
            MediaKind::PlainText | MediaKind::Markdown | MediaKind::UriList => {
                vec![parse_text(committable)]
            }
            MediaKind::Image => vec![parse_media(committable, SchemaType::ImageObject)],
            MediaKind::Audio => vec![parse_media(committable, SchemaType::AudioObject)],
            MediaKind::Video => vec![parse_media(committable, SchemaType::VideoObject)],
            MediaKind::Pdf => vec![parse_media(committable, SchemaType::DigitalDocument)],
            MediaKind::Binary => vec![parse_media(committable, SchemaType::Thing)],
        };
        Ok(memories)
    }
}

/// Builds the primary `WebPage` memory plus embedded media children.
fn parse_html(committable: &Committable) -> Vec<Memory> {
    let url = &committable.url;
    let text = html::extract_text(&committable.blob);
    let name = html::extract_title(&committable.blob)
        .or_else(|| committable.name.clone())
        .unwrap_or_else(|| url.to_string());

    let mut page = Memory::new(MemoryId::from(url), SchemaType::WebPage, url.clone());
    page.name = name;
    page.summary = abstract_of(&text);
    page.text = text;
    page.encoding_format.clone_from(&committable.encoding_format);

    let mut memories = Vec::new();
    let mut embedded_ids = Vec::new();
    for video_url in html::extract_video_sources(url, &committable.blob) {
        // Keep the child id distinct from the page id.
        if video_url == *url {
            continue;
        }
        let mut video = Memory::new(
            MemoryId::from(&video_url),
            SchemaType::VideoObject,
            video_url.clone(),
        );
        video.name = last_segment(&video_url);
        video.text.clone_from(&video.name);
        video.encoding_format = "video/*".to_string();
        video.embedded_in_id = Some(page.id.clone());
        embedded_ids.push(video.id.clone());
        memories.push(video);
    }
    if !embedded_ids.is_empty() {
        page.embedded_ids = Some(embedded_ids);
    }

    memories.insert(0, page);
    memories
}

/// Builds a text memory; the whole body is indexable.
fn parse_text(committable: &Committable) -> Memory {
    let url = &committable.url;
    let text = String::from_utf8_lossy(&committable.blob).into_owned();
    let name = committable
        .name
        .clone()
        .or_else(|| {
            text.lines()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().chars().take(80).collect::<String>())
        })
        .unwrap_or_else(|| url.to_string());

    let mut memory = Memory::new(MemoryId::from(url), SchemaType::DigitalDocument, url.clone());
    memory.name = name;
    memory.summary = abstract_of(&text);
    memory.text = text;
    memory.encoding_format.clone_from(&committable.encoding_format);
    memory
}

/// Builds a media memory; only the name is indexable until an enhancer
/// supplies richer text.
fn parse_media(committable: &Committable, schema_type: SchemaType) -> Memory {
    let url = &committable.url;
    let name = committable
        .name
        .clone()
        .unwrap_or_else(|| last_segment(url));

    let mut memory = Memory::new(MemoryId::from(url), schema_type, url.clone());
    memory.name.clone_from(&name);
    memory.summary.clone_from(&name);
    memory.text = name;
    memory.encoding_format.clone_from(&committable.encoding_format);
    memory
}

/// First `ABSTRACT_CHARS` characters of the text, on a char boundary.
fn abstract_of(text: &str) -> String {
    text.chars().take(ABSTRACT_CHARS).collect()
}

/// Last path segment of a URL, or the whole URL when there is none.
fn last_segment(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .map_or_else(|| url.to_string(), ToString::to_string)
}
