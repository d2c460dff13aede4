//! Journal records and the shapes that feed them.

use crate::crawl::CrawlPolicy;
use serde::{Deserialize, Serialize};
use url::Url;

/// Action tag of a journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandAction {
    /// A resource was submitted for remembering.
    Remember,
}

/// Options attached to a `remember` submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RememberOptions {
    /// Traversal policy applied when the submission is crawled.
    #[serde(default)]
    pub crawl: CrawlPolicy,
    /// Depth limit for the [`CrawlPolicy::Depth`] policy.
    #[serde(default)]
    pub depth: u32,
}

/// The very basics of what is needed to remember something.
///
/// The location is optional; [`crate::Mind::remember`] derives a
/// content-addressed id when it is absent.
#[derive(Debug, Clone)]
pub struct Rememberable {
    /// Media type of the payload.
    pub encoding_format: String,
    /// Raw bytes of the submission.
    pub blob: Vec<u8>,
    /// Original location of the resource, if it has one.
    pub url: Option<Url>,
    /// Display name, available for file uploads.
    pub name: Option<String>,
    /// Character encoding, when known.
    pub encoding: Option<String>,
}

impl Rememberable {
    /// Creates a rememberable from raw bytes and a media type.
    #[must_use]
    pub fn new(encoding_format: impl Into<String>, blob: Vec<u8>) -> Self {
        Self {
            encoding_format: encoding_format.into(),
            blob,
            url: None,
            name: None,
            encoding: None,
        }
    }

    /// Creates a plain-text note.
    #[must_use]
    pub fn note(text: &str) -> Self {
        Self::new("text/plain", text.as_bytes().to_vec())
    }

    /// Creates a `text/uri-list` submission from a set of URLs.
    #[must_use]
    pub fn uri_list(urls: &[Url]) -> Self {
        let body = urls
            .iter()
            .map(Url::as_str)
            .collect::<Vec<_>>()
            .join("\r\n");
        Self::new("text/uri-list", body.into_bytes())
    }

    /// Sets the origin location.
    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Upgrades to a [`Committable`] using `fallback` when no location
    /// was declared.
    #[must_use]
    pub fn into_committable(self, fallback: Url) -> Committable {
        Committable {
            url: self.url.unwrap_or(fallback),
            encoding_format: self.encoding_format,
            blob: self.blob,
            name: self.name,
            encoding: self.encoding,
        }
    }
}

/// Something that can be committed to memory or saved in the command log.
///
/// Identical to [`Rememberable`] except the location is guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Committable {
    /// Location of the resource.
    pub url: Url,
    /// Media type of the payload.
    #[serde(rename = "encodingFormat")]
    pub encoding_format: String,
    /// Raw bytes of the submission.
    #[serde(with = "super::b64")]
    pub blob: Vec<u8>,
    /// Display name, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Character encoding, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// An immutable journal record of a user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// What the user did.
    pub action: CommandAction,
    /// The originating payload.
    #[serde(flatten)]
    pub payload: Committable,
    /// Options the submission carried.
    #[serde(
        rename = "rememberOptions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub remember_options: Option<RememberOptions>,
    /// Journal filename, assigned only after being read back from storage.
    #[serde(skip)]
    pub command_id: Option<String>,
}

impl Command {
    /// Creates a `remember` journal record.
    #[must_use]
    pub const fn remember(payload: Committable, options: Option<RememberOptions>) -> Self {
        Self {
            action: CommandAction::Remember,
            payload,
            remember_options: options,
            command_id: None,
        }
    }
}
