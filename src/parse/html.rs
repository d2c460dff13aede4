//! Minimal built-in HTML extraction.
//!
//! Full HTML parsing is a pluggable-extractor concern; the core only
//! needs titles, indexable text, outbound links and embedded media
//! sources. Regex extraction is deliberately shallow but has no DOM
//! dependency.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Compiles a pattern known valid at build time.
#[allow(clippy::unwrap_used)]
fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap()
}

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?is)<title[^>]*>(.*?)</title>"));

static HREF: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"'#]+)["']"#));

static VIDEO_SRC: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"(?is)<video\s[^>]*?src\s*=\s*["']([^"']+)["']"#));

static SCRIPT_STYLE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?is)<(script|style)[^>]*>.*?</(script|style)>"));

static TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?s)<[^>]+>"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\s+"));

/// Extracts the document title, if any.
#[must_use]
pub fn extract_title(body: &[u8]) -> Option<String> {
    let html = String::from_utf8_lossy(body);
    TITLE
        .captures(&html)
        .map(|c| decode_entities(c[1].trim()))
        .filter(|t| !t.is_empty())
}

/// Extracts the visible text of the document, whitespace-collapsed.
#[must_use]
pub fn extract_text(body: &[u8]) -> String {
    let html = String::from_utf8_lossy(body);
    let without_blocks = SCRIPT_STYLE.replace_all(&html, " ");
    let without_tags = TAG.replace_all(&without_blocks, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Extracts outbound anchor links, resolved against `base`.
///
/// Unresolvable or non-fetchable links are dropped.
#[must_use]
pub fn extract_links(base: &Url, body: &[u8]) -> Vec<Url> {
    let html = String::from_utf8_lossy(body);
    HREF.captures_iter(&html)
        .filter_map(|c| base.join(&c[1]).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https" | "file"))
        .collect()
}

/// Extracts embedded `<video src>` locations, resolved against `base`.
#[must_use]
pub fn extract_video_sources(base: &Url, body: &[u8]) -> Vec<Url> {
    let html = String::from_utf8_lossy(body);
    VIDEO_SRC
        .captures_iter(&html)
        .filter_map(|c| base.join(&c[1]).ok())
        .collect()
}

/// Decodes the handful of entities that matter for indexing.
fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://site.com/blog/post.html").unwrap()
    }

    #[test]
    fn title_and_text() {
        let body = b"<html><head><title> A &amp; B </title><style>p{}</style></head>\
            <body><script>var x=1;</script><p>Hello   <b>world</b></p></body></html>";
        assert_eq!(extract_title(body).as_deref(), Some("A & B"));
        assert_eq!(extract_text(body), "A & B Hello world");
    }

    #[test]
    fn links_resolve_relative_to_base() {
        let body = br#"<a href="/blog/next.html">n</a><a href="other.html">o</a>
            <a href="mailto:x@y.z">m</a>"#;
        let links = extract_links(&base(), body);
        assert_eq!(
            links,
            vec![
                Url::parse("https://site.com/blog/next.html").unwrap(),
                Url::parse("https://site.com/blog/other.html").unwrap(),
            ]
        );
    }

    #[test]
    fn video_sources_are_found() {
        let body = br#"<video controls src="/media/clip.mp4"></video>"#;
        let videos = extract_video_sources(&base(), body);
        assert_eq!(
            videos,
            vec![Url::parse("https://site.com/media/clip.mp4").unwrap()]
        );
    }

    #[test]
    fn missing_title_is_none() {
        assert!(extract_title(b"<p>no title</p>").is_none());
    }
}
