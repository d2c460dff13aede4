//! Traversal filter policies.
//!
//! Filters are pure predicates over `(candidate, seed, depth, depth
//! limit)`. A crawl combines its configured filters with logical AND; a
//! single `false` rejects the candidate before it is fetched.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

/// Traversal policy selected at `remember` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlPolicy {
    /// Visit only the seed itself.
    #[default]
    Single,
    /// Visit pages sharing the seed's immediate parent path.
    Children,
    /// Visit up to a fixed link depth from the seed.
    Depth,
    /// Visit pages under the seed's directory prefix.
    Descendants,
    /// Visit pages on the seed's registrable domain.
    Domain,
    /// Visit pages on exactly the seed's hostname.
    Subdomain,
}

impl CrawlPolicy {
    /// Returns the filter implementing this policy.
    #[must_use]
    pub const fn filter(self) -> Filter {
        match self {
            Self::Single => Filter::Single,
            Self::Children => Filter::Child,
            Self::Depth => Filter::Depth,
            Self::Descendants => Filter::Descendant,
            Self::Domain => Filter::Domain,
            Self::Subdomain => Filter::Subdomain,
        }
    }
}

impl FromStr for CrawlPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "children" => Ok(Self::Children),
            "depth" => Ok(Self::Depth),
            "descendants" => Ok(Self::Descendants),
            "domain" => Ok(Self::Domain),
            "subdomain" => Ok(Self::Subdomain),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown crawl policy: {other}"
            ))),
        }
    }
}

/// A traversal filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Keep only the literal seed URL.
    Single,
    /// Keep candidates sharing the seed's origin and immediate parent
    /// path segment. Query strings are ignored. The "parent path" of a
    /// URL with a file extension is its directory; an extensionless URL
    /// is its own parent.
    Child,
    /// Keep candidates whose `origin + directory-of-path` starts with the
    /// seed's. Different origins are always rejected.
    Descendant,
    /// Keep candidates whose last two hostname labels equal the seed's.
    ///
    /// Known limitation: no public-suffix list is consulted, so
    /// multi-label TLDs (e.g. `.co.uk`) match too broadly.
    Domain,
    /// Keep candidates on exactly the seed's hostname.
    Subdomain,
    /// Keep candidates while the current depth is within the limit.
    Depth,
}

impl Filter {
    /// Evaluates the predicate. `true` means keep.
    #[must_use]
    pub fn keep(self, url: &Url, seed: &Url, current_depth: u32, depth_limit: u32) -> bool {
        match self {
            Self::Single => url == seed,
            Self::Child => child_base(url) == child_base(seed),
            Self::Descendant => dir_base(url).starts_with(&dir_base(seed)),
            Self::Domain => registrable(url) == registrable(seed),
            Self::Subdomain => url.host_str() == seed.host_str(),
            Self::Depth => current_depth <= depth_limit,
        }
    }
}

/// Origin plus parent path: the directory for paths with a file
/// extension, the path itself otherwise.
fn child_base(url: &Url) -> String {
    let path = url.path();
    let base = if has_extension(path) {
        dirname(path)
    } else {
        path
    };
    format!("{}{}", url.origin().ascii_serialization(), base)
}

/// Origin plus directory of path.
fn dir_base(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), dirname(url.path()))
}

/// Last two labels of the hostname.
fn registrable(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let labels: Vec<&str> = host.split('.').collect();
    let start = labels.len().saturating_sub(2);
    Some(labels[start..].join("."))
}

/// Directory of a URL path: everything before the final slash, `/` at
/// the root.
fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Whether the final path segment carries a file extension.
fn has_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or("");
    matches!(last.rfind('.'), Some(i) if i > 0)
}
