//! # Memoria
//!
//! A personal memory engine.
//!
//! Memoria accepts arbitrary resources (URLs, files, notes), fetches and
//! classifies them, and makes them recallable by full-text search or by
//! stable identifier. The append-only command log is the source of truth;
//! the index is a derived, rebuildable cache.
//!
//! ## Architecture
//!
//! - **Command log**: file-per-event journal of user actions, replayable
//!   to reconstruct the whole index ([`journal`])
//! - **Crawler**: lazy breadth-first graph walker with pluggable
//!   traversal filters ([`crawl`])
//! - **Index**: a document store plus an inverted search index behind one
//!   façade ([`storage`])
//! - **Mind**: the orchestrator composing the above into
//!   `remember / commit / forget / search / recall / rebuild` ([`mind`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use memoria::{Config, Mind, Rememberable};
//!
//! let mind = Mind::open(&config, "home", "main")?;
//! let memories = mind.remember(Rememberable::note("remember this"), None).await?;
//! let hits = mind.search("remember")?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod crawl;
pub mod enhance;
pub mod fetch;
pub mod identity;
pub mod journal;
pub mod mind;
pub mod models;
pub mod parse;
pub mod storage;

// Re-exports for convenience
pub use config::Config;
pub use crawl::{CrawlPolicy, Crawler};
pub use fetch::{Fetch, FetchDispatcher, Resource};
pub use journal::CommandLog;
pub use mind::Mind;
pub use models::{
    Command, Committable, Memory, MemoryId, RecalledMemory, RememberOptions, Rememberable,
    SchemaType,
};
pub use storage::Index;

/// Error type for memoria operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An id was not present in the document store, or a journal entry
    /// lacked a resolvable identifier for removal.
    ///
    /// Surfaced to the caller; never retried automatically.
    #[error("not found: {0}")]
    NotFound(String),

    /// The fetcher or parser could not classify the input.
    ///
    /// The submission is rejected.
    #[error("unsupported medium: {0}")]
    UnsupportedMedium(String),

    /// A concurrent upsert race exhausted its internal retries.
    ///
    /// The document store retries merge application against the latest
    /// revision a bounded number of times before surfacing this.
    #[error("store conflict on '{id}' after {retries} retries")]
    StoreConflict {
        /// The contended document id.
        id: String,
        /// How many retries were attempted.
        retries: u32,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when filesystem I/O, network fetches, or serialization fail.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn op(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for memoria operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::NotFound("cid:abc".to_string());
        assert_eq!(err.to_string(), "not found: cid:abc");

        let err = Error::op("read_journal", "permission denied");
        assert_eq!(
            err.to_string(),
            "operation 'read_journal' failed: permission denied"
        );

        let err = Error::StoreConflict {
            id: "cid:abc".to_string(),
            retries: 3,
        };
        assert_eq!(
            err.to_string(),
            "store conflict on 'cid:abc' after 3 retries"
        );
    }
}
