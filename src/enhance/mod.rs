//! Background enrichment of memories.
//!
//! Enhancers run after the initial synchronous index write and are
//! best-effort: a failed enhancement leaves the originally indexed
//! memory in place. Dispatch is over the memory's [`SchemaType`], a
//! closed set with an identity fallback. Enhancers must be idempotent
//! and must not assume exclusive access to the memory; the index's
//! per-id upsert serialization is what keeps racing writes safe.

mod queue;

pub use queue::EnhancerPool;

use crate::Result;
use crate::models::{Memory, SchemaType};
use async_trait::async_trait;

/// Trait for enhancement strategies.
#[async_trait]
pub trait Enhance: Send + Sync {
    /// Produces an enriched copy of the memory.
    async fn enhance(&self, memory: Memory) -> Result<Memory>;
}

/// Dispatches a memory to the enhancer registered for its schema type.
#[derive(Debug, Default)]
pub struct EnhancerRegistry {
    webpage: WebPageEnhancer,
}

impl EnhancerRegistry {
    /// Creates the registry of built-in enhancers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enhances a memory. Types without a registered enhancer pass
    /// through unchanged.
    pub async fn enhance(&self, memory: Memory) -> Result<Memory> {
        match memory.schema_type {
            SchemaType::WebPage => self.webpage.enhance(memory).await,
            SchemaType::ImageObject
            | SchemaType::AudioObject
            | SchemaType::VideoObject
            | SchemaType::DigitalDocument
            | SchemaType::Dataset
            | SchemaType::Thing => Ok(memory),
        }
    }
}

/// Back-fills display fields of a web page from its indexed text.
///
/// External enhancer collaborators (screenshots, readability passes)
/// plug in at the same seam.
#[derive(Debug, Default)]
pub struct WebPageEnhancer;

#[async_trait]
impl Enhance for WebPageEnhancer {
    async fn enhance(&self, mut memory: Memory) -> Result<Memory> {
        if memory.name.is_empty() {
            memory.name = memory.text.chars().take(80).collect();
        }
        if memory.summary.is_empty() {
            memory.summary = memory.text.chars().take(280).collect();
        }
        Ok(memory)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::MemoryId;
    use url::Url;

    fn webpage(text: &str) -> Memory {
        let url = Url::parse("https://example.com/a").unwrap();
        let mut m = Memory::new(MemoryId::from(&url), SchemaType::WebPage, url);
        m.text = text.to_string();
        m
    }

    #[tokio::test]
    async fn webpage_enhancer_backfills_and_is_idempotent() {
        let registry = EnhancerRegistry::new();
        let once = registry.enhance(webpage("some page text")).await.unwrap();
        assert_eq!(once.name, "some page text");
        assert_eq!(once.summary, "some page text");

        let twice = registry.enhance(once.clone()).await.unwrap();
        assert_eq!(twice.name, once.name);
        assert_eq!(twice.summary, once.summary);
    }

    #[tokio::test]
    async fn unregistered_types_pass_through() {
        let registry = EnhancerRegistry::new();
        let url = Url::parse("https://example.com/a.png").unwrap();
        let m = Memory::new(MemoryId::from(&url), SchemaType::ImageObject, url);
        let out = registry.enhance(m.clone()).await.unwrap();
        assert_eq!(out.name, m.name);
        assert_eq!(out.id, m.id);
    }
}
