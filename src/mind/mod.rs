//! The orchestrator.
//!
//! [`Mind`] composes the journal, crawler, parsers, index and
//! enhancement pool into the public operations: remember, commit,
//! forget, search, recall, all, rebuild. One `Mind` owns one scope, a
//! `(space, name)` pair mapping to its own journal and index
//! directories; scopes share nothing.

use crate::config::Config;
use crate::crawl::{Crawlable, Crawler};
use crate::enhance::{EnhancerPool, EnhancerRegistry};
use crate::fetch::{Fetch, FetchDispatcher, Resource};
use crate::identity;
use crate::journal::CommandLog;
use crate::models::{Command, Memory, MemoryId, RecalledMemory, RememberOptions, Rememberable};
use crate::parse::{MediaKind, ParserRegistry};
use crate::storage::Index;
use crate::Result;
use std::sync::Arc;
use url::Url;

/// A single memory scope and the operations over it.
pub struct Mind {
    config: Config,
    journal: CommandLog,
    index: Arc<Index>,
    fetcher: Arc<dyn Fetch>,
    parsers: ParserRegistry,
    pool: EnhancerPool,
}

impl Mind {
    /// Opens the scope `(space, name)` under the configured data
    /// directory, creating it on first use.
    ///
    /// Must be called inside a tokio runtime; the enhancement pool
    /// spawns its workers on open.
    pub fn open(config: &Config, space: &str, name: &str) -> Result<Self> {
        let fetcher: Arc<dyn Fetch> = Arc::new(FetchDispatcher::new(&config.fetch)?);
        Self::open_with_fetcher(config, space, name, fetcher)
    }

    /// Like [`Mind::open`] but with a caller-supplied fetcher.
    pub fn open_with_fetcher(
        config: &Config,
        space: &str,
        name: &str,
        fetcher: Arc<dyn Fetch>,
    ) -> Result<Self> {
        let root = config.data_dir.join(space).join(name);
        tracing::info!(scope = %root.display(), "opening mind");
        let journal = CommandLog::new(root.join("commands"));
        let index = Arc::new(Index::open(root.join("index"))?);
        let pool = EnhancerPool::start(
            Arc::new(EnhancerRegistry::new()),
            Arc::clone(&index),
            &config.enhance,
        );
        Ok(Self {
            config: config.clone(),
            journal,
            index,
            fetcher,
            parsers: ParserRegistry::new(),
            pool,
        })
    }

    /// Remembers a submission: derives its identity, journals it, then
    /// commits it to the index.
    ///
    /// Returns the memories committed synchronously; enhancement
    /// continues in the background.
    pub async fn remember(
        &self,
        rememberable: Rememberable,
        options: Option<RememberOptions>,
    ) -> Result<Vec<Memory>> {
        let fallback = identity::derive_id(rememberable.url.as_ref(), &rememberable.blob)?;
        let committable = rememberable.into_committable(fallback);
        tracing::info!(url = %committable.url, format = %committable.encoding_format, "remembering");

        let command = Command::remember(committable, options);
        self.journal.log(&command)?;
        self.commit(&command).await
    }

    /// Commits a journaled submission: crawls it per its options, parses
    /// every visited resource into memories, indexes them and queues
    /// them for enhancement.
    ///
    /// A failure on the very first resource aborts the commit; failures
    /// on later resources are logged and skipped so one broken link does
    /// not lose the rest of a crawl.
    pub async fn commit(&self, command: &Command) -> Result<Vec<Memory>> {
        let options = command.remember_options.unwrap_or_default();
        let crawler = Crawler::new(
            Arc::clone(&self.fetcher),
            options,
            self.config.crawl.max_visits,
        );

        // A uri-list fans out into one crawl per listed location; any
        // other payload seeds a single crawl with itself.
        let seeds = match MediaKind::from_media_type(&command.payload.encoding_format) {
            MediaKind::UriList => uri_list_urls(&command.payload.blob)
                .into_iter()
                .map(Crawlable::Uri)
                .collect(),
            _ => vec![Crawlable::Resource(Resource::from(command.payload.clone()))],
        };

        let mut committed = Vec::new();
        let mut first = true;
        for seed in seeds {
            let mut crawl = crawler.crawl(seed);
            while let Some(next) = crawl.next().await {
                let resource = match next {
                    Ok(resource) => resource,
                    Err(e) if first => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping failed resource");
                        continue;
                    }
                };
                match self.commit_resource(resource) {
                    Ok(memories) => committed.extend(memories),
                    Err(e) if first => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unparseable resource");
                    }
                }
                first = false;
            }
        }

        self.index.index(&committed);
        self.index.save()?;
        for memory in &committed {
            self.pool.enqueue(memory.clone()).await;
        }
        tracing::info!(count = committed.len(), "committed memories");
        Ok(committed)
    }

    /// Parses one resource; the primary memory keeps the raw source
    /// bytes as an attachment.
    fn commit_resource(&self, resource: Resource) -> Result<Vec<Memory>> {
        let committable = resource.into_committable();
        let mut memories = self.parsers.parse(&committable)?;
        if let Some(primary) = memories.first_mut() {
            primary.attach_source(committable.encoding_format, committable.blob);
        }
        Ok(memories)
    }

    /// Forgets everything remembered from `url`.
    ///
    /// Journal entries go first: once the system of record no longer
    /// holds the submission, a rebuild cannot resurrect it even if index
    /// removal is interrupted. Embedded children are removed
    /// best-effort before the memory itself.
    pub async fn forget(&self, url: &Url) -> Result<()> {
        tracing::info!(url = %url, "forgetting");
        self.journal.remove_by_url(url)?;

        let id = MemoryId::from(url);
        if let Ok(memory) = self.index.get_by_id(&id, false, false) {
            for child in memory.embedded_ids.unwrap_or_default() {
                if let Err(e) = self.index.remove(&child) {
                    tracing::warn!(id = %child, error = %e, "failed to remove embedded child");
                }
            }
        }
        self.index.remove(&id)?;
        self.index.save()
    }

    /// Full-text search over this scope's top-level memories.
    pub fn search(&self, query: &str) -> Result<Vec<RecalledMemory>> {
        self.index.search(query)
    }

    /// Recalls one memory by id, hydrated one level deep.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] when nothing is stored under `id`.
    pub fn recall(&self, id: &MemoryId, with_attachments: bool) -> Result<Memory> {
        self.index.get_by_id(id, with_attachments, true)
    }

    /// Lists top-level memories, newest first by default.
    pub fn all(
        &self,
        limit: Option<usize>,
        skip: usize,
        sort_key: Option<&str>,
    ) -> Result<Vec<RecalledMemory>> {
        self.index
            .all(limit.unwrap_or(self.config.list_limit), skip, sort_key)
    }

    /// Reconstructs the entire index by replaying the journal.
    ///
    /// The index is cleared first; a command that fails to commit is
    /// logged and skipped so one rotten entry cannot block recovery.
    pub async fn rebuild(&self) -> Result<()> {
        tracing::info!("rebuilding index from journal");
        self.pool.drain().await;
        self.index.clear()?;

        let mut commands = Vec::new();
        self.journal.replay(|command| {
            commands.push(command);
            Ok(())
        })?;
        for command in commands {
            if let Err(e) = self.commit(&command).await {
                tracing::warn!(url = %command.payload.url, error = %e, "skipping command during rebuild");
            }
        }
        self.save().await
    }

    /// Waits out in-flight enhancements, then persists the index.
    pub async fn save(&self) -> Result<()> {
        self.pool.drain().await;
        self.index.save()
    }

    /// Reloads persisted index state from disk.
    pub fn load(&self) -> Result<()> {
        self.index.load()
    }

    /// Drops the index. The journal is untouched; [`Mind::rebuild`]
    /// restores everything from it.
    pub async fn clear(&self) -> Result<()> {
        self.pool.drain().await;
        self.index.clear()
    }

    /// Number of enhancements queued or in flight.
    #[must_use]
    pub fn pending_enhancements(&self) -> usize {
        self.pool.pending()
    }
}

/// Splits a `text/uri-list` payload into URLs.
///
/// Lines are trimmed; empty lines and `#` comment lines are skipped, and
/// unparseable lines are logged and dropped.
fn uri_list_urls(blob: &[u8]) -> Vec<Url> {
    String::from_utf8_lossy(blob)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match Url::parse(line) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(line = %line, error = %e, "skipping malformed uri-list line");
                None
            }
        })
        .collect()
}
