//! Graph crawler.
//!
//! A generic, single-invocation walker over a frontier of URIs and
//! already-fetched resources. Traversal is breadth-first and strictly
//! sequential within one invocation: resources are yielded in frontier
//! order, never fetch-completion order. The crawl is a lazy, pull-based
//! sequence; consumers may stop early without walking the full graph.

mod filters;

pub use filters::{CrawlPolicy, Filter};

use crate::fetch::{Fetch, Resource};
use crate::models::RememberOptions;
use crate::{Error, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use url::Url;

/// A transient traversal unit: something enqueued on the frontier.
#[derive(Debug)]
pub enum Crawlable {
    /// A URI still to be fetched.
    Uri(Url),
    /// A resource already resolved by the caller.
    Resource(Resource),
}

impl Crawlable {
    /// The URI this unit resolves to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        match self {
            Self::Uri(url) => url,
            Self::Resource(resource) => &resource.url,
        }
    }
}

/// Factory for crawl invocations over a fetcher and a filter set.
pub struct Crawler {
    fetcher: Arc<dyn Fetch>,
    filters: Vec<Filter>,
    depth_limit: u32,
    max_visits: usize,
}

impl Crawler {
    /// Creates a crawler applying the policy in `options`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetch>, options: RememberOptions, max_visits: usize) -> Self {
        Self {
            fetcher,
            filters: vec![options.crawl.filter()],
            depth_limit: options.depth,
            max_visits,
        }
    }

    /// Replaces the filter set, allowing callers to compose policies.
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    /// Starts a crawl invocation seeded with `seed`.
    #[must_use]
    pub fn crawl(&self, seed: Crawlable) -> Crawl {
        let seed_url = seed.url().clone();
        let mut frontier = VecDeque::new();
        frontier.push_back(QueueItem {
            target: seed,
            depth: 0,
        });
        Crawl {
            fetcher: Arc::clone(&self.fetcher),
            filters: self.filters.clone(),
            depth_limit: self.depth_limit,
            max_visits: self.max_visits,
            seed_url,
            frontier,
            visited: HashSet::new(),
            visits: 0,
        }
    }
}

struct QueueItem {
    target: Crawlable,
    depth: u32,
}

/// One in-flight crawl invocation.
///
/// The visited set is scoped to this invocation only; nothing is
/// persisted across calls.
pub struct Crawl {
    fetcher: Arc<dyn Fetch>,
    filters: Vec<Filter>,
    depth_limit: u32,
    max_visits: usize,
    seed_url: Url,
    frontier: VecDeque<QueueItem>,
    visited: HashSet<Url>,
    visits: usize,
}

impl Crawl {
    /// Advances to the next visitable resource.
    ///
    /// Returns `None` once the frontier is exhausted or the visit cap is
    /// reached. A failed fetch is surfaced as `Some(Err(_))`; the crawl
    /// remains usable, so callers choose between aborting and
    /// log-and-continue.
    pub async fn next(&mut self) -> Option<Result<Resource>> {
        while let Some(item) = self.frontier.pop_front() {
            if self.visits >= self.max_visits {
                tracing::warn!(
                    max_visits = self.max_visits,
                    seed = %self.seed_url,
                    "crawl visit cap reached, stopping"
                );
                return None;
            }

            let url = item.target.url().clone();
            if self.visited.contains(&url) {
                tracing::debug!(url = %url, "skipping already visited url");
                continue;
            }

            // All filters must agree; default (empty) keeps everything.
            let keep = self
                .filters
                .iter()
                .all(|f| f.keep(&url, &self.seed_url, item.depth, self.depth_limit));
            if !keep {
                tracing::debug!(url = %url, depth = item.depth, "filtered out, not fetching");
                continue;
            }

            let resource = match item.target {
                Crawlable::Resource(resource) => resource,
                Crawlable::Uri(uri) => match self.fetcher.fetch(&uri).await {
                    Ok(resource) => resource,
                    Err(e) => {
                        self.visited.insert(url);
                        return Some(Err(Error::op(
                            "crawl_fetch",
                            format!("fetching {uri}: {e}"),
                        )));
                    }
                },
            };

            self.visited.insert(url);
            self.visits += 1;

            // Expand the frontier before yielding; yields still follow
            // frontier order.
            for link in resource.links() {
                self.frontier.push_back(QueueItem {
                    target: Crawlable::Uri(link),
                    depth: item.depth + 1,
                });
            }

            tracing::debug!(url = %resource.url, depth = item.depth, "visiting resource");
            return Some(Ok(resource));
        }
        None
    }
}
