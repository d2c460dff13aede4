//! End-to-end tests over the full remember / search / forget / rebuild
//! lifecycle, using a canned fetcher so no network is involved.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use memoria::models::{MemoryId, RememberOptions, Rememberable};
use memoria::{Config, CrawlPolicy, Error, Fetch, Mind, Resource};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Serves canned bodies by URL; everything else is a fetch failure.
struct CannedFetcher {
    pages: HashMap<Url, (&'static str, &'static [u8])>,
}

impl CannedFetcher {
    fn new(pages: &[(&str, &'static str, &'static [u8])]) -> Arc<dyn Fetch> {
        let pages = pages
            .iter()
            .map(|(url, media_type, body)| (Url::parse(url).unwrap(), (*media_type, *body)))
            .collect();
        Arc::new(Self { pages })
    }
}

#[async_trait]
impl Fetch for CannedFetcher {
    async fn fetch(&self, uri: &Url) -> memoria::Result<Resource> {
        self.pages.get(uri).map_or_else(
            || Err(Error::NotFound(uri.to_string())),
            |(media_type, body)| {
                Ok(Resource::new(
                    uri.clone(),
                    (*media_type).to_string(),
                    body.to_vec(),
                ))
            },
        )
    }
}

fn scope(dir: &tempfile::TempDir, fetcher: Arc<dyn Fetch>) -> Mind {
    let config = Config::default().with_data_dir(dir.path());
    Mind::open_with_fetcher(&config, "it", "main", fetcher).unwrap()
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn remembered_url_is_searchable_by_page_text() {
    let fetcher = CannedFetcher::new(&[(
        "https://site.com/article",
        "text/html",
        b"<title>Gardening</title><p>growing tomatoes in clay soil</p>",
    )]);
    let dir = tempfile::tempdir().unwrap();
    let mind = scope(&dir, fetcher);

    let committed = mind
        .remember(
            Rememberable::uri_list(&[url("https://site.com/article")]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(committed.len(), 1);

    let hits = mind.search("tomatoes").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].memory.name, "Gardening");
    assert_eq!(hits[0].memory.id.as_str(), "https://site.com/article");
}

#[tokio::test]
async fn children_policy_commits_sibling_pages() {
    let fetcher = CannedFetcher::new(&[
        (
            "https://site.com/docs/intro.html",
            "text/html",
            br#"<title>Intro</title><a href="/docs/setup.html">setup</a><a href="/other/far.html">far</a>"#,
        ),
        (
            "https://site.com/docs/setup.html",
            "text/html",
            b"<title>Setup</title><p>installation steps</p>",
        ),
        (
            "https://site.com/other/far.html",
            "text/html",
            b"<title>Far</title><p>should not be visited</p>",
        ),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let mind = scope(&dir, fetcher);

    let options = RememberOptions {
        crawl: CrawlPolicy::Children,
        depth: 0,
    };
    let committed = mind
        .remember(
            Rememberable::uri_list(&[url("https://site.com/docs/intro.html")]),
            Some(options),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = committed.iter().map(|m| m.id.as_str()).collect();
    assert!(ids.contains(&"https://site.com/docs/intro.html"));
    assert!(ids.contains(&"https://site.com/docs/setup.html"));
    assert!(!ids.contains(&"https://site.com/other/far.html"));

    assert_eq!(mind.search("installation").unwrap().len(), 1);
    assert!(mind.search("visited").unwrap().is_empty());
}

#[tokio::test]
async fn broken_link_does_not_lose_the_rest_of_a_crawl() {
    let fetcher = CannedFetcher::new(&[
        (
            "https://site.com/docs/a.html",
            "text/html",
            br#"<a href="/docs/missing.html">gone</a><a href="/docs/b.html">b</a>"#,
        ),
        (
            "https://site.com/docs/b.html",
            "text/html",
            b"<p>survivor page</p>",
        ),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let mind = scope(&dir, fetcher);

    let options = RememberOptions {
        crawl: CrawlPolicy::Children,
        depth: 0,
    };
    let committed = mind
        .remember(
            Rememberable::uri_list(&[url("https://site.com/docs/a.html")]),
            Some(options),
        )
        .await
        .unwrap();

    assert_eq!(committed.len(), 2);
    assert_eq!(mind.search("survivor").unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_seed_fails_the_whole_remember() {
    let fetcher = CannedFetcher::new(&[]);
    let dir = tempfile::tempdir().unwrap();
    let mind = scope(&dir, fetcher);

    let result = mind
        .remember(
            Rememberable::uri_list(&[url("https://site.com/nothing-here")]),
            None,
        )
        .await;
    assert!(result.is_err());
    assert!(mind.all(None, 0, None).unwrap().is_empty());
}

#[tokio::test]
async fn embedded_video_is_recallable_but_never_a_search_hit() {
    let fetcher = CannedFetcher::new(&[(
        "https://site.com/watch",
        "text/html",
        br#"<title>Clips</title><video src="/media/launch.mp4"></video><p>rocket launch footage</p>"#,
    )]);
    let dir = tempfile::tempdir().unwrap();
    let mind = scope(&dir, fetcher);

    mind.remember(Rememberable::uri_list(&[url("https://site.com/watch")]), None)
        .await
        .unwrap();

    // Only the page surfaces, hydrated with its embedded child.
    let hits = mind.search("launch").unwrap();
    assert_eq!(hits.len(), 1);
    let page = &hits[0].memory;
    assert_eq!(page.id.as_str(), "https://site.com/watch");
    let children = page.embedded.as_ref().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id.as_str(), "https://site.com/media/launch.mp4");

    // Listings hide the embedded child as well.
    let all = mind.all(None, 0, None).unwrap();
    assert_eq!(all.len(), 1);

    // Direct recall of the child still works.
    let child = mind
        .recall(&MemoryId::from("https://site.com/media/launch.mp4"), false)
        .unwrap();
    assert_eq!(child.embedded_in_id.as_ref().unwrap().as_str(), "https://site.com/watch");
}

#[tokio::test]
async fn forget_then_rebuild_keeps_it_forgotten() {
    let fetcher = CannedFetcher::new(&[
        (
            "https://site.com/keep",
            "text/html",
            b"<title>Keep</title><p>durable content</p>",
        ),
        (
            "https://site.com/drop",
            "text/html",
            b"<title>Drop</title><p>ephemeral content</p>",
        ),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let mind = scope(&dir, fetcher);

    for target in ["https://site.com/keep", "https://site.com/drop"] {
        mind.remember(
            Rememberable::uri_list(&[url(target)]).with_url(url(target)),
            None,
        )
        .await
        .unwrap();
    }
    assert_eq!(mind.all(None, 0, None).unwrap().len(), 2);

    mind.forget(&url("https://site.com/drop")).await.unwrap();
    assert!(mind.search("ephemeral").unwrap().is_empty());

    mind.rebuild().await.unwrap();
    assert_eq!(mind.search("durable").unwrap().len(), 1);
    assert!(mind.search("ephemeral").unwrap().is_empty());
    assert!(matches!(
        mind.recall(&MemoryId::from("https://site.com/drop"), false),
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn rebuild_replays_crawls_with_the_recorded_policy() {
    let fetcher = CannedFetcher::new(&[
        (
            "https://site.com/docs/intro.html",
            "text/html",
            br#"<title>Intro</title><a href="/docs/setup.html">setup</a>"#,
        ),
        (
            "https://site.com/docs/setup.html",
            "text/html",
            b"<title>Setup</title><p>installation steps</p>",
        ),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let mind = scope(&dir, fetcher);

    let options = RememberOptions {
        crawl: CrawlPolicy::Children,
        depth: 0,
    };
    mind.remember(
        Rememberable::uri_list(&[url("https://site.com/docs/intro.html")]),
        Some(options),
    )
    .await
    .unwrap();
    assert_eq!(mind.all(None, 0, None).unwrap().len(), 2);

    mind.clear().await.unwrap();
    mind.rebuild().await.unwrap();

    // The journaled options drove the replayed crawl; the sibling page
    // found through the link is back too.
    assert_eq!(mind.all(None, 0, None).unwrap().len(), 2);
    assert_eq!(mind.search("installation").unwrap().len(), 1);
}

#[tokio::test]
async fn index_survives_reopening_the_scope() {
    let fetcher = CannedFetcher::new(&[(
        "https://site.com/page",
        "text/html",
        b"<title>Page</title><p>persisted knowledge</p>",
    )]);
    let dir = tempfile::tempdir().unwrap();

    {
        let mind = scope(&dir, Arc::clone(&fetcher));
        mind.remember(Rememberable::uri_list(&[url("https://site.com/page")]), None)
            .await
            .unwrap();
        mind.save().await.unwrap();
    }

    let reopened = scope(&dir, fetcher);
    let hits = reopened.search("persisted").unwrap();
    assert_eq!(hits.len(), 1);

    // The raw source bytes survive too.
    let memory = reopened
        .recall(&MemoryId::from("https://site.com/page"), true)
        .unwrap();
    let attachment = &memory.attachments.as_ref().unwrap()["https://site.com/page"];
    assert_eq!(attachment.content_type, "text/html");
    assert!(attachment.data.as_ref().unwrap().windows(4).any(|w| w == b"Page"));
}

#[tokio::test]
async fn remembering_again_refreshes_content_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();

    {
        let fetcher = CannedFetcher::new(&[(
            "https://site.com/news",
            "text/html",
            b"<title>News</title><p>yesterday headline</p>",
        )]);
        let mind = scope(&dir, fetcher);
        mind.remember(Rememberable::uri_list(&[url("https://site.com/news")]), None)
            .await
            .unwrap();
        mind.save().await.unwrap();
    }

    let fetcher = CannedFetcher::new(&[(
        "https://site.com/news",
        "text/html",
        b"<title>News</title><p>today headline</p>",
    )]);
    let mind = scope(&dir, fetcher);
    mind.remember(Rememberable::uri_list(&[url("https://site.com/news")]), None)
        .await
        .unwrap();

    assert_eq!(mind.all(None, 0, None).unwrap().len(), 1);
    assert_eq!(mind.search("today").unwrap().len(), 1);
    assert!(mind.search("yesterday").unwrap().is_empty());
}
