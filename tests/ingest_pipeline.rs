//! End-to-end tests of the ingestion pipeline: subscriptions in the store,
//! feeds served by a mock HTTP server, one or more poll cycles, entries out.

use std::time::Duration;

use feedcrawler::feed::{identity_hash, FeedFetcher};
use feedcrawler::poller::{PollSettings, Poller};
use feedcrawler::storage::{NewFeed, StoreGateway};
use pretty_assertions::assert_eq;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BLOG_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
    <title>Example Blog</title>
    <description>Writing about things</description>
    <item>
        <guid>post-1</guid>
        <title>First post</title>
        <link>https://blog.example/posts/1</link>
        <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
        <content:encoded><![CDATA[<p onclick="steal()">Hello <a href="javascript:alert(1)">there</a><script>evil()</script></p>]]></content:encoded>
    </item>
    <item>
        <guid>https://blog.example/posts/2</guid>
        <title>Second post</title>
        <pubDate>not a date at all</pubDate>
        <description><![CDATA[<img src=" https://blog.example/pic.png " onerror="x()">]]></description>
    </item>
</channel>
</rss>"#;

const NEWS_ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title></title>
    <subtitle>News without a title</subtitle>
    <id>urn:news</id>
    <updated>2024-05-01T10:00:00Z</updated>
    <entry>
        <id>urn:news:1</id>
        <title>Headline</title>
        <link rel="alternate" type="text/html" href="https://news.example/1"/>
        <updated>2024-05-01T10:00:00+02:00</updated>
        <content type="html">&lt;p&gt;Story&lt;/p&gt;</content>
    </entry>
</feed>"#;

fn settings() -> PollSettings {
    PollSettings {
        poll_interval: Duration::from_millis(10),
        fetch_delay: Duration::ZERO,
        max_pending_writes: 4,
    }
}

async fn subscribe(gateway: &StoreGateway, server: &MockServer, feed_path: &str) {
    gateway
        .insert_feed(&NewFeed {
            title: feed_path.to_string(),
            xml_url: format!("{}{}", server.uri(), feed_path),
            html_url: None,
        })
        .await
        .unwrap();
}

async fn mount(server: &MockServer, feed_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(feed_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/xml"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_cycle_normalizes_and_sanitizes_entries() {
    let server = MockServer::start().await;
    mount(&server, "/blog.xml", BLOG_RSS).await;

    let gateway = StoreGateway::open(":memory:").await.unwrap();
    subscribe(&gateway, &server, "/blog.xml").await;

    let poller = Poller::new(
        gateway.clone(),
        FeedFetcher::new(reqwest::Client::new()),
        settings(),
    );
    let (_tx, mut rx) = watch::channel(false);
    let report = poller.run_cycle(&mut rx).await;
    assert_eq!(report.inserted, 2);

    let first = gateway
        .entry_by_id(&identity_hash("post-1", ""))
        .await
        .unwrap()
        .expect("first post stored");
    assert_eq!(first.url, "https://blog.example/posts/1");
    assert_eq!(first.site, "Example Blog");
    assert_eq!(first.created, "2006-01-02 22:04:05");
    assert_eq!(first.content, "<p>Hello <a>there</a></p>");

    // guid permalink doubles as the link; unparseable date falls back to now
    let second = gateway
        .entry_by_id(&identity_hash("https://blog.example/posts/2", ""))
        .await
        .unwrap()
        .expect("second post stored");
    assert_eq!(second.url, "https://blog.example/posts/2");
    assert_eq!(second.created.len(), "2006-01-02 15:04:05".len());
    assert_eq!(
        second.content,
        r#"<img src="https://blog.example/pic.png">"#
    );
}

#[tokio::test]
async fn test_repoll_does_not_duplicate_entries() {
    let server = MockServer::start().await;
    mount(&server, "/blog.xml", BLOG_RSS).await;
    mount(&server, "/news.xml", NEWS_ATOM).await;

    let gateway = StoreGateway::open(":memory:").await.unwrap();
    subscribe(&gateway, &server, "/blog.xml").await;
    subscribe(&gateway, &server, "/news.xml").await;

    let poller = Poller::new(
        gateway.clone(),
        FeedFetcher::new(reqwest::Client::new()),
        settings(),
    );
    let (_tx, mut rx) = watch::channel(false);

    let first = poller.run_cycle(&mut rx).await;
    assert_eq!(first.inserted, 3);

    let second = poller.run_cycle(&mut rx).await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 3);
    assert_eq!(gateway.count_entries().await.unwrap(), 3);
}

#[tokio::test]
async fn test_atom_site_label_falls_back_to_description() {
    let server = MockServer::start().await;
    mount(&server, "/news.xml", NEWS_ATOM).await;

    let gateway = StoreGateway::open(":memory:").await.unwrap();
    subscribe(&gateway, &server, "/news.xml").await;

    let poller = Poller::new(
        gateway.clone(),
        FeedFetcher::new(reqwest::Client::new()),
        settings(),
    );
    let (_tx, mut rx) = watch::channel(false);
    poller.run_cycle(&mut rx).await;

    let entries = gateway.recent_entries(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].site, "News without a title");
    assert_eq!(entries[0].url, "https://news.example/1");
    assert_eq!(entries[0].created, "2024-05-01 08:00:00");
}

#[tokio::test]
async fn test_failing_feeds_do_not_stop_the_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount(&server, "/garbage.xml", "<<< definitely not a feed").await;
    mount(&server, "/blog.xml", BLOG_RSS).await;

    let gateway = StoreGateway::open(":memory:").await.unwrap();
    subscribe(&gateway, &server, "/gone.xml").await;
    subscribe(&gateway, &server, "/garbage.xml").await;
    subscribe(&gateway, &server, "/blog.xml").await;

    let poller = Poller::new(
        gateway.clone(),
        FeedFetcher::new(reqwest::Client::new()),
        settings(),
    );
    let (_tx, mut rx) = watch::channel(false);
    let report = poller.run_cycle(&mut rx).await;

    assert_eq!(report.feeds, 3);
    assert_eq!(report.failed_feeds, 2);
    assert_eq!(report.inserted, 2);
}

fn guidless_rss(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
    <title>No Guids</title>
    <item>
        <title>{}</title>
        <link>https://plain.example/p/1</link>
        <pubDate>Tue, 03 Jan 2006 10:00:00 GMT</pubDate>
    </item>
</channel>
</rss>"#,
        title
    )
}

#[tokio::test]
async fn test_retitled_item_without_guid_stays_one_entry() {
    let server = MockServer::start().await;
    mount(&server, "/plain.xml", &guidless_rss("Original title")).await;

    let gateway = StoreGateway::open(":memory:").await.unwrap();
    subscribe(&gateway, &server, "/plain.xml").await;

    let poller = Poller::new(
        gateway.clone(),
        FeedFetcher::new(reqwest::Client::new()),
        settings(),
    );
    let (_tx, mut rx) = watch::channel(false);
    assert_eq!(poller.run_cycle(&mut rx).await.inserted, 1);

    server.reset().await;
    mount(&server, "/plain.xml", &guidless_rss("Typo fixed")).await;
    let second = poller.run_cycle(&mut rx).await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 1);

    assert_eq!(gateway.count_entries().await.unwrap(), 1);
    let stored = gateway
        .entry_by_id(&identity_hash("", "https://plain.example/p/1"))
        .await
        .unwrap()
        .expect("entry keyed by its link");
    assert_eq!(stored.title, "Original title");
}
