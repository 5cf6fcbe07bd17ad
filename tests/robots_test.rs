mod common;

use common::{Scripted, ScriptedTransport, TestActivities};
use kodegen_tools_feedscrape::fetch::{FetchContext, ThrottledFetcher};
use kodegen_tools_feedscrape::robots::{RobotsCache, does_path_match};
use kodegen_tools_feedscrape::throttle::ThrottleSpec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

const ROBOTS: &str = "User-agent: *\nDisallow: /private/\n";

fn context(transport: &ScriptedTransport) -> FetchContext {
    FetchContext {
        user_agent: "Mozilla/5.0 (KodegenFeedScrape; test@example.com)".into(),
        from: "test@example.com".into(),
        spec: ThrottleSpec::default(),
        transport: Arc::new(transport.clone()),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_share_one_robots_fetch() {
    common::init_logging();
    let transport = ScriptedTransport::default().route(
        "http://example.com/robots.txt",
        Scripted::ok("text/plain", ROBOTS).delayed(Duration::from_millis(50)),
    );
    let cache = Arc::new(RobotsCache::new(Arc::new(ThrottledFetcher::new(10))));
    let context = context(&transport);
    let activities = Arc::new(TestActivities::default());

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let context = context.clone();
            let activities = Arc::clone(&activities);
            tokio::spawn(async move {
                let path = if i % 2 == 0 { "/feed.xml" } else { "/private/a" };
                let url = Url::parse(&format!("http://example.com{path}")).unwrap();
                cache
                    .is_fetch_allowed(&url, &context, activities.as_ref())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut allowed = Vec::new();
    for task in tasks {
        allowed.push(task.await.unwrap());
    }

    assert_eq!(transport.count("http://example.com/robots.txt"), 1);
    for (i, allowed) in allowed.iter().enumerate() {
        assert_eq!(*allowed, i % 2 == 0);
    }
    assert_eq!(activities.result_codes("robots parse"), vec!["SUCCESS"]);
}

#[tokio::test]
async fn missing_robots_allows_everything() {
    let transport = ScriptedTransport::default();
    let cache = RobotsCache::new(Arc::new(ThrottledFetcher::new(10)));
    let activities = TestActivities::default();
    let url = Url::parse("http://example.com/private/a").unwrap();
    assert!(
        cache
            .is_fetch_allowed(&url, &context(&transport), &activities)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn unauthorized_robots_denies_the_site() {
    let transport = ScriptedTransport::default()
        .route("http://example.com/robots.txt", Scripted::status(401));
    let cache = RobotsCache::new(Arc::new(ThrottledFetcher::new(10)));
    let activities = TestActivities::default();
    let url = Url::parse("http://example.com/feed.xml").unwrap();
    assert!(
        !cache
            .is_fetch_allowed(&url, &context(&transport), &activities)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn cached_record_is_reused() {
    let transport = ScriptedTransport::default()
        .route("http://example.com/robots.txt", Scripted::ok("text/plain", ROBOTS));
    let cache = RobotsCache::new(Arc::new(ThrottledFetcher::new(10)));
    let activities = TestActivities::default();
    let context = context(&transport);
    for path in ["/a", "/private/b", "/c"] {
        let url = Url::parse(&format!("http://example.com{path}")).unwrap();
        cache.is_fetch_allowed(&url, &context, &activities).await.unwrap();
    }
    assert_eq!(transport.count("http://example.com/robots.txt"), 1);
    assert_eq!(cache.tracked_hosts(), 1);
}

#[test]
fn path_matcher_wildcards_and_anchors() {
    assert!(does_path_match("/foo/bar", "/foo/*"));
    assert!(does_path_match("/foo", "/foo$"));
    assert!(!does_path_match("/foobar", "/foo$"));
    assert!(does_path_match("/foobar", "/foo"));
    assert!(does_path_match("/a/b/c.html", "/*/c.html"));
}

#[test]
fn repeated_wildcards_stay_fast() {
    let spec = format!("/a{}", "*".repeat(50));
    let start = Instant::now();
    assert!(does_path_match("/a", &spec));
    let long_path = format!("/a{}", "b".repeat(10_000));
    assert!(does_path_match(&long_path, &spec));
    assert!(!does_path_match("/a", &"/a*".repeat(50)));
    assert!(!does_path_match("/b", &"/a*".repeat(50)));
    let elapsed = start.elapsed();
    assert!(elapsed.as_millis() < 100, "matcher took {elapsed:?}");
}
