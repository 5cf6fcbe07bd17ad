mod common;

use common::{Scripted, ScriptedTransport};
use kodegen_tools_feedscrape::fetch::{FetchContext, FetchStatus, ThrottledFetcher};
use kodegen_tools_feedscrape::throttle::{HostThrottle, ThrottleRegistry, ThrottleSpec};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connection_cap_holds_under_contention() {
    for (callers, cap) in [(16usize, 1usize), (24, 3), (40, 7)] {
        let throttle = Arc::new(HostThrottle::new("http://example.com"));
        let open = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..callers)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                let open = Arc::clone(&open);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _slot = throttle.register_connection(cap).await;
                    let now = open.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    open.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= cap, "cap {cap} exceeded");
        assert_eq!(throttle.open_connections(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fetch_starts_respect_the_watermark() {
    let throttle = Arc::new(HostThrottle::new("http://example.com"));
    let interval = Duration::from_millis(40);

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let throttle = Arc::clone(&throttle);
            tokio::spawn(async move {
                let series = throttle.begin_fetch_series(interval).await;
                series.started_at()
            })
        })
        .collect();

    let mut starts = Vec::new();
    for task in tasks {
        starts.push(task.await.unwrap());
    }
    starts.sort();
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= interval);
    }
    assert_eq!(throttle.active_series(), 0);
}

#[tokio::test]
async fn idle_host_does_not_catch_up_on_missed_slots() {
    let throttle = Arc::new(HostThrottle::new("http://example.com"));
    let interval = Duration::from_millis(30);
    drop(throttle.begin_fetch_series(interval).await);
    tokio::time::sleep(Duration::from_millis(80)).await;

    let before = tokio::time::Instant::now();
    let series = throttle.begin_fetch_series(interval).await;
    assert!(series.started_at() <= before + Duration::from_millis(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn global_handle_cap_spans_hosts() {
    common::init_logging();
    let mut transport = ScriptedTransport::default();
    for host in 0..6 {
        transport = transport.route(
            &format!("http://host{host}.example/feed"),
            Scripted::ok("text/xml", "<rss/>").delayed(Duration::from_millis(30)),
        );
    }
    let fetcher = Arc::new(ThrottledFetcher::new(2));
    let context = FetchContext {
        user_agent: "test-agent".into(),
        from: "test@example.com".into(),
        spec: ThrottleSpec::default(),
        transport: Arc::new(transport.clone()),
    };

    let tasks: Vec<_> = (0..6)
        .map(|host| {
            let fetcher = Arc::clone(&fetcher);
            let context = context.clone();
            tokio::spawn(async move {
                let url = Url::parse(&format!("http://host{host}.example/feed")).unwrap();
                let mut connection = fetcher
                    .create_connection(&url, &context, Duration::from_secs(5))
                    .await
                    .unwrap();
                connection.begin_fetch("Data").await;
                let status = connection
                    .execute_fetch("/feed", &context.user_agent, &context.from, None, None)
                    .await
                    .unwrap();
                let body = connection.response_body().unwrap().read_to_end().await.unwrap();
                connection.close();
                (status, body)
            })
        })
        .collect();

    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, FetchStatus::Ok);
        assert_eq!(body, b"<rss/>");
    }
    assert!(transport.peak_in_flight.load(Ordering::SeqCst) <= 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fetcher.gate().available(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn handle_cap_spans_throttle_groups() {
    let transport = ScriptedTransport::default()
        .route(
            "http://a.example/feed",
            Scripted::ok("text/xml", "<rss/>").delayed(Duration::from_millis(40)),
        )
        .route(
            "http://b.example/feed",
            Scripted::ok("text/xml", "<rss/>").delayed(Duration::from_millis(40)),
        );
    let registry = ThrottleRegistry::new(1);
    let context = FetchContext {
        user_agent: "test-agent".into(),
        from: "test@example.com".into(),
        spec: ThrottleSpec::default(),
        transport: Arc::new(transport.clone()),
    };

    let tasks: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|group| {
            let lease = registry.acquire(group);
            let context = context.clone();
            tokio::spawn(async move {
                let url = Url::parse(&format!("http://{group}.example/feed")).unwrap();
                let mut connection = lease
                    .fetcher()
                    .create_connection(&url, &context, Duration::from_secs(5))
                    .await
                    .unwrap();
                connection.begin_fetch("Data").await;
                let status = connection
                    .execute_fetch("/feed", &context.user_agent, &context.from, None, None)
                    .await
                    .unwrap();
                connection.response_body().unwrap().read_to_end().await.unwrap();
                connection.close();
                status
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), FetchStatus::Ok);
    }
    assert_eq!(transport.peak_in_flight.load(Ordering::SeqCst), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(registry.gate().available(), 1);
}
