//! Integration tests for the metrics fetcher against a mock hosting service

use chrono::{DateTime, Utc};
use contrib_metrics::MetricsFetcher;
use contrib_metrics::config::{Config, SourceConfig};
use contrib_metrics::fetch::{CommitStats, FetchError, FetchResult, FetchStage};
use contrib_metrics::report::ChartRow;
use contrib_metrics::sources::PaginationStrategy;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use core::time::Duration;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const REPO_URL: &str = "https://git.example.com/acme/widgets";
const PR_URL: &str = "https://git.example.com/acme/widgets/pull/7";
const CREATED_AT: &str = "2020-01-01T00:00:00Z";

fn source(server: &MockServer, strategy: PaginationStrategy, pattern: &str) -> SourceConfig {
    SourceConfig {
        name: Some(strategy.to_string()),
        pattern: pattern.to_string(),
        strategy,
        graphql_endpoint: format!("{}/graphql", server.uri()),
        stats_endpoint: format!("{}/repos", server.uri()),
        token: Some("secret".to_string()),
        branch: "main".to_string(),
    }
}

fn config(server: &MockServer) -> Config {
    Config {
        sources: vec![
            source(
                server,
                PaginationStrategy::PullRequest,
                r"^https://git\.example\.com/(?P<owner>[^/]+)/(?P<repo>[^/]+)/pull/(?P<pr>\d+)$",
            ),
            source(
                server,
                PaginationStrategy::Repository,
                r"^https://git\.example\.com/(?P<owner>[^/]+)/(?P<repo>[^/]+)$",
            ),
        ],
        throttle_limit: 2,
        max_pages: 10,
        ..Config::default()
    }
}

fn fetcher(server: &MockServer) -> MetricsFetcher {
    MetricsFetcher::new(&config(server)).expect("Failed to create fetcher")
}

fn commit(oid: &str, email: &str) -> Value {
    json!({
        "oid": oid,
        "committedDate": "2024-03-01T10:00:00Z",
        "author": {
            "name": email.split('@').next(),
            "email": email,
            "user": {"login": email.split('@').next()}
        }
    })
}

fn history_page(commits: &[Value], end_cursor: &str, has_next_page: impl Into<Value>) -> Value {
    let has_next_page: Value = has_next_page.into();
    json!({
        "data": {"repository": {"ref": {"target": {"id": "ref-id", "history": {
            "pageInfo": {"endCursor": end_cursor, "hasNextPage": has_next_page},
            "edges": commits.iter().map(|c| json!({"node": c})).collect::<Vec<_>>()
        }}}}}
    })
}

fn pr_page(commits: &[Value], end_cursor: &str, has_next_page: bool) -> Value {
    json!({
        "data": {"repository": {"pullRequest": {"number": 7, "commits": {
            "nodes": commits.iter().map(|c| json!({"commit": c})).collect::<Vec<_>>(),
            "pageInfo": {"endCursor": end_cursor, "hasNextPage": has_next_page}
        }}}}
    })
}

async fn mount_metadata(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "ProjectMetadata"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"repository": {"isFork": false, "createdAt": CREATED_AT}}
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_history_page(server: &MockServer, after: Option<&str>, body: Value) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "ProjectCommits",
            "variables": {"owner": "acme", "name": "widgets", "branch": "main", "after": after}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_stats(server: &MockServer, oid: &str, additions: u64, deletions: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/commits/{oid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": oid,
            "stats": {"additions": additions, "deletions": deletions, "total": additions + deletions}
        })))
        .mount(server)
        .await;
}

fn commit_ids(result: &FetchResult) -> Vec<&str> {
    result.data().iter().map(|r| r.commit_id.as_str()).collect()
}

#[tokio::test]
async fn test_repository_fetch_walks_every_page() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    mount_history_page(
        &server,
        None,
        history_page(&[commit("a1", "alice@example.com"), commit("b1", "bob@example.com")], "c1", true),
    )
    .await;
    mount_history_page(&server, Some("c1"), history_page(&[commit("a2", "alice@example.com")], "c2", false)).await;

    mount_stats(&server, "a1", 7, 3).await;
    mount_stats(&server, "b1", 4, 1).await;
    mount_stats(&server, "a2", 15, 5).await;

    let result = fetcher(&server).fetch(REPO_URL, None).await;

    assert!(result.is_complete(), "unexpected failure: {:?}", result.error());
    assert_eq!(commit_ids(&result), vec!["a1", "b1", "a2"]);

    let first = &result.data()[0];
    assert_eq!(first.user_id.as_deref(), Some("alice"));
    assert_eq!(first.user_email.as_deref(), Some("alice@example.com"));
    assert_eq!(first.commit_date.as_deref(), Some("2024-03-01T10:00:00Z"));
    assert_eq!(first.lines_added(), Some(7));
    assert_eq!(first.lines_deleted(), Some(3));
    assert_eq!(first.lines_changed(), Some(10));

    assert_eq!(
        MetricsFetcher::aggregate(&result),
        vec![
            ChartRow::header(),
            ChartRow::new("alice@example.com", 30),
            ChartRow::new("bob@example.com", 5),
        ]
    );
}

#[tokio::test]
async fn test_repository_fetch_starts_at_creation_date() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "ProjectCommits",
            "variables": {"since": CREATED_AT, "pageSize": 100}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_page(&[], "c1", false)))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher(&server).fetch(REPO_URL, None).await;
    assert_eq!(result, FetchResult::Complete { data: Vec::new() });
}

#[tokio::test]
async fn test_last_commit_date_overrides_creation_date() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "ProjectCommits",
            "variables": {"since": "2024-05-01T12:30:00Z"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_page(&[commit("a1", "alice@example.com")], "c1", false)))
        .expect(1)
        .mount(&server)
        .await;
    mount_stats(&server, "a1", 1, 1).await;

    let since: DateTime<Utc> = "2024-05-01T12:30:00Z".parse().unwrap();
    let result = fetcher(&server).fetch(REPO_URL, Some(since)).await;

    assert!(result.is_complete());
    assert_eq!(commit_ids(&result), vec!["a1"]);
}

#[tokio::test]
async fn test_page_failure_keeps_earlier_records() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    mount_history_page(
        &server,
        None,
        history_page(
            &[
                commit("a1", "alice@example.com"),
                commit("b1", "bob@example.com"),
                commit("a2", "alice@example.com"),
            ],
            "c1",
            true,
        ),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "ProjectCommits", "variables": {"after": "c1"}})))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    mount_stats(&server, "a1", 1, 0).await;
    mount_stats(&server, "b1", 2, 0).await;
    mount_stats(&server, "a2", 3, 0).await;

    let result = fetcher(&server).fetch(REPO_URL, None).await;

    assert_eq!(
        result.error(),
        Some(&FetchError::Transport {
            stage: FetchStage::Page,
            status: 502,
            body: "bad gateway".to_string(),
        })
    );
    assert_eq!(commit_ids(&result), vec!["a1", "b1", "a2"]);
}

#[tokio::test]
async fn test_metadata_failure_stops_before_pages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "ProjectMetadata"})))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "ProjectCommits"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_page(&[], "c1", false)))
        .expect(0)
        .mount(&server)
        .await;

    let result = fetcher(&server).fetch(REPO_URL, None).await;

    let error = result.error().expect("fetch should fail");
    assert_eq!(error.code(), Some(401));
    assert!(matches!(error, FetchError::Transport { stage: FetchStage::Metadata, .. }));
    assert!(result.data().is_empty());
}

#[tokio::test]
async fn test_stats_failure_is_kept_on_the_record() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    mount_history_page(
        &server,
        None,
        history_page(&[commit("a1", "alice@example.com"), commit("gone", "bob@example.com")], "c1", false),
    )
    .await;
    mount_stats(&server, "a1", 6, 4).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/commits/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("No commit found"))
        .mount(&server)
        .await;

    let result = fetcher(&server).fetch(REPO_URL, None).await;

    assert!(result.is_complete());
    assert_eq!(commit_ids(&result), vec!["a1", "gone"]);
    assert_eq!(
        result.data()[1].stats,
        CommitStats::Failed {
            code: Some(404),
            message: "No commit found".to_string(),
        }
    );

    assert_eq!(
        MetricsFetcher::aggregate(&result),
        vec![
            ChartRow::header(),
            ChartRow::new("alice@example.com", 10),
            ChartRow::new("bob@example.com", 0),
        ]
    );
}

#[tokio::test]
async fn test_pull_request_fetch_skips_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "ProjectMetadata"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "PullRequestCommits",
            "variables": {"owner": "acme", "name": "widgets", "number": 7, "after": null}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(pr_page(&[commit("p1", "carol@example.com")], "c1", true)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "operationName": "PullRequestCommits",
            "variables": {"number": 7, "after": "c1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(pr_page(&[commit("p2", "carol@example.com")], "c2", false)))
        .expect(1)
        .mount(&server)
        .await;

    mount_stats(&server, "p1", 2, 2).await;
    mount_stats(&server, "p2", 1, 0).await;

    let fetcher = fetcher(&server);
    let spec = fetcher.resolve(PR_URL).expect("PR URL should resolve");
    assert_eq!(spec.strategy(), PaginationStrategy::PullRequest);
    assert_eq!(spec.pr_number(), Some(7));

    let result = fetcher.fetch(PR_URL, None).await;

    assert!(result.is_complete());
    assert_eq!(commit_ids(&result), vec!["p1", "p2"]);
    assert_eq!(
        MetricsFetcher::aggregate(&result),
        vec![ChartRow::header(), ChartRow::new("carol@example.com", 5)]
    );
}

#[tokio::test]
async fn test_missing_pull_request_yields_no_commits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "PullRequestCommits"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"repository": {"pullRequest": null}},
            "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to a PullRequest with the number of 7."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher(&server).fetch(PR_URL, None).await;

    assert_eq!(result, FetchResult::Complete { data: Vec::new() });
    assert_eq!(MetricsFetcher::aggregate(&result), vec![ChartRow::header()]);
}

#[tokio::test]
async fn test_unsupported_url_makes_no_requests() {
    let server = MockServer::start().await;
    let fetcher = fetcher(&server);

    assert!(!fetcher.supports("https://elsewhere.example.org/acme/widgets"));
    let result = fetcher.fetch("https://elsewhere.example.org/acme/widgets", None).await;

    assert!(matches!(result.error(), Some(FetchError::UnsupportedSource { .. })));
    assert!(result.data().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_commits_are_dropped() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    mount_history_page(
        &server,
        None,
        history_page(&[commit("a1", "alice@example.com"), commit("b1", "bob@example.com")], "c1", true),
    )
    .await;
    mount_history_page(
        &server,
        Some("c1"),
        history_page(&[commit("b1", "bob@example.com"), commit("c1", "carol@example.com")], "c2", false),
    )
    .await;

    mount_stats(&server, "a1", 1, 0).await;
    mount_stats(&server, "b1", 2, 0).await;
    mount_stats(&server, "c1", 3, 0).await;

    let result = fetcher(&server).fetch(REPO_URL, None).await;

    assert!(result.is_complete());
    assert_eq!(commit_ids(&result), vec!["a1", "b1", "c1"]);
    assert_eq!(
        MetricsFetcher::aggregate(&result),
        vec![
            ChartRow::header(),
            ChartRow::new("alice@example.com", 1),
            ChartRow::new("bob@example.com", 2),
            ChartRow::new("carol@example.com", 3),
        ]
    );
}

#[tokio::test]
async fn test_page_limit_returns_gathered_records() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    mount_history_page(&server, None, history_page(&[commit("a1", "alice@example.com")], "c1", true)).await;
    mount_history_page(&server, Some("c1"), history_page(&[commit("a2", "alice@example.com")], "c2", true)).await;
    mount_stats(&server, "a1", 1, 0).await;
    mount_stats(&server, "a2", 1, 0).await;

    let mut config = config(&server);
    config.max_pages = 2;
    let fetcher = MetricsFetcher::new(&config).unwrap();

    let result = fetcher.fetch(REPO_URL, None).await;

    assert_eq!(result.error(), Some(&FetchError::PaginationLimitExceeded { max_pages: 2 }));
    assert_eq!(commit_ids(&result), vec!["a1", "a2"]);
}

#[tokio::test]
async fn test_string_page_flag_continues() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    mount_history_page(&server, None, history_page(&[commit("a1", "alice@example.com")], "c1", "true")).await;
    mount_history_page(&server, Some("c1"), history_page(&[commit("a2", "alice@example.com")], "c2", "false")).await;

    mount_stats(&server, "a1", 1, 0).await;
    mount_stats(&server, "a2", 1, 0).await;

    let result = fetcher(&server).fetch(REPO_URL, None).await;

    assert!(result.is_complete());
    assert_eq!(commit_ids(&result), vec!["a1", "a2"]);
}

#[tokio::test]
async fn test_commits_without_id_are_skipped() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;

    mount_history_page(
        &server,
        None,
        history_page(&[json!({"committedDate": "2024-01-01T00:00:00Z"}), commit("a1", "alice@example.com")], "c1", false),
    )
    .await;
    mount_stats(&server, "a1", 1, 1).await;

    let result = fetcher(&server).fetch(REPO_URL, None).await;

    assert!(result.is_complete());
    assert_eq!(commit_ids(&result), vec!["a1"]);
}

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pr_page(&[commit("p1", "dave@example.com")], "c1", false)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/commits/p1"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stats": {"additions": 1, "deletions": 1, "total": 2}})))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher(&server).fetch(PR_URL, None).await;

    assert!(result.is_complete());
    assert_eq!(result.data()[0].lines_changed(), Some(2));
}

/// Answers with a fixed body after `delay`, recording when each request reached the server.
#[derive(Debug, Clone)]
struct Timed {
    arrivals: Arc<Mutex<Vec<Instant>>>,
    body: Value,
    delay: Duration,
}

impl Timed {
    fn new(body: Value, delay: Duration) -> Self {
        Self {
            arrivals: Arc::new(Mutex::new(Vec::new())),
            body,
            delay,
        }
    }

    fn arrivals(&self) -> Vec<Instant> {
        let mut arrivals = self.arrivals.lock().unwrap().clone();
        arrivals.sort();
        arrivals
    }
}

impl Respond for Timed {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200).set_body_json(self.body.clone()).set_delay(self.delay)
    }
}

/// Largest number of requests that arrived within `window` of each other.
fn peak_overlap(sorted_arrivals: &[Instant], window: Duration) -> usize {
    (0..sorted_arrivals.len())
        .map(|i| {
            sorted_arrivals[i..]
                .iter()
                .take_while(|arrival| **arrival < sorted_arrivals[i] + window)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_next_page_waits_for_every_lookup() {
    const LOOKUP_DELAY: Duration = Duration::from_millis(40);

    let server = MockServer::start().await;
    mount_metadata(&server).await;

    let first_page: Vec<_> = (0..5).map(|i| commit(&format!("p1-{i}"), "erin@example.com")).collect();
    mount_history_page(&server, None, history_page(&first_page, "c1", true)).await;

    let second_page_responder = Timed::new(
        history_page(&[commit("p2-0", "frank@example.com")], "c2", false),
        Duration::ZERO,
    );
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"operationName": "ProjectCommits", "variables": {"after": "c1"}})))
        .respond_with(second_page_responder.clone())
        .expect(1)
        .mount(&server)
        .await;

    let slow_lookups = Timed::new(
        json!({"stats": {"additions": 1, "deletions": 0, "total": 1}}),
        LOOKUP_DELAY,
    );
    Mock::given(method("GET"))
        .and(path_regex(r"^/repos/acme/widgets/commits/p1-\d$"))
        .respond_with(slow_lookups.clone())
        .expect(5)
        .mount(&server)
        .await;
    mount_stats(&server, "p2-0", 2, 0).await;

    let fetcher = fetcher(&server);
    let done = AtomicBool::new(false);
    let peak_in_flight = AtomicUsize::new(0);

    let fetch = async {
        let result = fetcher.fetch(REPO_URL, None).await;
        done.store(true, Ordering::SeqCst);
        result
    };
    let sample = async {
        while !done.load(Ordering::SeqCst) {
            let _ = peak_in_flight.fetch_max(fetcher.throttler().in_flight(), Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };
    let (result, ()) = tokio::join!(fetch, sample);

    assert!(result.is_complete(), "unexpected failure: {:?}", result.error());
    assert_eq!(result.data().len(), 6);

    // At most `throttle_limit` lookups overlap, seen from both sides of the connection
    let lookups = slow_lookups.arrivals();
    assert_eq!(lookups.len(), 5);
    assert!(peak_overlap(&lookups, LOOKUP_DELAY) <= 2, "more than 2 lookups in flight");
    let peak_in_flight = peak_in_flight.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak_in_flight), "peak in flight was {peak_in_flight}");
    assert_eq!(fetcher.throttler().in_flight(), 0);

    // The second page is requested after the last first-page lookup was answered
    let second_page = second_page_responder.arrivals();
    assert_eq!(second_page.len(), 1);
    assert!(second_page[0] >= lookups[4] + LOOKUP_DELAY);

    let requests = server.received_requests().await.unwrap();
    let second_page_index = requests
        .iter()
        .position(|r| {
            serde_json::from_slice::<Value>(&r.body).is_ok_and(|body| body["variables"]["after"] == "c1")
        })
        .expect("second page should be requested");
    let last_lookup_index = requests
        .iter()
        .rposition(|r| r.url.path().starts_with("/repos/acme/widgets/commits/p1-"))
        .expect("first page lookups should be sent");
    assert!(last_lookup_index < second_page_index);

    assert_eq!(
        MetricsFetcher::aggregate(&result),
        vec![
            ChartRow::header(),
            ChartRow::new("erin@example.com", 5),
            ChartRow::new("frank@example.com", 2),
        ]
    );
}
