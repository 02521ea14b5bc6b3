use super::client::Client;
use super::commit_record::CommitMeta;
use super::fetch_result::{FetchError, FetchResult, FetchStage};
use super::safe_path::{get, get_array, get_bool, get_str};
use super::{CommitRecord, CommitStats, StatsClient, Throttler, queries};
use crate::sources::{PaginationStrategy, SourceSpec};
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const LOG_TARGET: &str = "     fetch";

/// Number of throttler slots taken by one commit statistics lookup
const LOOKUP_WEIGHT: u32 = 1;

/// Pagination state reported by a page response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl PageCursor {
    /// Read a `pageInfo` object. Missing fields mean there is no further page.
    #[must_use]
    pub fn from_page_info(page_info: Option<&Value>) -> Self {
        // Some services send the flag as a string
        let has_next_page = get_bool(page_info, &["hasNextPage"])
            .or_else(|| get_str(page_info, &["hasNextPage"]).map(|s| s == "true"))
            .unwrap_or(false);

        Self {
            end_cursor: get_str(page_info, &["endCursor"]).map(str::to_string),
            has_next_page,
        }
    }

    /// The cursor to resume after, if another page is announced.
    #[must_use]
    pub fn after(&self) -> Option<&str> {
        if self.has_next_page { self.end_cursor.as_deref() } else { None }
    }
}

/// The two response layouts of a commit page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageShape {
    /// `repository.ref.target.history.edges[].node`
    History,

    /// `repository.pullRequest.commits.nodes[].commit`
    PullRequest,
}

/// The commit objects and pagination state of one page.
#[derive(Debug)]
struct Page<'a> {
    commits: Vec<&'a Value>,
    cursor: PageCursor,
}

impl PageShape {
    /// Extract the commits of a page response, or `None` when the response holds no commit list.
    fn parse(self, json: &Value) -> Option<Page<'_>> {
        let json = Some(json);

        let (container, items, commit_key) = match self {
            Self::History => (
                get(json, &["data", "repository", "ref", "target", "history"]),
                "edges",
                "node",
            ),
            Self::PullRequest => (get(json, &["data", "repository", "pullRequest", "commits"]), "nodes", "commit"),
        };

        let commits = get_array(container, &[items])?
            .iter()
            .filter_map(|item| get(Some(item), &[commit_key]))
            .collect();

        Some(Page {
            commits,
            cursor: PageCursor::from_page_info(get(container, &["pageInfo"])),
        })
    }
}

/// Walks the commit pages of one source and joins every commit with its statistics.
///
/// Pages are requested strictly one after another. The statistics lookups of a page run
/// concurrently through the shared [`Throttler`], and the next page is only requested once
/// every lookup of the current page has finished.
#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    client: Client,
    graphql_endpoint: Arc<str>,
    stats: StatsClient,
    throttler: Arc<Throttler>,
    max_pages: u32,
}

impl PaginatedFetcher {
    #[must_use]
    pub fn new(client: Client, graphql_endpoint: &str, stats: StatsClient, throttler: Arc<Throttler>, max_pages: u32) -> Self {
        Self {
            client,
            graphql_endpoint: Arc::from(graphql_endpoint),
            stats,
            throttler,
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch all commits behind `spec` using the strategy selected by its source.
    ///
    /// `last_commit_date` overrides the lower bound of a repository walk, which otherwise
    /// starts at the repository creation date. It is ignored for pull requests.
    pub async fn fetch(&self, spec: &SourceSpec, last_commit_date: Option<DateTime<Utc>>) -> FetchResult {
        match (spec.strategy(), spec.pr_number()) {
            (PaginationStrategy::Repository, _) => self.fetch_repository(spec, last_commit_date).await,
            (PaginationStrategy::PullRequest, Some(number)) => self.fetch_pull_request(spec, number).await,
            (PaginationStrategy::PullRequest, None) => {
                log::warn!(target: LOG_TARGET, "No pull request number for '{spec}', nothing to fetch");
                FetchResult::Complete { data: Vec::new() }
            }
        }
    }

    async fn fetch_repository(&self, spec: &SourceSpec, last_commit_date: Option<DateTime<Utc>>) -> FetchResult {
        let (owner, repo) = (spec.owner(), spec.repo());

        log::info!(target: LOG_TARGET, "Querying metadata of repository '{spec}'");
        let metadata = match self.client.post_json(&self.graphql_endpoint, &queries::project_query(owner, repo)).await {
            Ok(json) => json,
            Err(e) => {
                return FetchResult::Failed {
                    error: FetchError::from_call(FetchStage::Metadata, e),
                    data: Vec::new(),
                };
            }
        };

        let created_at = get_str(Some(&metadata), &["data", "repository", "createdAt"]);
        let is_fork = get_bool(Some(&metadata), &["data", "repository", "isFork"]).unwrap_or(false);
        log::debug!(
            target: LOG_TARGET,
            "Repository '{spec}' created at {}, fork: {is_fork}",
            created_at.unwrap_or("<unknown>")
        );

        let since = last_commit_date
            .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, true))
            .or_else(|| created_at.map(str::to_string));

        self.paginate(spec, PageShape::History, |after| {
            queries::project_commits_query(owner, repo, spec.branch(), since.as_deref(), after)
        })
        .await
    }

    async fn fetch_pull_request(&self, spec: &SourceSpec, number: u64) -> FetchResult {
        self.paginate(spec, PageShape::PullRequest, |after| {
            queries::pull_request_commits_query(spec.owner(), spec.repo(), number, after)
        })
        .await
    }

    /// Request pages until no further page is announced, accumulating commit records.
    async fn paginate<Q>(&self, spec: &SourceSpec, shape: PageShape, build_query: Q) -> FetchResult
    where
        Q: Fn(Option<&str>) -> Value,
    {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = PageCursor::default();
        let mut page_num = 0u32;

        loop {
            if page_num >= self.max_pages {
                log::warn!(
                    target: LOG_TARGET,
                    "Reached maximum page limit ({}) for '{spec}', stopping pagination after {} commits",
                    self.max_pages,
                    records.len()
                );
                return FetchResult::Failed {
                    error: FetchError::PaginationLimitExceeded { max_pages: self.max_pages },
                    data: records,
                };
            }
            page_num += 1;

            log::debug!(target: LOG_TARGET, "Requesting page {page_num} of commits for '{spec}'");
            let json = match self.client.post_json(&self.graphql_endpoint, &build_query(cursor.after())).await {
                Ok(json) => json,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not load page {page_num} of commits for '{spec}': {e}");
                    return FetchResult::Failed {
                        error: FetchError::from_call(FetchStage::Page, e),
                        data: records,
                    };
                }
            };

            let Some(page) = shape.parse(&json) else {
                log::debug!(target: LOG_TARGET, "Page {page_num} for '{spec}' holds no commit list: {json}");
                return FetchResult::Complete { data: records };
            };

            let metas: Vec<CommitMeta> = page
                .commits
                .into_iter()
                .filter_map(|commit| {
                    let meta = CommitMeta::parse(commit);
                    if meta.is_none() {
                        log::debug!(target: LOG_TARGET, "Skipping commit without an id on page {page_num} for '{spec}'");
                    }
                    meta
                })
                .collect();

            for record in self.join_stats(spec, metas).await {
                if seen.insert(record.commit_id.clone()) {
                    records.push(record);
                } else {
                    log::debug!(target: LOG_TARGET, "Dropping duplicate commit {} for '{spec}'", record.commit_id);
                }
            }

            cursor = page.cursor;
            if !cursor.has_next_page {
                log::info!(target: LOG_TARGET, "Fetched {} commits in {page_num} page(s) for '{spec}'", records.len());
                return FetchResult::Complete { data: records };
            }

            if cursor.end_cursor.is_none() {
                log::warn!(target: LOG_TARGET, "Page {page_num} for '{spec}' announces a next page without a cursor, stopping");
                return FetchResult::Complete { data: records };
            }
        }
    }

    /// Look up the statistics of every commit through the throttler and wait for all of them.
    async fn join_stats(&self, spec: &SourceSpec, metas: Vec<CommitMeta>) -> Vec<CommitRecord> {
        let tasks: Vec<_> = metas
            .iter()
            .map(|meta| {
                let stats = self.stats.clone();
                let owner = spec.owner().to_string();
                let repo = spec.repo().to_string();
                let hash = meta.oid.clone();
                self.throttler
                    .submit(LOOKUP_WEIGHT, async move { stats.fetch(&owner, &repo, &hash).await })
            })
            .collect();

        join_all(tasks)
            .await
            .into_iter()
            .zip(metas)
            .map(|(joined, meta)| {
                let stats = joined.unwrap_or_else(|e| CommitStats::Failed {
                    code: None,
                    message: e.to_string(),
                });
                meta.into_record(stats)
            })
            .collect()
    }
}
