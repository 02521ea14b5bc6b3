use super::CommitStats;
use super::client::{CallError, Client};
use super::safe_path::get_u64;
use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "     stats";

/// Looks up the line-change statistics of single commits.
#[derive(Debug, Clone)]
pub struct StatsClient {
    client: Client,
    endpoint: Arc<Url>,
    timeout: Option<Duration>,
}

impl StatsClient {
    /// Create a client for `{endpoint}/{owner}/{repo}/commits/{hash}` lookups.
    ///
    /// Lookups taking longer than `timeout` are reported as failed.
    pub fn new(client: Client, endpoint: &str, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).into_app_err_with(|| format!("parsing commit statistics endpoint '{endpoint}'"))?;
        if endpoint.cannot_be_a_base() {
            bail!("commit statistics endpoint '{endpoint}' cannot carry a path");
        }

        Ok(Self {
            client,
            endpoint: Arc::new(endpoint),
            timeout,
        })
    }

    /// Build the lookup URL for one commit, escaping each path segment.
    #[must_use]
    pub fn commit_url(&self, owner: &str, repo: &str, hash: &str) -> Url {
        let mut url = (*self.endpoint).clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            let _ = segments.pop_if_empty().extend([owner, repo, "commits", hash]);
        }
        url
    }

    /// Fetch the statistics of one commit.
    ///
    /// Failures never propagate: they are reported as [`CommitStats::Failed`] so that the
    /// surrounding page can complete.
    pub async fn fetch(&self, owner: &str, repo: &str, hash: &str) -> CommitStats {
        let url = self.commit_url(owner, repo, hash);

        let response = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.client.get_json(url.as_str())).await {
                Ok(response) => response,
                Err(_) => Err(CallError::Request(format!("timed out after {}s", limit.as_secs_f64()))),
            },
            None => self.client.get_json(url.as_str()).await,
        };

        match response {
            Ok(json) => {
                let json = Some(&json);
                CommitStats::Ok {
                    additions: get_u64(json, &["stats", "additions"]),
                    deletions: get_u64(json, &["stats", "deletions"]),
                    total: get_u64(json, &["stats", "total"]),
                }
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not load statistics for commit {hash} of '{owner}/{repo}': {e}");
                CommitStats::Failed {
                    code: e.status(),
                    message: match e {
                        CallError::Status { body, .. } => body,
                        CallError::Request(message) => message,
                    },
                }
            }
        }
    }
}
