use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How the commits behind a source URL are paginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaginationStrategy {
    /// Walk the full commit history of a branch, starting with repository metadata.
    Repository,

    /// Walk the commit list of a single pull request.
    PullRequest,
}

/// A source URL resolved against the configured patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    url: Arc<str>,
    pattern_index: usize,
    pattern_name: Option<Arc<str>>,
    strategy: PaginationStrategy,
    owner: Arc<str>,
    repo: Arc<str>,
    pr_number: Option<u64>,
    branch: Arc<str>,
}

impl SourceSpec {
    #[expect(clippy::too_many_arguments, reason = "plain constructor for an immutable record")]
    pub(crate) fn new(
        url: &str,
        pattern_index: usize,
        pattern_name: Option<Arc<str>>,
        strategy: PaginationStrategy,
        owner: &str,
        repo: &str,
        pr_number: Option<u64>,
        branch: Arc<str>,
    ) -> Self {
        Self {
            url: Arc::from(url),
            pattern_index,
            pattern_name,
            strategy,
            owner: Arc::from(owner),
            repo: Arc::from(repo),
            pr_number,
            branch,
        }
    }

    /// The lower-cased URL that was matched
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Position of the matching source in the configured list
    #[must_use]
    pub const fn pattern_index(&self) -> usize {
        self.pattern_index
    }

    #[must_use]
    pub fn pattern_name(&self) -> Option<&str> {
        self.pattern_name.as_deref()
    }

    #[must_use]
    pub const fn strategy(&self) -> PaginationStrategy {
        self.strategy
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    #[must_use]
    pub const fn pr_number(&self) -> Option<u64> {
        self.pr_number
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }
}

impl Display for SourceSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self.pr_number {
            Some(number) => write!(f, "{}/{}#{number}", self.owner, self.repo),
            None => write!(f, "{}/{}", self.owner, self.repo),
        }
    }
}
