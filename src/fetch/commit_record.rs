use super::safe_path::get_str;
use serde::Serialize;
use serde_json::Value;

/// Line-change statistics of one commit, or the reason they could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitStats {
    /// The lookup succeeded; individual numbers may still be missing from the payload.
    Ok {
        additions: Option<u64>,
        deletions: Option<u64>,
        total: Option<u64>,
    },

    /// The lookup failed. `code` is the HTTP status when the service answered.
    Failed { code: Option<u16>, message: String },
}

impl CommitStats {
    #[must_use]
    pub const fn additions(&self) -> Option<u64> {
        match self {
            Self::Ok { additions, .. } => *additions,
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub const fn deletions(&self) -> Option<u64> {
        match self {
            Self::Ok { deletions, .. } => *deletions,
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        match self {
            Self::Ok { total, .. } => *total,
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One commit joined with its line-change statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    /// Login of the hosting account behind the author, when linked
    pub user_id: Option<String>,
    pub commit_id: String,
    pub commit_date: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub stats: CommitStats,
}

impl CommitRecord {
    #[must_use]
    pub const fn lines_added(&self) -> Option<u64> {
        self.stats.additions()
    }

    #[must_use]
    pub const fn lines_deleted(&self) -> Option<u64> {
        self.stats.deletions()
    }

    #[must_use]
    pub const fn lines_changed(&self) -> Option<u64> {
        self.stats.total()
    }
}

/// Commit metadata read from a page response, before the statistics lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMeta {
    pub oid: String,
    pub login: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<String>,
}

impl CommitMeta {
    /// Read commit metadata from a commit object.
    ///
    /// Returns `None` when the commit carries no `oid`.
    #[must_use]
    pub fn parse(commit: &Value) -> Option<Self> {
        let commit = Some(commit);
        let owned = |path: &[&str]| get_str(commit, path).map(str::to_string);

        Some(Self {
            oid: owned(&["oid"])?,
            login: owned(&["author", "user", "login"]),
            name: owned(&["author", "name"]),
            email: owned(&["author", "email"]),
            date: owned(&["committedDate"]),
        })
    }

    #[must_use]
    pub fn into_record(self, stats: CommitStats) -> CommitRecord {
        CommitRecord {
            user_id: self.login,
            commit_id: self.oid,
            commit_date: self.date,
            user_name: self.name,
            user_email: self.email,
            stats,
        }
    }
}
