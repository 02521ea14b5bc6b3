use super::CommitRecord;
use super::client::CallError;
use core::fmt::{Display, Formatter};

/// The request during which a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FetchStage {
    /// Repository metadata query
    Metadata,

    /// Commit page query
    Page,
}

/// Why a fetch stopped before walking every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The URL matches no configured source. No request was made.
    UnsupportedSource { url: String },

    /// The service answered a metadata or page query with a non-success status.
    Transport { stage: FetchStage, status: u16, body: String },

    /// A metadata or page query failed before a status was received.
    Request { stage: FetchStage, message: String },

    /// The fetch reached the configured page limit while more pages were announced.
    PaginationLimitExceeded { max_pages: u32 },
}

impl FetchError {
    pub(crate) fn from_call(stage: FetchStage, error: CallError) -> Self {
        match error {
            CallError::Status { status, body } => Self::Transport { stage, status, body },
            CallError::Request(message) => Self::Request { stage, message },
        }
    }

    /// HTTP status code, for transport errors
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnsupportedSource { url } => write!(f, "unsupported source: '{url}'"),
            Self::Transport { stage, status, body } => write!(f, "error loading {stage} (HTTP status {status}): {body}"),
            Self::Request { stage, message } => write!(f, "error loading {stage}: {message}"),
            Self::PaginationLimitExceeded { max_pages } => write!(f, "pagination limit of {max_pages} page(s) exceeded"),
        }
    }
}

impl core::error::Error for FetchError {}

/// Outcome of a fetch. Records gathered before a failure are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Every page was walked.
    Complete { data: Vec<CommitRecord> },

    /// The fetch stopped early; `data` holds the records gathered up to that point.
    Failed { error: FetchError, data: Vec<CommitRecord> },
}

impl FetchResult {
    /// Returns `true` if the result is `Complete`.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// The records gathered, whether or not the fetch completed.
    #[must_use]
    pub fn data(&self) -> &[CommitRecord] {
        match self {
            Self::Complete { data } | Self::Failed { data, .. } => data,
        }
    }

    #[must_use]
    pub fn into_data(self) -> Vec<CommitRecord> {
        match self {
            Self::Complete { data } | Self::Failed { data, .. } => data,
        }
    }

    /// Returns the error if the fetch failed, otherwise `None`.
    #[must_use]
    pub const fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Complete { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}
