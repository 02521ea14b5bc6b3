//! Commit fetching
//!
//! Walks the paginated commit list of a repository or pull request through a GraphQL
//! endpoint, and joins every commit with its line-change statistics from a REST endpoint.
//! Statistics lookups are bounded by a shared [`Throttler`].

pub mod client;
mod commit_record;
mod fetch_result;
mod paginated_fetcher;
pub mod queries;
pub mod safe_path;
mod stats_client;
mod throttler;

pub use commit_record::{CommitMeta, CommitRecord, CommitStats};
pub use fetch_result::{FetchError, FetchResult, FetchStage};
pub use paginated_fetcher::{PageCursor, PaginatedFetcher};
pub use stats_client::StatsClient;
pub use throttler::{ThrottledTask, Throttler};
