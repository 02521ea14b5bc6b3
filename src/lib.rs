//! contrib-metrics crate
//!
//! Fetches the commit history of a hosted repository (or of a single pull request within it),
//! looks up line-change statistics for every commit, and reduces the result into
//! per-contributor totals ready to be drawn as a two-column chart.
//!
//! The entry point is [`MetricsFetcher`], built from an injected [`config::Config`].

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod config;
pub mod fetch;
mod metrics_fetcher;
pub mod report;
pub mod sources;

pub use metrics_fetcher::MetricsFetcher;
