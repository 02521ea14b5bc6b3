use crate::Result;
use crate::config::Config;
use crate::fetch::client::Client;
use crate::fetch::{FetchError, FetchResult, PaginatedFetcher, StatsClient, Throttler};
use crate::report::{self, ChartRow};
use crate::sources::{SourceResolver, SourceSpec};
use chrono::{DateTime, Utc};
use ohno::EnrichableExt;
use std::sync::Arc;

const LOG_TARGET: &str = "   metrics";

/// Fetches commit statistics for supported source URLs and summarizes them per contributor.
///
/// All fetches made through one instance share a single [`Throttler`], so the configured
/// `throttle_limit` bounds the statistics lookups in flight across concurrent fetches too.
#[derive(Debug, Clone)]
pub struct MetricsFetcher {
    resolver: SourceResolver,

    /// One fetcher per configured source, in configuration order
    fetchers: Vec<PaginatedFetcher>,

    throttler: Arc<Throttler>,
}

impl MetricsFetcher {
    /// Build a fetcher from `config`.
    ///
    /// Fails if a source pattern or endpoint is invalid, or an HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let resolver = SourceResolver::new(&config.sources)?;
        let throttler = Throttler::new(config.throttle_limit);

        let fetchers = config
            .sources
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let client = Client::new(source.token.as_deref(), &config.user_agent)
                    .map_err(|e| e.enrich_with(|| format!("creating HTTP client for source #{index}")))?;
                let stats = StatsClient::new(client.clone(), &source.stats_endpoint, config.stats_timeout())
                    .map_err(|e| e.enrich_with(|| format!("configuring source #{index}")))?;

                Ok(PaginatedFetcher::new(
                    client,
                    &source.graphql_endpoint,
                    stats,
                    Arc::clone(&throttler),
                    config.max_pages,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            target: LOG_TARGET,
            "Configured {} source(s), at most {} statistics lookup(s) in flight",
            fetchers.len(),
            throttler.max_concurrent()
        );

        Ok(Self {
            resolver,
            fetchers,
            throttler,
        })
    }

    /// Whether `url` matches one of the configured sources.
    #[must_use]
    pub fn supports(&self, url: &str) -> bool {
        self.resolver.supports(url)
    }

    /// Resolve `url` without fetching anything.
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<SourceSpec> {
        self.resolver.resolve(url)
    }

    /// Fetch every commit behind `url` together with its line-change statistics.
    ///
    /// `last_commit_date` limits a repository fetch to commits after that instant. An
    /// unsupported URL fails with [`FetchError::UnsupportedSource`] without any request being made.
    pub async fn fetch(&self, url: &str, last_commit_date: Option<DateTime<Utc>>) -> FetchResult {
        let Some(spec) = self.resolver.resolve(url) else {
            log::info!(target: LOG_TARGET, "No configured source matches '{url}'");
            return FetchResult::Failed {
                error: FetchError::UnsupportedSource { url: url.to_string() },
                data: Vec::new(),
            };
        };

        let Some(fetcher) = self.fetchers.get(spec.pattern_index()) else {
            // The resolver and the fetchers are built from the same source list
            log::error!(target: LOG_TARGET, "No fetcher for source #{} of '{url}'", spec.pattern_index());
            return FetchResult::Failed {
                error: FetchError::UnsupportedSource { url: url.to_string() },
                data: Vec::new(),
            };
        };

        log::info!(
            target: LOG_TARGET,
            "Fetching commits of '{spec}' via source {} ({} strategy)",
            spec.pattern_name().map_or_else(|| format!("#{}", spec.pattern_index()), str::to_string),
            spec.strategy()
        );

        let result = fetcher.fetch(&spec, last_commit_date).await;
        if let Some(error) = result.error() {
            log::warn!(
                target: LOG_TARGET,
                "Fetch of '{spec}' stopped early with {} commit(s): {error}",
                result.data().len()
            );
        }

        result
    }

    /// Summarize the records of `result` as chart rows, header first.
    ///
    /// Partial data of a failed fetch is summarized as well.
    #[must_use]
    pub fn aggregate(result: &FetchResult) -> Vec<ChartRow> {
        report::to_chart_rows(result.data())
    }

    #[must_use]
    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }
}
