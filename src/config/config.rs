use crate::Result;
use crate::sources::PaginationStrategy;
use camino::Utf8Path;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Largest accepted value for `throttle_limit`
pub const MAX_THROTTLE_LIMIT: usize = 64;

/// One supported source: a URL pattern and the endpoints used to serve URLs matching it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Optional display name used in log output
    #[serde(default)]
    pub name: Option<String>,

    /// Regular expression matched against the lower-cased source URL.
    ///
    /// Must define the named groups `owner` and `repo`, and `pr` for pull request sources.
    pub pattern: String,

    /// How commits are paginated for URLs matching this source
    pub strategy: PaginationStrategy,

    /// Endpoint receiving GraphQL queries
    pub graphql_endpoint: String,

    /// Base of the per-commit statistics endpoint (`{stats_endpoint}/{owner}/{repo}/commits/{hash}`)
    pub stats_endpoint: String,

    /// Bearer token sent with every request to this source
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Branch whose history is walked by the repository strategy
    #[serde(default = "default_branch")]
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Supported sources, tried in order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Maximum number of commit statistics lookups in flight at once
    #[serde(default = "default_throttle_limit")]
    pub throttle_limit: usize,

    /// Maximum number of commit pages requested by a single fetch
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Per-lookup timeout for commit statistics, in seconds (0 disables it)
    #[serde(default)]
    pub stats_timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_branch() -> String {
    "master".to_string()
}

const fn default_throttle_limit() -> usize {
    5
}

const fn default_max_pages() -> u32 {
    1000
}

fn default_user_agent() -> String {
    "contrib-metrics".to_string()
}

impl Config {
    /// Load configuration from a file.
    ///
    /// The format is chosen from the file extension (`toml`, `yml`/`yaml`, or `json`).
    /// Returns the configuration together with any non-fatal validation warnings.
    pub fn load(path: &Utf8Path) -> Result<(Self, Vec<String>)> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading contrib-metrics configuration from '{path}'"))?;
        let config = Self::parse(path.extension().unwrap_or_default(), &text)
            .into_app_err_with(|| format!("loading contrib-metrics configuration from '{path}'"))?;

        let warnings = config.validate()?;
        Ok((config, warnings))
    }

    /// Parse configuration text in the format named by `extension`.
    pub fn parse(extension: &str, text: &str) -> Result<Self> {
        let config = match extension {
            "toml" => toml::from_str(text).into_app_err("parsing TOML configuration")?,
            "yml" | "yaml" => serde_yaml::from_str(text).into_app_err("parsing YAML configuration")?,
            "json" => serde_json::from_str(text).into_app_err("parsing JSON configuration")?,
            _ => return Err(app_err!("unsupported configuration file extension: '{extension}'")),
        };

        Ok(config)
    }

    /// Check the configuration for errors.
    ///
    /// Hard errors are returned as `Err`; issues that still allow fetching are returned as warnings.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.throttle_limit == 0 || self.throttle_limit > MAX_THROTTLE_LIMIT {
            return Err(app_err!(
                "throttle_limit must be between 1 and {MAX_THROTTLE_LIMIT}, got {}",
                self.throttle_limit
            ));
        }

        if self.max_pages == 0 {
            return Err(app_err!("max_pages must be at least 1"));
        }

        let mut warnings = Vec::new();

        if self.sources.is_empty() {
            warnings.push("no sources are configured, every URL will be reported as unsupported".to_string());
        }

        for (index, source) in self.sources.iter().enumerate() {
            let label = source.name.clone().unwrap_or_else(|| format!("#{index}"));

            if source.token.as_deref().is_none_or(str::is_empty) {
                warnings.push(format!("source {label} has no token, requests will be unauthenticated"));
            }

            if source.strategy == PaginationStrategy::Repository && source.branch.is_empty() {
                return Err(app_err!("source {label} uses the repository strategy but names no branch"));
            }
        }

        Ok(warnings)
    }

    /// Per-lookup timeout for commit statistics, if one is configured.
    #[must_use]
    pub const fn stats_timeout(&self) -> Option<Duration> {
        if self.stats_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.stats_timeout_secs))
        }
    }

    /// Use `token` for every source that does not carry its own.
    pub fn apply_default_token(&mut self, token: &str) {
        for source in &mut self.sources {
            if source.token.as_deref().is_none_or(str::is_empty) {
                source.token = Some(token.to_string());
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
