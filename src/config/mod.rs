//! Configuration surface consumed by [`crate::MetricsFetcher`].

#[expect(clippy::module_inception, reason = "the module mirrors the type it defines")]
mod config;

pub use config::{Config, DEFAULT_CONFIG_TOML, MAX_THROTTLE_LIMIT, SourceConfig};
