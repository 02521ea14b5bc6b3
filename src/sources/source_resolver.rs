use super::{PaginationStrategy, SourceSpec};
use crate::Result;
use crate::config::SourceConfig;
use ohno::{IntoAppError, bail};
use regex::{Captures, Regex};
use std::sync::Arc;

/// Accepted names for the capture group holding the repository owner.
const OWNER_GROUPS: [&str; 2] = ["owner", "username"];

/// Accepted names for the capture group holding the repository name.
const REPO_GROUPS: [&str; 2] = ["repo", "reponame"];

/// Accepted names for the capture group holding the pull request number.
const PR_GROUPS: [&str; 2] = ["pr", "prnum"];

#[derive(Debug, Clone)]
struct SourcePattern {
    name: Option<Arc<str>>,
    regex: Regex,
    strategy: PaginationStrategy,
    branch: Arc<str>,
}

/// Matches source URLs against the configured list of patterns.
///
/// Patterns are tried in configuration order and the first match wins, even when a later
/// pattern would match more precisely.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    patterns: Vec<SourcePattern>,
}

impl SourceResolver {
    /// Compile the patterns of every configured source.
    pub fn new(sources: &[SourceConfig]) -> Result<Self> {
        let mut patterns = Vec::with_capacity(sources.len());

        for (index, source) in sources.iter().enumerate() {
            let label = source.name.clone().unwrap_or_else(|| format!("#{index}"));
            let regex = Regex::new(&source.pattern).into_app_err_with(|| format!("compiling the URL pattern of source {label}"))?;

            let names: Vec<&str> = regex.capture_names().flatten().collect();
            let has_group = |candidates: &[&str]| candidates.iter().any(|c| names.contains(c));

            if !has_group(&OWNER_GROUPS) || !has_group(&REPO_GROUPS) {
                bail!("the URL pattern of source {label} must define the named groups 'owner' and 'repo'");
            }

            if source.strategy == PaginationStrategy::PullRequest && !has_group(&PR_GROUPS) {
                bail!("the URL pattern of pull request source {label} must define the named group 'pr'");
            }

            patterns.push(SourcePattern {
                name: source.name.as_deref().map(Arc::from),
                regex,
                strategy: source.strategy,
                branch: Arc::from(source.branch.as_str()),
            });
        }

        Ok(Self { patterns })
    }

    /// Returns whether any configured source accepts `url`.
    #[must_use]
    pub fn supports(&self, url: &str) -> bool {
        self.find(&url.to_lowercase()).is_some()
    }

    /// Resolve `url` against the first matching source.
    ///
    /// Returns `None` when no source accepts the URL.
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<SourceSpec> {
        let url = url.to_lowercase();
        let (index, captures) = self.find(&url)?;
        let pattern = &self.patterns[index];

        Some(SourceSpec::new(
            &url,
            index,
            pattern.name.clone(),
            pattern.strategy,
            group(&captures, &OWNER_GROUPS)?,
            group(&captures, &REPO_GROUPS)?,
            pr_number(&captures),
            Arc::clone(&pattern.branch),
        ))
    }

    /// Number of configured sources
    #[must_use]
    pub const fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn find<'u>(&self, url: &'u str) -> Option<(usize, Captures<'u>)> {
        self.patterns.iter().enumerate().find_map(|(index, pattern)| {
            let captures = pattern.regex.captures(url)?;

            let usable = group(&captures, &OWNER_GROUPS).is_some()
                && group(&captures, &REPO_GROUPS).is_some()
                && (pattern.strategy != PaginationStrategy::PullRequest || pr_number(&captures).is_some());

            usable.then_some((index, captures))
        })
    }
}

fn group<'u>(captures: &Captures<'u>, names: &[&str]) -> Option<&'u str> {
    names
        .iter()
        .find_map(|name| captures.name(name))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
}

fn pr_number(captures: &Captures<'_>) -> Option<u64> {
    group(captures, &PR_GROUPS)?.parse().ok()
}
