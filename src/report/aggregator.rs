use crate::fetch::CommitRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Label of the header row's first column
pub const NAME_HEADER: &str = "Name";

/// Label of the header row's second column
pub const TOTAL_HEADER: &str = "Total Changes";

/// Commit count and summed line changes of one contributor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContributorTotals {
    pub count: u64,
    pub total: u64,
}

impl ContributorTotals {
    /// Totals saturate at `u64::MAX`.
    const fn merge(&mut self, other: Self) {
        self.count = self.count.saturating_add(other.count);
        self.total = self.total.saturating_add(other.total);
    }
}

/// Per-contributor totals keyed by author email, in first-encounter order.
///
/// Commits without an email share the empty-string key.
#[derive(Debug, Clone, Default)]
pub struct UserStats {
    entries: Vec<(String, ContributorTotals)>,
    index: HashMap<String, usize>,
}

impl UserStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one commit of `email` with `lines_changed` changed lines.
    pub fn add(&mut self, email: &str, lines_changed: u64) {
        self.entry(email).merge(ContributorTotals {
            count: 1,
            total: lines_changed,
        });
    }

    /// Totals of `email`, zero if it was never seen.
    #[must_use]
    pub fn get(&self, email: &str) -> ContributorTotals {
        self.index.get(email).map(|&i| self.entries[i].1).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ContributorTotals)> {
        self.entries.iter().map(|(email, totals)| (email.as_str(), *totals))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold `other` into `self`. Contributors only present in `other` are appended in its order.
    pub fn merge(&mut self, other: &Self) {
        for (email, totals) in other.iter() {
            self.entry(email).merge(totals);
        }
    }

    fn entry(&mut self, email: &str) -> &mut ContributorTotals {
        let i = match self.index.get(email) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.entries.push((email.to_string(), ContributorTotals::default()));
                let _ = self.index.insert(email.to_string(), i);
                i
            }
        };

        &mut self.entries[i].1
    }
}

/// Value column of a chart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChartValue {
    Text(String),
    Count(u64),
}

/// One `(label, value)` line of the summary table. Serializes as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRow(pub String, pub ChartValue);

impl ChartRow {
    #[must_use]
    pub fn new(label: impl Into<String>, value: u64) -> Self {
        Self(label.into(), ChartValue::Count(value))
    }

    /// The fixed `("Name", "Total Changes")` row that starts every table.
    #[must_use]
    pub fn header() -> Self {
        Self(NAME_HEADER.to_string(), ChartValue::Text(TOTAL_HEADER.to_string()))
    }
}

/// Reduce commit records into per-contributor totals.
///
/// Records whose changed-line count is unknown still count as a commit and add nothing to the total.
#[must_use]
pub fn reduce(commits: &[CommitRecord]) -> UserStats {
    let mut stats = UserStats::new();
    for commit in commits {
        stats.add(
            commit.user_email.as_deref().unwrap_or_default(),
            commit.lines_changed().unwrap_or(0),
        );
    }

    stats
}

/// Render commit records as chart rows: the header, then one row per contributor with their
/// total changed lines.
#[must_use]
pub fn to_chart_rows(commits: &[CommitRecord]) -> Vec<ChartRow> {
    let stats = reduce(commits);

    let mut rows = Vec::with_capacity(stats.len() + 1);
    rows.push(ChartRow::header());
    rows.extend(stats.iter().map(|(email, totals)| ChartRow::new(email, totals.total)));
    rows
}
