//! Contributor summaries
//!
//! Reduces fetched commit records into per-contributor totals and renders them as the
//! two-column `(Name, Total Changes)` table consumed by chart widgets.

mod aggregator;

pub use aggregator::{ChartRow, ChartValue, ContributorTotals, NAME_HEADER, TOTAL_HEADER, UserStats, reduce, to_chart_rows};
