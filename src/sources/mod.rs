//! Source URL dispatch
//!
//! A [`SourceResolver`] matches a source URL against the configured patterns and produces a
//! [`SourceSpec`] naming the owner, repository, optional pull request number, and the
//! [`PaginationStrategy`] used to walk its commits.

mod source_resolver;
mod source_spec;

pub use source_resolver::SourceResolver;
pub use source_spec::{PaginationStrategy, SourceSpec};
