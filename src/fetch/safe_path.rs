//! Path lookups into loosely-structured JSON responses.
//!
//! Every lookup yields `None` instead of failing when the tree is absent, a segment is missing,
//! an intermediate value is not an object, or the final value is `null`.

use serde_json::Value;

/// Walk `tree` one key at a time along `path`.
#[must_use]
pub fn get<'a>(tree: Option<&'a Value>, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(tree?, |node, key| node.as_object()?.get(*key))
        .filter(|value| !value.is_null())
}

#[must_use]
pub fn get_str<'a>(tree: Option<&'a Value>, path: &[&str]) -> Option<&'a str> {
    get(tree, path)?.as_str()
}

#[must_use]
pub fn get_u64(tree: Option<&Value>, path: &[&str]) -> Option<u64> {
    get(tree, path)?.as_u64()
}

#[must_use]
pub fn get_bool(tree: Option<&Value>, path: &[&str]) -> Option<bool> {
    get(tree, path)?.as_bool()
}

#[must_use]
pub fn get_array<'a>(tree: Option<&'a Value>, path: &[&str]) -> Option<&'a [Value]> {
    get(tree, path)?.as_array().map(Vec::as_slice)
}
