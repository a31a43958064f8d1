//! Identifier addressing.
//!
//! Expressions name values relative to their own context. Before anything
//! is observed those names are rewritten into absolute identifiers rooted at
//! one of a fixed set of roots on the owner object:
//!
//! | relative        | absolute                         |
//! |-----------------|----------------------------------|
//! | `user.name`     | `context.user.name`              |
//! | `@theme.color`  | `resources.theme.value.color`    |
//! | (app root)      | `app.context.<path>`             |

use std::fmt;

/// Root segment of an owner's own context.
pub const CONTEXT_ROOT: &str = "context";
/// Root segment of named resources.
pub const RESOURCES_ROOT: &str = "resources";
/// Root segment of the application-wide context.
pub const APP_ROOT: &str = "app";

/// Split a dotted path into its segments. Empty segments are dropped, so
/// `"a..b"` and `"a.b"` address the same slot.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|segment| !segment.is_empty()).collect()
}

pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut joined = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            joined.push('.');
        }
        joined.push_str(segment.as_ref());
    }
    joined
}

/// Whether a segment addresses an array element.
pub fn is_index_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Every proper prefix of `path`, shortest first: `a.b.c` yields `a` and
/// `a.b`.
pub(crate) fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('.').map(move |(i, _)| &path[..i])
}

/// Split `path` into its parent path and final key.
pub(crate) fn parent_and_key(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((parent, key)) => (Some(parent), key),
        None => (None, path),
    }
}

/// A fully qualified identifier, ready to hand to a context manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbsolutePath(String);

impl AbsolutePath {
    /// Qualify an in-expression identifier. `@alias.rest` is routed through
    /// the owner's resources; anything else hangs off `base` (normally
    /// [`CONTEXT_ROOT`]).
    pub fn resolve(relative: &str, base: &str) -> Self {
        if let Some(aliased) = relative.strip_prefix('@') {
            let (alias, rest) = match aliased.split_once('.') {
                Some((alias, rest)) => (alias, Some(rest)),
                None => (aliased, None),
            };
            let mut path = format!("{}.{}.value", RESOURCES_ROOT, alias);
            if let Some(rest) = rest {
                path.push('.');
                path.push_str(rest);
            }
            return Self(path);
        }
        if base.is_empty() {
            return Self(relative.to_string());
        }
        Self(format!("{}.{}", base, relative))
    }

    /// Qualify a path against the application-wide context.
    pub fn app(relative: &str) -> Self {
        Self(format!("{}.{}.{}", APP_ROOT, CONTEXT_ROOT, relative))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Vec<&str> {
        split_path(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AbsolutePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitting_and_joining() {
        assert_eq!(split_path("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(split_path("a..b"), vec!["a", "b"]);
        assert!(split_path("").is_empty());
        assert_eq!(join_path(&["a", "0", "b"]), "a.0.b");
    }

    #[test]
    fn index_segments() {
        assert!(is_index_segment("0"));
        assert!(is_index_segment("12"));
        assert!(!is_index_segment("-1"));
        assert!(!is_index_segment("1a"));
        assert!(!is_index_segment(""));
    }

    #[test]
    fn ancestors_shortest_first() {
        assert_eq!(ancestors("a.b.c").collect::<Vec<_>>(), vec!["a", "a.b"]);
        assert_eq!(ancestors("a").count(), 0);
        assert_eq!(parent_and_key("a.b.c"), (Some("a.b"), "c"));
        assert_eq!(parent_and_key("a"), (None, "a"));
    }

    #[test]
    fn resolving_identifiers() {
        assert_eq!(AbsolutePath::resolve("user.name", CONTEXT_ROOT).as_str(), "context.user.name");
        assert_eq!(
            AbsolutePath::resolve("@theme.color", CONTEXT_ROOT).as_str(),
            "resources.theme.value.color"
        );
        assert_eq!(AbsolutePath::resolve("@theme", CONTEXT_ROOT).as_str(), "resources.theme.value");
        assert_eq!(AbsolutePath::resolve("x", "").as_str(), "x");
        assert_eq!(AbsolutePath::app("title").as_str(), "app.context.title");
    }
}
