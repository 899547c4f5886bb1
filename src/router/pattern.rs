//! Compiled path patterns for [`RouteTable::register_pattern`].
//!
//! | Pattern               | Example match              | Captured params                  |
//! |-----------------------|----------------------------|----------------------------------|
//! | `/items/:id`          | `/items/42`                | `id → "42"`                      |
//! | `/users/:id/posts/:p` | `/users/7/posts/99`        | `id → "7"`, `p → "99"`           |
//! | `/files/*`            | `/files/docs/readme.txt`   | `wildcard → "/docs/readme.txt"`  |
//!
//! Matching is segment by segment with no slash normalization: `/items/:id`
//! matches neither `/items/` nor `/items/42/`.
//!
//! [`RouteTable::register_pattern`]: super::RouteTable::register_pattern

use crate::context::PathParams;

/// Parameter name under which a trailing `/*` stores the rest of the path.
pub const WILDCARD: &str = "wildcard";

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Parameter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pattern {
    segments: Vec<Segment>,
    // Trailing `/*`: everything after the segments is captured.
    wildcard: bool,
}

impl Pattern {
    /// Compiles a pattern string. `:name` segments capture, a trailing `/*`
    /// captures the remainder, anything else must match literally. A bare `:`
    /// is a literal segment.
    pub(crate) fn parse(pattern: &str) -> Self {
        let (body, wildcard) = match pattern.strip_suffix("/*") {
            Some(prefix) => (prefix, true),
            None => (pattern, false),
        };

        let segments = body
            .split('/')
            .map(|s| match s.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Parameter(name.to_owned()),
                _ => Segment::Static(s.to_owned()),
            })
            .collect();

        Self { segments, wildcard }
    }

    /// Matches `path`, returning the captured parameters on success.
    pub(crate) fn matches(&self, path: &str) -> Option<PathParams> {
        let mut parts = path.split('/');
        let mut params = PathParams::new();

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Static(literal) if literal != part => return None,
                Segment::Static(_) => {}
                Segment::Parameter(_) if part.is_empty() => return None,
                Segment::Parameter(name) => params.insert(name.as_str(), part),
            }
        }

        if self.wildcard {
            let rest: String = parts.map(|p| format!("/{p}")).collect();
            params.insert(WILDCARD, rest);
            Some(params)
        } else if parts.next().is_none() {
            Some(params)
        } else {
            None
        }
    }
}
