//! Ant-style path patterns.
//!
//! Patterns and routing keys are split on `/` into segments:
//!
//! | Pattern element | Matches |
//! |-----------------|---------|
//! | `**`            | zero or more whole segments |
//! | `*`             | exactly one segment |
//! | `?` inside a segment | exactly one character |
//! | `*` inside a segment | any run of characters, e.g. `*.json` |
//! | anything else   | the literal segment, case-sensitive |
//!
//! A pattern and a key must agree on a leading `/`. A key ending in `/`
//! only matches a pattern that also ends in `/` or ends in `**`.

use std::fmt;

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// A segment with `?` or embedded `*` wildcards.
    Glob(Vec<char>),
    /// `*`
    AnySegment,
    /// `**`
    AnyDepth,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw {
            "**" => Segment::AnyDepth,
            "*" => Segment::AnySegment,
            _ if raw.contains(['*', '?']) => Segment::Glob(raw.chars().collect()),
            _ => Segment::Literal(raw.to_string()),
        }
    }

    fn matches(&self, part: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == part,
            Segment::AnySegment => true,
            Segment::Glob(glob) => {
                let part: Vec<char> = part.chars().collect();
                glob_match(glob, &part)
            }
            Segment::AnyDepth => true,
        }
    }
}

/// A compiled Ant-style pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct AntPattern {
    raw: String,
    absolute: bool,
    trailing_separator: bool,
    segments: Vec<Segment>,
}

impl AntPattern {
    /// Compile a pattern. Every string is a valid pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let mut segments: Vec<Segment> = Vec::new();
        for part in raw.split(SEPARATOR).filter(|s| !s.is_empty()) {
            let segment = Segment::parse(part);
            // `**/**` is the same as `**`
            if segment == Segment::AnyDepth && segments.last() == Some(&Segment::AnyDepth) {
                continue;
            }
            segments.push(segment);
        }
        Self {
            absolute: raw.starts_with(SEPARATOR),
            trailing_separator: raw.len() > 1 && raw.ends_with(SEPARATOR),
            raw,
            segments,
        }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if the pattern contains no wildcards.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Test whether `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        if path.starts_with(SEPARATOR) != self.absolute {
            return false;
        }
        if path.len() > 1
            && path.ends_with(SEPARATOR)
            && !self.trailing_separator
            && self.segments.last() != Some(&Segment::AnyDepth)
        {
            return false;
        }
        let parts: Vec<&str> = path.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }
}

impl fmt::Debug for AntPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AntPattern").field(&self.raw).finish()
    }
}

impl fmt::Display for AntPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Test `path` against `pattern` without keeping the compiled pattern.
pub fn ant_match(pattern: &str, path: &str) -> bool {
    AntPattern::new(pattern).matches(path)
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            if rest.is_empty() {
                return true;
            }
            (0..=parts.len()).any(|skip| match_segments(rest, &parts[skip..]))
        }
        Some((segment, rest)) => match parts.split_first() {
            Some((part, tail)) => segment.matches(part) && match_segments(rest, tail),
            None => false,
        },
    }
}

fn glob_match(glob: &[char], text: &[char]) -> bool {
    // Iterative wildcard match with single-star backtracking.
    let (mut g, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match glob.get(g) {
            Some('?') => {
                g += 1;
                t += 1;
            }
            Some('*') => {
                star = Some((g, t));
                g += 1;
            }
            Some(&c) if c == text[t] => {
                g += 1;
                t += 1;
            }
            _ => match star {
                Some((sg, st)) => {
                    g = sg + 1;
                    t = st + 1;
                    star = Some((sg, st + 1));
                }
                None => return false,
            },
        }
    }
    glob[g..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_segments_match_verbatim() {
        assert!(ant_match("/orders/create", "/orders/create"));
        assert!(!ant_match("/orders/create", "/orders/Create"));
        assert!(!ant_match("/orders/create", "/orders/create/1"));
        assert!(!ant_match("/orders", "orders"));
    }

    #[test]
    fn single_star_matches_exactly_one_segment() {
        assert!(ant_match("orders/*", "orders/create"));
        assert!(!ant_match("orders/*", "orders"));
        assert!(!ant_match("orders/*", "orders/create/1"));
        assert!(ant_match("/*/create/*", "/orders/create/9"));
    }

    #[test]
    fn double_star_matches_any_depth_including_zero() {
        assert!(ant_match("orders/**", "orders"));
        assert!(ant_match("orders/**", "orders/create"));
        assert!(ant_match("orders/**", "orders/create/1/2"));
        assert!(ant_match("/**/audit", "/audit"));
        assert!(ant_match("/**/audit", "/a/b/audit"));
        assert!(!ant_match("/**/audit", "/a/b/audit/x"));
        assert!(ant_match("/a/**/b/**/c", "/a/x/b/y/z/c"));
        assert!(ant_match("/**", "/"));
    }

    #[test]
    fn in_segment_wildcards() {
        assert!(ant_match("/files/*.json", "/files/report.json"));
        assert!(!ant_match("/files/*.json", "/files/report.xml"));
        assert!(ant_match("/v?/users", "/v2/users"));
        assert!(!ant_match("/v?/users", "/v10/users"));
        assert!(ant_match("/a*b*c", "/aXXbYYc"));
    }

    #[test]
    fn trailing_separator_handling() {
        assert!(!ant_match("/orders/create", "/orders/create/"));
        assert!(ant_match("/orders/create/", "/orders/create/"));
        assert!(ant_match("/orders/**", "/orders/create/"));
    }

    #[test]
    fn literal_detection() {
        assert!(AntPattern::new("/a/b").is_literal());
        assert!(!AntPattern::new("/a/*").is_literal());
        assert_eq!(AntPattern::new("/a/**/**").to_string(), "/a/**/**");
    }
}
