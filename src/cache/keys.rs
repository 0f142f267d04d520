//! Query key definitions.
//!
//! A `QueryKey` identifies one cached query result. Keys are ordered segment
//! sequences; a longer key that extends a shorter one is a refinement of it,
//! so invalidating `posts` also reaches `posts/42`.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Root segment for article lists and article detail queries.
pub const POSTS: &str = "posts";
/// Root segment for the homepage hero carousel.
pub const HERO_ARTICLES: &str = "heroArticles";
/// Root segment for dashboard statistics.
pub const STATS: &str = "stats";
/// Root segment for user listings.
pub const USERS: &str = "users";
/// Root segment for public profile data.
pub const PROFILES: &str = "profiles";
/// Root segment for moderation reports.
pub const REPORTS: &str = "reports";

const SEPARATOR: char = '/';
const QUOTE: char = '"';
const ESCAPE: char = '\\';

/// One segment of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl KeySegment {
    /// Interpret an unquoted segment. Only canonical integers (`0`, `-7`,
    /// never `007` or `+7`) become `Int`.
    fn parse_bare(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(value) if is_canonical_int(raw) => Self::Int(value),
            _ => match raw {
                "true" => Self::Bool(true),
                "false" => Self::Bool(false),
                _ => Self::Str(raw.to_string()),
            },
        }
    }
}

fn is_canonical_int(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    match digits.as_bytes() {
        [] => false,
        [b'0'] => digits.len() == raw.len(),
        [first, rest @ ..] => {
            first.is_ascii_digit() && *first != b'0' && rest.iter().all(u8::is_ascii_digit)
        }
    }
}

/// String segments that would read back as something else are quoted.
fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value.trim() != value
        || value.contains([SEPARATOR, QUOTE, ESCAPE])
        || !matches!(KeySegment::parse_bare(value), KeySegment::Str(_))
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) if needs_quoting(value) => {
                f.write_char(QUOTE)?;
                for ch in value.chars() {
                    if ch == QUOTE || ch == ESCAPE {
                        f.write_char(ESCAPE)?;
                    }
                    f.write_char(ch)?;
                }
                f.write_char(QUOTE)
            }
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for KeySegment {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Identity of a cached query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    segments: Vec<KeySegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("query key must not be empty")]
    Empty,
    #[error("query key `{key}` has an empty segment at position {position}")]
    EmptySegment { key: String, position: usize },
    #[error("query key `{key}` has a malformed quoted segment at position {position}")]
    MalformedQuote { key: String, position: usize },
}

enum SegmentFault {
    Empty,
    Quote,
}

impl SegmentFault {
    fn at(self, key: &str, position: usize) -> KeyParseError {
        let key = key.to_string();
        match self {
            Self::Empty => KeyParseError::EmptySegment { key, position },
            Self::Quote => KeyParseError::MalformedQuote { key, position },
        }
    }
}

/// Split the next segment off `input`, returning it and the remainder after
/// the separator, if any.
fn next_segment(input: &str) -> Result<(KeySegment, Option<&str>), SegmentFault> {
    let input = input.trim_start();

    if let Some(quoted) = input.strip_prefix(QUOTE) {
        let mut value = String::new();
        let mut chars = quoted.char_indices();
        while let Some((index, ch)) = chars.next() {
            match ch {
                ESCAPE => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => return Err(SegmentFault::Quote),
                },
                QUOTE => {
                    let after = quoted[index + QUOTE.len_utf8()..].trim_start();
                    return match after.strip_prefix(SEPARATOR) {
                        Some(tail) => Ok((KeySegment::Str(value), Some(tail))),
                        None if after.is_empty() => Ok((KeySegment::Str(value), None)),
                        None => Err(SegmentFault::Quote),
                    };
                }
                _ => value.push(ch),
            }
        }
        return Err(SegmentFault::Quote);
    }

    let (raw, tail) = match input.split_once(SEPARATOR) {
        Some((raw, tail)) => (raw, Some(tail)),
        None => (input, None),
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SegmentFault::Empty);
    }
    if raw.contains(QUOTE) {
        return Err(SegmentFault::Quote);
    }
    Ok((KeySegment::parse_bare(raw), tail))
}

impl QueryKey {
    pub fn new(segments: Vec<KeySegment>) -> Self {
        Self { segments }
    }

    /// Single-segment key such as `["posts"]`.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![KeySegment::Str(name.into())],
        }
    }

    /// Build a refinement of this key by appending one segment.
    pub fn child(&self, segment: impl Into<KeySegment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true when `other` equals this key or refines it.
    pub fn is_prefix_of(&self, other: &QueryKey) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Parse the `/`-separated textual form, e.g. `posts/42`.
    ///
    /// String segments that look like integers or booleans, or that contain
    /// `/`, are written in double quotes (`posts/"42"`), so the textual form
    /// reads back to an equal key.
    pub fn parse(text: &str) -> Result<Self, KeyParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(KeyParseError::Empty);
        }

        let mut segments = Vec::new();
        let mut rest = trimmed;
        loop {
            let (segment, tail) =
                next_segment(rest).map_err(|fault| fault.at(trimmed, segments.len()))?;
            segments.push(segment);
            match tail {
                Some(tail) => rest = tail,
                None => break,
            }
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for QueryKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for QueryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QueryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
