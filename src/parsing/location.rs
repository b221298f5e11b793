//! GenBank feature location strings.
//!
//! Supported forms:
//!
//! | Location | Span | Strand |
//! |----------|------|--------|
//! | `100..200` | 100-200 | + |
//! | `<100..>200` | 100-200 | + |
//! | `42` | 42-42 | + |
//! | `99^100` | 99-100 | + |
//! | `complement(100..200)` | 100-200 | - |
//! | `join(1..10,20..30)` | 1-10 | + |
//! | `complement(join(1..10,20..30))` | 1-10 | - |
//! | `ACC123.1:5..9` | 5-9 | + |
//!
//! `join(...)` and `order(...)` keep only their **first** sub-range. Multi-part
//! features are therefore represented by their leading segment; `is_multipart`
//! tells the caller that segments were discarded.

use crate::core::types::{OneBasedSpan, Strand};

/// Result of parsing a location string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLocation {
    pub span: OneBasedSpan,
    pub strand: Strand,
    /// True when the location was a `join`/`order` and later segments were dropped
    pub is_multipart: bool,
}

/// Parse a location string; `None` if it is not understood
pub fn parse_location(input: &str) -> Option<ParsedLocation> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    parse_inner(&compact, Strand::Forward)
}

fn parse_inner(s: &str, strand: Strand) -> Option<ParsedLocation> {
    if let Some(inner) = strip_wrapper(s, "complement") {
        return parse_inner(inner, strand.flipped());
    }

    if let Some(inner) = strip_wrapper(s, "join").or_else(|| strip_wrapper(s, "order")) {
        let first = first_top_level_part(inner)?;
        let parsed = parse_inner(first, strand)?;
        return Some(ParsedLocation {
            is_multipart: true,
            ..parsed
        });
    }

    parse_range(s).map(|span| ParsedLocation {
        span,
        strand,
        is_multipart: false,
    })
}

/// `name(inner)` -> `inner`, only if the closing parenthesis ends the string
fn strip_wrapper<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')
}

/// Text before the first comma that is not nested inside parentheses
fn first_top_level_part(s: &str) -> Option<&str> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => return Some(&s[..i]),
            _ => {}
        }
        if depth < 0 {
            return None;
        }
    }
    if depth == 0 && !s.is_empty() {
        Some(s)
    } else {
        None
    }
}

fn parse_range(s: &str) -> Option<OneBasedSpan> {
    // Remote references ("J00194.1:100..202") point into another record
    let s = s.rsplit_once(':').map_or(s, |(_, local)| local);
    let cleaned: String = s.chars().filter(|c| *c != '<' && *c != '>').collect();

    let (start, end) = if let Some((a, b)) = cleaned.split_once("..") {
        (a.parse::<u64>().ok()?, b.parse::<u64>().ok()?)
    } else if let Some((a, b)) = cleaned.split_once('^') {
        (a.parse::<u64>().ok()?, b.parse::<u64>().ok()?)
    } else {
        let pos = cleaned.parse::<u64>().ok()?;
        (pos, pos)
    };

    OneBasedSpan::new(start, end)
}
