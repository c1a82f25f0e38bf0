use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Lowest and highest code points; UTF-8 byte order matches code point order,
/// so these bracket every string the backend can compare.
pub const MIN_CHAR: char = '\u{0}';
pub const MAX_CHAR: char = char::MAX;

fn next_char(c: char) -> char {
    match c {
        '\u{D7FF}' => '\u{E000}',
        _ => char::from_u32(c as u32 + 1).unwrap_or(MAX_CHAR),
    }
}

fn prev_char(c: char) -> char {
    match c {
        '\u{E000}' => '\u{D7FF}',
        _ => char::from_u32(c as u32 - 1).unwrap_or(MIN_CHAR),
    }
}

fn split_last(s: &str) -> Option<(&str, char)> {
    let last = s.chars().next_back()?;
    Some((&s[..s.len() - last.len_utf8()], last))
}

/// Increment the last code point, carrying into the prefix on overflow
pub fn successor(s: &str) -> String {
    match split_last(s) {
        None => MIN_CHAR.to_string(),
        Some((prefix, MAX_CHAR)) => {
            let mut out = successor(prefix);
            out.push(MIN_CHAR);
            out
        }
        Some((prefix, last)) => {
            let mut out = prefix.to_string();
            out.push(next_char(last));
            out
        }
    }
}

/// Decrement the last code point, borrowing from the prefix on underflow.
/// The empty string has no predecessor and maps to itself.
pub fn predecessor(s: &str) -> String {
    match split_last(s) {
        None => String::new(),
        Some((prefix, MIN_CHAR)) => {
            let mut out = predecessor(prefix);
            out.push(MAX_CHAR);
            out
        }
        Some((prefix, last)) => {
            let mut out = prefix.to_string();
            out.push(prev_char(last));
            out
        }
    }
}

/// Inclusive upper bound for strings starting with `prefix`. Strings that
/// continue past a trailing `MAX_CHAR` (`prefix + MAX_CHAR + ...`) sort above
/// it and are left out; the `Gt` and `Lt` bounds below share this limit.
pub fn prefix_upper_bound(prefix: &str) -> String {
    let mut upper = prefix.to_string();
    upper.push(MAX_CHAR);
    upper
}

/// Range request over the ids of one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdRange {
    Gt(String),
    Gte(String),
    Lt(String),
    Lte(String),
    Between(String, String),
    BeginsWith(String),
}

impl IdRange {
    pub fn from_operator(operator: &str, operands: &[&str]) -> Result<Self> {
        let single = || match operands {
            [value] => Ok(value.to_string()),
            _ => Err(Error::new(
                ErrorKind::Range,
                format!("Range operator '{}' takes exactly one operand", operator),
            )),
        };
        match operator {
            ">" | "gt" => Ok(IdRange::Gt(single()?)),
            ">=" | "gte" => Ok(IdRange::Gte(single()?)),
            "<" | "lt" => Ok(IdRange::Lt(single()?)),
            "<=" | "lte" => Ok(IdRange::Lte(single()?)),
            "begins_with" => Ok(IdRange::BeginsWith(single()?)),
            "between" => match operands {
                [low, high] => Ok(IdRange::Between(low.to_string(), high.to_string())),
                _ => Err(Error::new(ErrorKind::Range, "between takes exactly two operands".to_string())),
            },
            other => Err(Error::new(ErrorKind::Range, format!("Unsupported range operator '{}'", other))),
        }
    }
}

/// Inclusive bounds for a `BETWEEN` key condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBounds {
    pub lower: String,
    pub upper: String,
}

/// Translate a range on a collection's ids into a BETWEEN that never leaves
/// the `collection + separator` prefix. A bare comparison on the composite
/// sort key would also match neighbouring collections in the same partition.
pub fn collection_range(collection: &str, separator: &str, range: Option<&IdRange>) -> Result<SortBounds> {
    let prefix = format!("{}{}", collection, separator);
    let with = |id: &str| format!("{}{}", prefix, id);

    let (lower, upper) = match range {
        None => (prefix.clone(), prefix_upper_bound(&prefix)),
        Some(IdRange::Gt(id)) => {
            let mut lower = with(id);
            lower.push(MIN_CHAR);
            (lower, prefix_upper_bound(&prefix))
        }
        Some(IdRange::Gte(id)) => (with(id), prefix_upper_bound(&prefix)),
        Some(IdRange::Lt(id)) => {
            let mut upper = predecessor(&with(id));
            upper.push(MAX_CHAR);
            (prefix.clone(), upper)
        }
        Some(IdRange::Lte(id)) => (prefix.clone(), with(id)),
        Some(IdRange::Between(low, high)) => (with(low), with(high)),
        Some(IdRange::BeginsWith(id)) => {
            let start = with(id);
            let upper = prefix_upper_bound(&start);
            (start, upper)
        }
    };

    if lower > upper {
        return Err(Error::new(
            ErrorKind::Range,
            format!("Range {:?} on collection '{}' selects nothing", range, collection),
        ));
    }
    Ok(SortBounds { lower, upper })
}

/// Bounds for fetching a parent and selected child collections in one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyBounds {
    pub bounds: SortBounds,
    pub collections: BTreeSet<String>,
}

impl AdjacencyBounds {
    /// The BETWEEN spans every collection name between the smallest and the
    /// largest requested one, so results are filtered on the discriminator.
    pub fn admits(&self, collection: &str) -> bool {
        self.collections.contains(collection)
    }
}

pub fn adjacency_bounds(parent: &str, children: &[&str], separator: &str) -> AdjacencyBounds {
    let collections: BTreeSet<String> = std::iter::once(parent)
        .chain(children.iter().copied())
        .map(String::from)
        .collect();

    // Non-empty: always holds the parent
    let smallest = collections.iter().next().map(String::as_str).unwrap_or(parent);
    let largest = collections.iter().next_back().map(String::as_str).unwrap_or(parent);

    AdjacencyBounds {
        bounds: SortBounds {
            lower: format!("{}{}", smallest, separator),
            upper: prefix_upper_bound(&format!("{}{}", largest, separator)),
        },
        collections,
    }
}
