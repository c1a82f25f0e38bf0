use std::fmt;
use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res},
    multi::many0,
    sequence::{delimited, preceded},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::core::error::{Error, ErrorKind, Result};

/// One step of a document key path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Parsed document path such as `address.lines[0].city`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath {
    segments: Vec<PathSegment>,
}

fn field_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != '.' && c != '[' && c != ']').parse(input)
}

fn list_index(input: &str) -> IResult<&str, usize> {
    delimited(char('['), map_res(digit1, |d: &str| d.parse::<usize>()), char(']')).parse(input)
}

fn field_with_indexes(input: &str) -> IResult<&str, Vec<PathSegment>> {
    let (input, name) = field_name(input)?;
    let (input, indexes) = many0(list_index).parse(input)?;

    let mut segments = Vec::with_capacity(indexes.len() + 1);
    segments.push(PathSegment::Field(name.to_string()));
    segments.extend(indexes.into_iter().map(PathSegment::Index));
    Ok((input, segments))
}

fn key_path(input: &str) -> IResult<&str, Vec<PathSegment>> {
    let (input, mut segments) = field_with_indexes(input)?;
    let (input, rest) = many0(preceded(char('.'), field_with_indexes)).parse(input)?;
    for part in rest {
        segments.extend(part);
    }
    Ok((input, segments))
}

impl KeyPath {
    pub fn parse(input: &str) -> Result<Self> {
        match all_consuming(key_path).parse(input) {
            Ok((_, segments)) => Ok(KeyPath { segments }),
            Err(_) => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("Invalid key path '{}'", input),
            )),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True when `self` is `other` or one of its ancestors
    pub fn covers(&self, other: &KeyPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Remaining segments of `other` below `self`, if `self` covers it
    pub fn suffix_of<'a>(&self, other: &'a KeyPath) -> Option<&'a [PathSegment]> {
        other.segments.strip_prefix(self.segments.as_slice())
    }

    pub fn overlaps(&self, other: &KeyPath) -> bool {
        self.covers(other) || other.covers(self)
    }

    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        resolve_segments(value, &self.segments)
    }
}

/// Walk `segments` down from `value`; `None` when any step is missing.
pub fn resolve_segments<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Field(name), Value::Object(map)) => map.get(name)?,
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for KeyPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        KeyPath::parse(&value)
    }
}

impl TryFrom<&str> for KeyPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        KeyPath::parse(value)
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.to_string()
    }
}
