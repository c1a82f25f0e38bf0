use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use regex::Regex;
use crate::backend::attribute::AttributeValue;
use crate::backend::ExpressionAttributes;
use crate::core::error::Error;
use crate::expression::reserved::is_reserved;
use crate::schema::key_path::{KeyPath, PathSegment};

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid identifier pattern"))
}

/// Escapes attribute names, reusing one reference per raw name
#[derive(Debug, Default)]
pub struct NameMapper {
    references: HashMap<String, String>,  // raw -> reference as written in expressions
    names: HashMap<String, String>,       // #reference -> raw, escaped names only
    next: usize,
}

impl NameMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, raw: &str) -> String {
        if let Some(reference) = self.references.get(raw) {
            return reference.clone();
        }

        let reference = if identifier_pattern().is_match(raw) {
            if is_reserved(raw) {
                format!("#{}", raw)
            } else {
                raw.to_string()
            }
        } else {
            let reference = format!("#attr{}", self.next);
            self.next += 1;
            reference
        };

        if reference.starts_with('#') {
            self.names.insert(reference.clone(), raw.to_string());
        }
        self.references.insert(raw.to_string(), reference.clone());
        reference
    }

    /// `root.seg.seg[0]` with every field segment escaped independently
    pub fn map_path(&mut self, root: &str, path: &KeyPath) -> String {
        let mut rendered = self.map(root);
        for segment in path.segments() {
            match segment {
                PathSegment::Field(name) => {
                    rendered.push('.');
                    rendered.push_str(&self.map(name));
                }
                PathSegment::Index(i) => {
                    rendered.push_str(&format!("[{}]", i));
                }
            }
        }
        rendered
    }

    pub fn into_names(self) -> HashMap<String, String> {
        self.names
    }
}

/// Allocates a fresh `:valueN` per literal occurrence
#[derive(Debug, Default)]
pub struct ValueMapper {
    values: HashMap<String, AttributeValue>,
}

impl ValueMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, value: AttributeValue) -> String {
        let reference = format!(":value{}", self.values.len());
        self.values.insert(reference.clone(), value);
        reference
    }

    pub fn into_values(self) -> HashMap<String, AttributeValue> {
        self.values
    }
}

/// Placeholder state for one request. Condition, key and update
/// expressions of the same request must share it.
#[derive(Debug, Default)]
pub struct ExpressionContext {
    pub names: NameMapper,
    pub values: ValueMapper,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_attributes(self) -> ExpressionAttributes {
        ExpressionAttributes {
            names: self.names.into_names(),
            values: self.values.into_values(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFrame {
    Key(String),
    Index(usize),
}

/// Position inside a structured input, kept only for diagnostics
#[derive(Debug, Clone, Default)]
pub struct ParsePath {
    frames: Vec<PathFrame>,
}

impl ParsePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_key(&mut self, key: &str) {
        self.frames.push(PathFrame::Key(key.to_string()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.frames.push(PathFrame::Index(index));
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn error(&self, context: impl Into<String>) -> Error {
        let err = Error::expression(context);
        if self.frames.is_empty() {
            err
        } else {
            err.with_path(self.to_string())
        }
    }
}

impl fmt::Display for ParsePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, frame) in self.frames.iter().enumerate() {
            match frame {
                PathFrame::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathFrame::Key(key) => write!(f, ".{}", key)?,
                PathFrame::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_escaped_only_when_needed() {
        let mut names = NameMapper::new();
        assert_eq!(names.map("email"), "email");
        assert_eq!(names.map("value"), "#value");
        assert_eq!(names.map("first-name"), "#attr0");
        assert_eq!(names.map("first-name"), "#attr0");
        assert_eq!(names.map("2nd"), "#attr1");

        let map = names.into_names();
        assert_eq!(map.len(), 3);
        assert_eq!(map["#value"], "value");
        assert_eq!(map["#attr0"], "first-name");
    }

    #[test]
    fn paths_escape_each_segment() {
        let mut names = NameMapper::new();
        let path = KeyPath::parse("address.status.lines[2]").unwrap();
        assert_eq!(names.map_path("value", &path), "#value.address.#status.#lines[2]");

        let path = KeyPath::parse("address.street[0]").unwrap();
        assert_eq!(names.map_path("profile", &path), "profile.address.street[0]");
    }

    #[test]
    fn values_are_never_deduplicated() {
        let mut values = ValueMapper::new();
        assert_eq!(values.map(AttributeValue::number(1)), ":value0");
        assert_eq!(values.map(AttributeValue::number(1)), ":value1");
        assert_eq!(values.into_values().len(), 2);
    }

    #[test]
    fn parse_path_renders_frames() {
        let mut path = ParsePath::new();
        path.push_key("$and");
        path.push_index(1);
        path.push_key("b");
        path.push_key("$in");
        assert_eq!(path.to_string(), "$and[1].b.$in");
        path.pop();
        assert_eq!(path.error("boom").path.as_deref(), Some("$and[1].b"));
    }
}
