use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::backend::attribute::Item;
use crate::core::error::{Error, Result};
use crate::core::types::{json_type_name, Document};
use crate::expression::ast::Condition;
use crate::key::boundary::IdRange;
use crate::schema::key_path::KeyPath;

/// Order of results along the sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn scan_forward(&self) -> bool {
        matches!(self, SortDirection::Ascending)
    }
}

/// Opaque continuation token. Pass it back unchanged to fetch the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn from_key(key: &Item) -> Result<Self> {
        Ok(Cursor(serde_json::to_string(key)?))
    }

    pub fn to_key(&self) -> Result<Item> {
        serde_json::from_str(&self.0)
            .map_err(|e| Error::invalid_argument(format!("Malformed cursor: {}", e)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Cursor(token)
    }
}

/// Paging, ordering and filtering shared by every range read
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub limit: Option<u32>,
    pub cursor: Option<Cursor>,
    pub direction: SortDirection,
    pub filter: Option<Condition>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub(crate) fn start_key(&self) -> Result<Option<Item>> {
        self.cursor.as_ref().map(Cursor::to_key).transpose()
    }
}

/// Exact-match lookup through one declared access pattern
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub key_values: Vec<(KeyPath, String)>,
    pub options: FindOptions,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, path: &str, value: &str) -> Result<Self> {
        let path = KeyPath::parse(path)?;
        if self.key_values.iter().any(|(p, _)| *p == path) {
            return Err(Error::invalid_argument(format!("Key path '{}' given twice", path)));
        }
        self.key_values.push((path, value.to_string()));
        Ok(self)
    }

    pub fn with_options(mut self, options: FindOptions) -> Self {
        self.options = options;
        self
    }

    /// `{"email": "a@x", "name.last": "L"}`; values must be strings
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::invalid_argument(format!("Find query must be an object, found {}", json_type_name(value)))
        })?;

        let mut query = FindQuery::new();
        for (path, value) in object {
            match value {
                Value::String(s) => query = query.where_eq(path, s)?,
                other => {
                    return Err(Error::indexed_field(format!(
                        "Query value at '{}' must be a string, found {}",
                        path,
                        json_type_name(other)
                    )));
                }
            }
        }
        Ok(query)
    }

    pub fn value_at(&self, path: &KeyPath) -> Option<&str> {
        self.key_values.iter().find(|(p, _)| p == path).map(|(_, v)| v.as_str())
    }
}

/// Child-collection read scoped to one parent, optionally bounded by id
#[derive(Debug, Clone, Default)]
pub struct ChildQuery {
    pub range: Option<IdRange>,
    pub options: FindOptions,
}

/// One page of results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    pub items: Vec<Document>,
    pub cursor: Option<Cursor>,
}

/// One page of an adjacency read, grouped by collection in item order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjacencyResult {
    pub items: Vec<(String, Document)>,
    pub cursor: Option<Cursor>,
}

impl AdjacencyResult {
    pub fn of<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a Document> + 'a {
        self.items.iter().filter(move |(c, _)| c == collection).map(|(_, d)| d)
    }
}
