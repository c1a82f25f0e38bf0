use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use crate::core::error::{Error, Result};
use crate::schema::key_path::{resolve_segments, KeyPath, PathSegment};

pub const ID_FIELD: &str = "_id";

/// Process-unique 5 bytes plus the counter seed, drawn once
static PROCESS_UNIQUE: OnceLock<([u8; 5], u32)> = OnceLock::new();
static ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a 24-hex-char id: 4 bytes seconds, 5 bytes process, 3 bytes counter.
/// Ids generated by one process sort by creation second.
pub fn generate_id() -> String {
    let (process, seed) = *PROCESS_UNIQUE.get_or_init(|| {
        let random = Uuid::new_v4();
        let bytes = random.as_bytes();
        let mut process = [0u8; 5];
        process.copy_from_slice(&bytes[..5]);
        let seed = u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]);
        (process, seed)
    });

    let seconds = Utc::now().timestamp() as u32;
    let counter = seed.wrapping_add(ID_COUNTER.fetch_add(1, Ordering::Relaxed)) & 0x00ff_ffff;

    let mut raw = [0u8; 12];
    raw[..4].copy_from_slice(&seconds.to_be_bytes());
    raw[4..9].copy_from_slice(&process);
    raw[9..].copy_from_slice(&counter.to_be_bytes()[1..]);

    raw.iter().map(|b| format!("{:02x}", b)).collect()
}

/// User-level entity: a JSON object carrying a string `_id`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Map::new() }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Document { fields }),
            other => Err(Error::invalid_argument(format!(
                "Document must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// The document `_id`; `Ok(None)` when unset, an Identity error when not a string
    pub fn id(&self) -> Result<Option<&str>> {
        match self.fields.get(ID_FIELD) {
            None => Ok(None),
            Some(Value::String(id)) if !id.is_empty() => Ok(Some(id)),
            Some(Value::String(_)) => Err(Error::identity("Document _id must not be empty")),
            Some(other) => Err(Error::identity(format!(
                "Document _id must be a string, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Return the existing `_id`, assigning a generated one when absent
    pub fn ensure_id(&mut self) -> Result<String> {
        if let Some(id) = self.id()? {
            return Ok(id.to_string());
        }
        let id = generate_id();
        self.fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        Ok(id)
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        let mut segments = path.segments().iter();
        let first = match segments.next() {
            Some(PathSegment::Field(name)) => self.fields.get(name)?,
            _ => return None,
        };
        resolve_segments(first, segments.as_slice())
    }

    pub fn insert(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Document::from_value(value)
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_unique_hex() {
        let a = generate_id();
        let b = generate_id();
        assert_eq!(a.len(), 24);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn ensure_id_keeps_existing() {
        let mut doc = Document::from_value(json!({"_id": "abc", "x": 1})).unwrap();
        assert_eq!(doc.ensure_id().unwrap(), "abc");

        let mut fresh = Document::from_value(json!({"x": 1})).unwrap();
        let id = fresh.ensure_id().unwrap();
        assert_eq!(fresh.id().unwrap(), Some(id.as_str()));
    }

    #[test]
    fn rejects_non_string_ids() {
        let doc = Document::from_value(json!({"_id": 7})).unwrap();
        assert!(doc.id().is_err());
        assert!(Document::from_value(json!([1])).is_err());
    }

    #[test]
    fn reads_nested_paths() {
        let doc = Document::from_value(json!({"a": {"b": ["x", "y"]}})).unwrap();
        assert_eq!(doc.get(&KeyPath::parse("a.b[1]").unwrap()), Some(&json!("y")));
    }
}
