use std::collections::HashMap;
use std::fmt;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use crate::core::error::{Error, ErrorKind, Result};

/// Flattened on-storage record: attribute name -> typed value
pub type Item = HashMap<String, AttributeValue>;

/// Typed attribute value as understood by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),  // Numbers travel as decimal strings
    B(Bytes),
    Bool(bool),
    Null,
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
    Ss(Vec<String>),
    Ns(Vec<String>),
    Bs(Vec<Bytes>),
}

/// Type descriptors accepted by `attribute_type(...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "SS")]
    StringSet,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "NS")]
    NumberSet,
    #[serde(rename = "B")]
    Binary,
    #[serde(rename = "BS")]
    BinarySet,
    #[serde(rename = "BOOL")]
    Boolean,
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "L")]
    List,
    #[serde(rename = "M")]
    Map,
}

impl AttributeType {
    pub fn descriptor(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::StringSet => "SS",
            AttributeType::Number => "N",
            AttributeType::NumberSet => "NS",
            AttributeType::Binary => "B",
            AttributeType::BinarySet => "BS",
            AttributeType::Boolean => "BOOL",
            AttributeType::Null => "NULL",
            AttributeType::List => "L",
            AttributeType::Map => "M",
        }
    }

    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        Some(match descriptor {
            "S" => AttributeType::String,
            "SS" => AttributeType::StringSet,
            "N" => AttributeType::Number,
            "NS" => AttributeType::NumberSet,
            "B" => AttributeType::Binary,
            "BS" => AttributeType::BinarySet,
            "BOOL" => AttributeType::Boolean,
            "NULL" => AttributeType::Null,
            "L" => AttributeType::List,
            "M" => AttributeType::Map,
            _ => return None,
        })
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.descriptor())
    }
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    pub fn number<N: fmt::Display>(value: N) -> Self {
        AttributeValue::N(value.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::S(_) => AttributeType::String,
            AttributeValue::N(_) => AttributeType::Number,
            AttributeValue::B(_) => AttributeType::Binary,
            AttributeValue::Bool(_) => AttributeType::Boolean,
            AttributeValue::Null => AttributeType::Null,
            AttributeValue::L(_) => AttributeType::List,
            AttributeValue::M(_) => AttributeType::Map,
            AttributeValue::Ss(_) => AttributeType::StringSet,
            AttributeValue::Ns(_) => AttributeType::NumberSet,
            AttributeValue::Bs(_) => AttributeType::BinarySet,
        }
    }

    /// Convert a JSON literal into its typed attribute form
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => AttributeValue::N(n.to_string()),
            Value::String(s) => AttributeValue::S(s.clone()),
            Value::Array(items) => AttributeValue::L(items.iter().map(AttributeValue::from_json).collect()),
            Value::Object(map) => AttributeValue::M(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to JSON. Sets become arrays and binary data becomes
    /// arrays of byte values; everything produced by `from_json` round-trips.
    pub fn to_json(&self) -> Result<Value> {
        Ok(match self {
            AttributeValue::S(s) => Value::String(s.clone()),
            AttributeValue::N(n) => Value::Number(parse_number(n)?),
            AttributeValue::B(b) => bytes_to_json(b),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Null => Value::Null,
            AttributeValue::L(items) => Value::Array(
                items.iter().map(|v| v.to_json()).collect::<Result<Vec<_>>>()?,
            ),
            AttributeValue::M(map) => {
                let mut object = Map::with_capacity(map.len());
                for (k, v) in map {
                    object.insert(k.clone(), v.to_json()?);
                }
                Value::Object(object)
            }
            AttributeValue::Ss(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            AttributeValue::Ns(items) => Value::Array(
                items.iter()
                    .map(|n| parse_number(n).map(Value::Number))
                    .collect::<Result<Vec<_>>>()?,
            ),
            AttributeValue::Bs(items) => Value::Array(items.iter().map(bytes_to_json).collect()),
        })
    }
}

fn bytes_to_json(bytes: &Bytes) -> Value {
    Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
}

fn parse_number(raw: &str) -> Result<Number> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Number::from(i));
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Ok(Number::from(u));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| Error::new(ErrorKind::Serialization, format!("Invalid number attribute '{}'", raw)))
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}
