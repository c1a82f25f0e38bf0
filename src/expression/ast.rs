use serde_json::Value;
use crate::backend::attribute::AttributeType;
use crate::core::error::Result;
use crate::schema::key_path::KeyPath;

/// Structured condition over document fields
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    KeyPaths(Vec<KeyPathCondition>),  // Implicitly AND-joined
}

/// Comparators applied to one document path, AND-joined
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPathCondition {
    pub key_path: KeyPath,
    pub comparators: Vec<Comparator>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    Eq(Value),
    Neq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Between { gte: Value, lte: Value },
    In(Vec<Value>),
    Exists(bool),
    Type(AttributeType),
    BeginsWith(String),
    Contains(Value),
}

impl Comparator {
    /// Operator key as written in the JSON form
    pub fn operator(&self) -> &'static str {
        match self {
            Comparator::Eq(_) => "$eq",
            Comparator::Neq(_) => "$neq",
            Comparator::Gt(_) => "$gt",
            Comparator::Gte(_) => "$gte",
            Comparator::Lt(_) => "$lt",
            Comparator::Lte(_) => "$lte",
            Comparator::Between { .. } => "$between",
            Comparator::In(_) => "$in",
            Comparator::Exists(_) => "$exists",
            Comparator::Type(_) => "$type",
            Comparator::BeginsWith(_) => "$beginsWith",
            Comparator::Contains(_) => "$contains",
        }
    }
}

impl Condition {
    pub fn field(key_path: &str, comparator: Comparator) -> Result<Self> {
        Ok(Condition::KeyPaths(vec![KeyPathCondition {
            key_path: KeyPath::parse(key_path)?,
            comparators: vec![comparator],
        }]))
    }

    pub fn and(clauses: Vec<Condition>) -> Self {
        Condition::And(clauses)
    }

    pub fn or(clauses: Vec<Condition>) -> Self {
        Condition::Or(clauses)
    }

    pub fn not(clause: Condition) -> Self {
        Condition::Not(Box::new(clause))
    }

    /// Parse the JSON condition DSL (`{"$and": [...]}`, `{"a.b": {"$gt": 1}}`, ...)
    pub fn from_json(value: &Value) -> Result<Self> {
        crate::expression::parser::parse_condition(value)
    }
}
