use serde_json::{Map, Value};
use crate::backend::attribute::AttributeType;
use crate::core::error::Result;
use crate::core::types::json_type_name;
use crate::expression::ast::{Comparator, Condition, KeyPathCondition};
use crate::expression::mapper::ParsePath;
use crate::schema::key_path::KeyPath;

/// Parse the JSON condition DSL into a typed `Condition`.
///
/// Examples:
/// - `{"status": "open"}` -> status = "open"
/// - `{"price": {"$gte": 10, "$lt": 20}}` -> both comparators, AND-joined
/// - `{"$or": [{"a": 1}, {"b": {"$exists": false}}]}`
/// - `{"$not": {"tags": {"$contains": "x"}}}`
pub fn parse_condition(value: &Value) -> Result<Condition> {
    let mut path = ParsePath::new();
    parse_node(value, &mut path)
}

fn parse_node(value: &Value, path: &mut ParsePath) -> Result<Condition> {
    let object = match value {
        Value::Object(object) if !object.is_empty() => object,
        Value::Object(_) => return Err(path.error("Condition must not be empty")),
        other => {
            return Err(path.error(format!(
                "Condition must be an object, found {}",
                json_type_name(other)
            )));
        }
    };

    let operators = object.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return parse_key_paths(object, path);
    }
    if object.len() > 1 {
        return Err(path.error(
            "Logical operators must be the only key of their object; do not mix them with key paths",
        ));
    }

    let (operator, operand) = match object.iter().next() {
        Some(entry) => entry,
        None => return Err(path.error("Condition must not be empty")),
    };
    path.push_key(operator);
    let condition = match operator.as_str() {
        "$and" => Condition::And(parse_clauses(operand, path)?),
        "$or" => Condition::Or(parse_clauses(operand, path)?),
        "$not" => Condition::Not(Box::new(parse_node(operand, path)?)),
        other => return Err(path.error(format!("Unknown logical operator '{}'", other))),
    };
    path.pop();
    Ok(condition)
}

fn parse_clauses(operand: &Value, path: &mut ParsePath) -> Result<Vec<Condition>> {
    let items = match operand {
        Value::Array(items) if !items.is_empty() => items,
        Value::Array(_) => return Err(path.error("Expected at least one clause")),
        _ => return Err(path.error("Expected an array of clauses")),
    };

    let mut clauses = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        path.push_index(i);
        clauses.push(parse_node(item, path)?);
        path.pop();
    }
    Ok(clauses)
}

fn parse_key_paths(object: &Map<String, Value>, path: &mut ParsePath) -> Result<Condition> {
    let mut conditions = Vec::with_capacity(object.len());
    for (raw, operand) in object {
        path.push_key(raw);
        let key_path = KeyPath::parse(raw).map_err(|_| path.error(format!("Invalid key path '{}'", raw)))?;
        let comparators = parse_comparators(operand, path)?;
        path.pop();
        conditions.push(KeyPathCondition { key_path, comparators });
    }
    Ok(Condition::KeyPaths(conditions))
}

fn parse_comparators(operand: &Value, path: &mut ParsePath) -> Result<Vec<Comparator>> {
    let object = match operand {
        Value::Object(object) if object.keys().any(|k| k.starts_with('$')) => object,
        // Literal shorthand for $eq, including plain objects
        literal => return Ok(vec![Comparator::Eq(literal.clone())]),
    };

    if object.keys().any(|k| !k.starts_with('$')) {
        return Err(path.error("Comparator objects must not mix operators and plain keys"));
    }

    let mut comparators = Vec::with_capacity(object.len());
    for (operator, value) in object {
        path.push_key(operator);
        comparators.push(parse_comparator(operator, value, path)?);
        path.pop();
    }
    Ok(comparators)
}

fn parse_comparator(operator: &str, value: &Value, path: &ParsePath) -> Result<Comparator> {
    Ok(match operator {
        "$eq" => Comparator::Eq(value.clone()),
        "$neq" => Comparator::Neq(value.clone()),
        "$gt" => Comparator::Gt(value.clone()),
        "$gte" => Comparator::Gte(value.clone()),
        "$lt" => Comparator::Lt(value.clone()),
        "$lte" => Comparator::Lte(value.clone()),
        "$between" => {
            let bounds = value
                .as_object()
                .ok_or_else(|| path.error("$between expects {\"$gte\": .., \"$lte\": ..}"))?;
            if bounds.keys().any(|k| k != "$gte" && k != "$lte") {
                return Err(path.error("$between accepts only $gte and $lte"));
            }
            match (bounds.get("$gte"), bounds.get("$lte")) {
                (Some(gte), Some(lte)) => Comparator::Between { gte: gte.clone(), lte: lte.clone() },
                _ => return Err(path.error("$between requires both $gte and $lte")),
            }
        }
        "$in" => match value {
            Value::Array(values) => Comparator::In(values.clone()),
            _ => return Err(path.error("$in expects an array")),
        },
        "$exists" => match value {
            Value::Bool(b) => Comparator::Exists(*b),
            _ => return Err(path.error("$exists expects a boolean")),
        },
        "$type" => {
            let descriptor = value.as_str().and_then(AttributeType::from_descriptor);
            match descriptor {
                Some(t) => Comparator::Type(t),
                None => return Err(path.error(format!("$type expects a type descriptor, found {}", value))),
            }
        }
        "$beginsWith" => match value {
            Value::String(prefix) => Comparator::BeginsWith(prefix.clone()),
            _ => return Err(path.error("$beginsWith expects a string")),
        },
        "$contains" => Comparator::Contains(value.clone()),
        other => return Err(path.error(format!("Unknown comparator '{}'", other))),
    })
}
