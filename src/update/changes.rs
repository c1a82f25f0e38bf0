use serde_json::{Map, Value};
use crate::backend::attribute::AttributeValue;
use crate::core::error::{Error, Result};
use crate::core::types::{json_type_name, ID_FIELD};
use crate::schema::key_path::{KeyPath, PathSegment};

/// One requested change to a stored document
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set { path: KeyPath, value: Value },
    Remove { path: KeyPath },
    Add { path: KeyPath, value: Value },  // Number increment or set union
    Append { path: KeyPath, values: Vec<Value> },
    DeleteFromSet { path: KeyPath, value: Value },
}

impl UpdateAction {
    pub fn path(&self) -> &KeyPath {
        match self {
            UpdateAction::Set { path, .. }
            | UpdateAction::Remove { path }
            | UpdateAction::Add { path, .. }
            | UpdateAction::Append { path, .. }
            | UpdateAction::DeleteFromSet { path, .. } => path,
        }
    }

    /// SET and REMOVE fully determine the new value at their path
    pub fn is_assignment(&self) -> bool {
        matches!(self, UpdateAction::Set { .. } | UpdateAction::Remove { .. })
    }
}

/// Partial update of one document.
///
/// ```text
/// {"$set": {"profile.name": "Ada"}, "$remove": ["draft"],
///  "$add": {"visits": 1}, "$append": {"log": ["x"]},
///  "$deleteFromSet": {"tags": ["old"]}}
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSpec {
    actions: Vec<UpdateAction>,
}

impl UpdateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn set(mut self, path: &str, value: Value) -> Result<Self> {
        let path = parse_update_path(path)?;
        self.actions.push(UpdateAction::Set { path, value });
        Ok(self)
    }

    pub fn remove(mut self, path: &str) -> Result<Self> {
        let path = parse_update_path(path)?;
        self.actions.push(UpdateAction::Remove { path });
        Ok(self)
    }

    pub fn add(mut self, path: &str, value: Value) -> Result<Self> {
        let path = parse_update_path(path)?;
        self.actions.push(UpdateAction::Add { path, value });
        Ok(self)
    }

    pub fn append(mut self, path: &str, values: Vec<Value>) -> Result<Self> {
        let path = parse_update_path(path)?;
        self.actions.push(UpdateAction::Append { path, values });
        Ok(self)
    }

    pub fn delete_from_set(mut self, path: &str, value: Value) -> Result<Self> {
        let path = parse_update_path(path)?;
        self.actions.push(UpdateAction::DeleteFromSet { path, value });
        Ok(self)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::update_spec(format!("Update must be an object, found {}", json_type_name(value)))
        })?;

        let mut spec = UpdateSpec::new();
        for (operator, operand) in object {
            match operator.as_str() {
                "$set" => {
                    for (path, value) in entries(operator, operand)? {
                        spec = spec.set(path, value.clone())?;
                    }
                }
                "$remove" => {
                    let paths = operand
                        .as_array()
                        .ok_or_else(|| Error::update_spec("$remove expects an array of key paths"))?;
                    for path in paths {
                        let path = path
                            .as_str()
                            .ok_or_else(|| Error::update_spec("$remove expects key path strings"))?;
                        spec = spec.remove(path)?;
                    }
                }
                "$add" => {
                    for (path, value) in entries(operator, operand)? {
                        spec = spec.add(path, value.clone())?;
                    }
                }
                "$append" => {
                    for (path, value) in entries(operator, operand)? {
                        let values = match value {
                            Value::Array(values) => values.clone(),
                            other => vec![other.clone()],
                        };
                        spec = spec.append(path, values)?;
                    }
                }
                "$deleteFromSet" => {
                    for (path, value) in entries(operator, operand)? {
                        spec = spec.delete_from_set(path, value.clone())?;
                    }
                }
                other => return Err(Error::update_spec(format!("Unknown update operator '{}'", other))),
            }
        }
        Ok(spec)
    }

    /// Reject `_id` changes and actions whose paths overlap
    pub fn validate(&self) -> Result<()> {
        for (i, action) in self.actions.iter().enumerate() {
            let path = action.path();
            if matches!(path.segments().first(), Some(PathSegment::Field(f)) if f == ID_FIELD) {
                return Err(Error::update_spec(format!("'{}' cannot be updated", ID_FIELD)).with_path(path.to_string()));
            }
            if let Some(other) = self.actions[..i].iter().find(|o| o.path().overlaps(path)) {
                return Err(Error::update_spec(format!(
                    "Update paths '{}' and '{}' overlap",
                    other.path(),
                    path
                ))
                .with_path(path.to_string()));
            }
        }
        Ok(())
    }
}

fn parse_update_path(raw: &str) -> Result<KeyPath> {
    KeyPath::parse(raw).map_err(|_| Error::update_spec(format!("Invalid update path '{}'", raw)))
}

fn entries<'a>(operator: &str, operand: &'a Value) -> Result<&'a Map<String, Value>> {
    operand
        .as_object()
        .ok_or_else(|| Error::update_spec(format!("{} expects an object of key paths", operator)))
}

/// Typed operand for ADD/DELETE. Arrays become string or number sets.
pub fn set_operand(path: &KeyPath, value: &Value, numbers_allowed: bool) -> Result<AttributeValue> {
    match value {
        Value::Number(n) if numbers_allowed => Ok(AttributeValue::N(n.to_string())),
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => Ok(AttributeValue::Ss(
            items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        )),
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_number) => {
            Ok(AttributeValue::Ns(items.iter().map(|n| n.to_string()).collect()))
        }
        other => Err(Error::update_spec(format!(
            "Cannot use {} as a set operand at '{}'",
            json_type_name(other),
            path
        ))),
    }
}
