use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::backend::attribute::{AttributeValue, Item};
use crate::core::error::{Error, Result};
use crate::core::types::json_type_name;
use crate::schema::collection::{ExtractKey, KeyRole, Normalizer};
use crate::schema::key_path::KeyPath;
use crate::schema::layout::TableLayout;

/// Identity of a stored item, recoverable from its primary key alone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemIdentity {
    pub collection: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl ItemIdentity {
    pub fn new(collection: &str, id: &str) -> Self {
        ItemIdentity {
            collection: collection.to_string(),
            id: id.to_string(),
            parent_id: None,
        }
    }

    pub fn child(collection: &str, id: &str, parent_id: &str) -> Self {
        ItemIdentity {
            collection: collection.to_string(),
            id: id.to_string(),
            parent_id: Some(parent_id.to_string()),
        }
    }
}

/// What a lookup found at one value path
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Value(&'a Value),
    Absent,
    Unresolved,  // The source cannot say (e.g. a partial update not touching the path)
}

/// True when the first separator in `collection + separator` is the one
/// appended, so parsing a composed key recovers `collection` exactly
pub fn separates_cleanly(collection: &str, separator: &str) -> bool {
    !collection.is_empty()
        && format!("{}{}", collection, separator).find(separator) == Some(collection.len())
}

pub fn compose_primary_key(collection: &str, id: &str, separator: &str) -> String {
    format!("{}{}{}", collection, separator, id)
}

/// Primary partition/sort values. Roots key on themselves; children live in
/// their parent's partition.
pub fn primary_key_values(
    collection: &str,
    parent_collection: Option<&str>,
    id: &str,
    parent_id: Option<&str>,
    separator: &str,
) -> Result<(String, String)> {
    let sort = compose_primary_key(collection, id, separator);
    let partition = match (parent_collection, parent_id) {
        (None, _) => sort.clone(),
        (Some(parent), Some(parent_id)) if !parent_id.is_empty() => {
            compose_primary_key(parent, parent_id, separator)
        }
        (Some(parent), _) => {
            return Err(Error::identity(format!(
                "Collection '{}' requires a parent id from '{}'",
                collection, parent
            )));
        }
    };
    Ok((partition, sort))
}

pub fn primary_key_item(layout: &TableLayout, partition: String, sort: String) -> Item {
    let mut key = Item::with_capacity(2);
    key.insert(layout.primary_key.partition_attribute.clone(), AttributeValue::S(partition));
    key.insert(layout.primary_key.sort_attribute.clone(), AttributeValue::S(sort));
    key
}

/// Compose a derived index value from already-extracted segment values.
///
/// - no value paths: the collection name alone
/// - every value absent: `None` for sort keys (sparse), the collection name
///   for partition keys
/// - otherwise the collection name followed by every value, absent values
///   becoming empty segments
pub fn compose_indexed_value(
    role: KeyRole,
    collection: &str,
    values: &[Option<&str>],
    separator: &str,
) -> Option<String> {
    if values.is_empty() {
        return Some(collection.to_string());
    }

    if values.iter().all(Option::is_none) {
        return match role {
            KeyRole::Sort | KeyRole::Ttl => None,
            KeyRole::Partition => Some(collection.to_string()),
        };
    }

    let mut composed = String::from(collection);
    for value in values {
        composed.push_str(separator);
        composed.push_str(value.unwrap_or(""));
    }
    Some(composed)
}

/// Read a string at `path`, normalizing it when a normalizer is configured.
/// `null` reads as absent; any other non-string is an indexed-field error.
pub fn extract_value(
    collection: &str,
    document: &Value,
    path: &KeyPath,
    normalizer: Option<&Normalizer>,
) -> Result<Option<String>> {
    string_at(collection, path, path.resolve(document), normalizer)
}

fn string_at(
    collection: &str,
    path: &KeyPath,
    value: Option<&Value>,
    normalizer: Option<&Normalizer>,
) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(match normalizer {
            Some(n) => n.apply(s),
            None => s.clone(),
        })),
        Some(other) => Err(Error::indexed_field(format!(
            "Indexed path '{}' in collection '{}' must hold a string, found {}",
            path,
            collection,
            json_type_name(other)
        ))),
    }
}

/// Compose the value of one partition/sort extract key, pulling each
/// constituent through `resolve`. Required paths must resolve to a value.
pub fn compose_extract_key<'a, F>(
    collection: &str,
    key: &ExtractKey,
    separator: &str,
    mut resolve: F,
) -> Result<Option<String>>
where
    F: FnMut(&KeyPath) -> Resolved<'a>,
{
    let mut values = Vec::with_capacity(key.value_paths.len());
    for path in &key.value_paths {
        let value = match resolve(path) {
            Resolved::Value(v) => string_at(collection, path, Some(v), key.options.normalizer.as_ref())?,
            Resolved::Absent | Resolved::Unresolved => None,
        };
        if value.is_none() && key.options.is_required(path) {
            return Err(Error::indexed_field(format!(
                "Path '{}' is required by index attribute '{}' of collection '{}'",
                path, key.attribute_name, collection
            )));
        }
        values.push(value);
    }

    let borrowed: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
    Ok(compose_indexed_value(key.role, collection, &borrowed, separator))
}

/// Convert a TTL source value to epoch seconds: numbers are taken as epoch
/// seconds, strings as RFC 3339 timestamps; null and "" mean no expiry.
pub fn ttl_epoch_seconds(collection: &str, path: &KeyPath, value: Option<&Value>) -> Result<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.timestamp()))
            .map_err(|e| {
                Error::indexed_field(format!(
                    "TTL path '{}' in collection '{}' holds an invalid timestamp '{}': {}",
                    path, collection, s, e
                ))
            }),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64))
            .map(Some)
            .ok_or_else(|| Error::indexed_field(format!("TTL path '{}' holds an invalid number", path))),
        Some(other) => Err(Error::indexed_field(format!(
            "TTL path '{}' in collection '{}' must be a number or timestamp, found {}",
            path,
            collection,
            json_type_name(other)
        ))),
    }
}

fn raw_key<'a>(item: &'a Item, attribute: &str) -> Result<&'a str> {
    match item.get(attribute) {
        Some(AttributeValue::S(s)) => Ok(s),
        Some(_) => Err(Error::internal(format!("Key attribute '{}' is not a string", attribute))),
        None => Err(Error::internal(format!("Key attribute '{}' is missing", attribute))),
    }
}

/// Inverse of `primary_key_values`: recover the identity of an item from its
/// raw primary key without knowing which request produced it.
pub fn parse_primary_key(layout: &TableLayout, key: &Item, separator: &str) -> Result<ItemIdentity> {
    let raw_partition = raw_key(key, &layout.primary_key.partition_attribute)?;
    let raw_sort = raw_key(key, &layout.primary_key.sort_attribute)?;

    let (collection, id) = raw_sort.split_once(separator).ok_or_else(|| {
        Error::internal(format!("Sort key '{}' has no collection prefix", raw_sort))
    })?;
    let (parent_collection, parent_id) = raw_partition.split_once(separator).ok_or_else(|| {
        Error::internal(format!("Partition key '{}' has no collection prefix", raw_partition))
    })?;

    let parent_id = if parent_collection == collection && parent_id == id {
        None
    } else {
        Some(parent_id.to_string())
    };

    Ok(ItemIdentity {
        collection: collection.to_string(),
        id: id.to_string(),
        parent_id,
    })
}
