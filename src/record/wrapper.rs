use crate::backend::attribute::{AttributeValue, Item};
use crate::core::error::{Error, Result};
use crate::core::types::Document;
use crate::key::codec::{compose_extract_key, primary_key_item, primary_key_values, ttl_epoch_seconds, Resolved};
use crate::schema::registry::Collection;

/// Attribute holding the full document
pub const VALUE_ATTRIBUTE: &str = "value";
/// Discriminator attribute holding the owning collection's name
pub const TYPE_ATTRIBUTE: &str = "type";

/// On-storage shape of one document before flattening
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedRecord {
    pub partition_key: String,
    pub sort_key: String,
    pub index_attributes: Vec<(String, String)>,  // Non-sparse derived keys only
    pub ttl: Option<(String, i64)>,
    pub type_name: String,
    pub document: Document,
}

impl WrappedRecord {
    pub fn id(&self) -> Option<&str> {
        self.document.id().ok().flatten()
    }

    pub fn key(&self, collection: &Collection) -> Item {
        primary_key_item(collection.layout(), self.partition_key.clone(), self.sort_key.clone())
    }

    pub fn into_item(self, collection: &Collection) -> Item {
        let mut item = primary_key_item(collection.layout(), self.partition_key, self.sort_key);
        for (attribute, value) in self.index_attributes {
            item.insert(attribute, AttributeValue::S(value));
        }
        if let Some((attribute, seconds)) = self.ttl {
            item.insert(attribute, AttributeValue::number(seconds));
        }
        item.insert(TYPE_ATTRIBUTE.to_string(), AttributeValue::S(self.type_name));
        item.insert(VALUE_ATTRIBUTE.to_string(), AttributeValue::from_json(&self.document.into_value()));
        item
    }
}

/// Parent id of a child document, read from its foreign-key path
pub fn parent_id_of(collection: &Collection, document: &Document) -> Result<Option<String>> {
    let Some(link) = &collection.parent else {
        return Ok(None);
    };
    match document.get(&link.foreign_key) {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
        _ => Err(Error::identity(format!(
            "Collection '{}' requires a non-empty string parent id at '{}'",
            collection.name(),
            link.foreign_key
        ))),
    }
}

/// Build the full record for `document`, generating `_id` when missing
pub fn wrap(collection: &Collection, mut document: Document, separator: &str) -> Result<WrappedRecord> {
    let id = document.ensure_id()?;
    let parent_id = parent_id_of(collection, &document)?;
    let parent_collection = collection.parent.as_ref().map(|l| l.collection_name.as_str());
    let (partition_key, sort_key) =
        primary_key_values(collection.name(), parent_collection, &id, parent_id.as_deref(), separator)?;

    let value = document.as_value();
    let resolve = |path: &crate::schema::key_path::KeyPath| match path.resolve(&value) {
        Some(v) => Resolved::Value(v),
        None => Resolved::Absent,
    };

    let mut index_attributes = Vec::new();
    for pattern in &collection.patterns {
        let partition = compose_extract_key(collection.name(), &pattern.partition, separator, resolve)?;
        let sort = match &pattern.sort {
            Some(key) => match compose_extract_key(collection.name(), key, separator, resolve)? {
                Some(sort) => Some((key.attribute_name.clone(), sort)),
                // Sparse: the pair is left out of the index entirely
                None => continue,
            },
            None => None,
        };
        if let Some(partition) = partition {
            index_attributes.push((pattern.partition.attribute_name.clone(), partition));
        }
        index_attributes.extend(sort);
    }

    let ttl = match &collection.ttl {
        Some(key) => {
            let path = &key.value_paths[0];
            ttl_epoch_seconds(collection.name(), path, path.resolve(&value))?
                .map(|seconds| (key.attribute_name.clone(), seconds))
        }
        None => None,
    };

    Ok(WrappedRecord {
        partition_key,
        sort_key,
        index_attributes,
        ttl,
        type_name: collection.name().to_string(),
        document,
    })
}

pub fn record_type(item: &Item) -> Option<&str> {
    item.get(TYPE_ATTRIBUTE).and_then(AttributeValue::as_s)
}

/// Recover the document stored under the payload attribute
pub fn unwrap(item: &Item) -> Result<Document> {
    match item.get(VALUE_ATTRIBUTE) {
        Some(value @ AttributeValue::M(_)) => Document::from_value(value.to_json()?),
        Some(_) => Err(Error::internal(format!("Attribute '{}' is not a map", VALUE_ATTRIBUTE))),
        None => Err(Error::internal(format!("Record has no '{}' attribute", VALUE_ATTRIBUTE))),
    }
}

/// `unwrap`, additionally checking the discriminator
pub fn unwrap_for(collection: &str, item: &Item) -> Result<Document> {
    match record_type(item) {
        Some(t) if t == collection => unwrap(item),
        other => Err(Error::internal(format!(
            "Expected a '{}' record, found type {:?}",
            collection, other
        ))),
    }
}
