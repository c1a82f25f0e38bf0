use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::backend::{BatchWriteItemRequest, BatchWriteItemResponse, WriteRequest};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::Document;
use crate::key::codec::{parse_primary_key, ItemIdentity};
use crate::record::wrapper::{record_type, unwrap, wrap};
use crate::schema::layout::TableLayout;
use crate::schema::registry::Registry;
use crate::writer::request::key_for;

/// One unconditional write inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteDescriptor {
    Replace {
        collection: String,
        document: Document,
    },
    Delete {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
    },
}

impl WriteDescriptor {
    pub fn collection(&self) -> &str {
        match self {
            WriteDescriptor::Replace { collection, .. } | WriteDescriptor::Delete { collection, .. } => collection,
        }
    }
}

impl From<ItemIdentity> for WriteDescriptor {
    fn from(identity: ItemIdentity) -> Self {
        WriteDescriptor::Delete {
            collection: identity.collection,
            id: identity.id,
            parent_id: identity.parent_id,
        }
    }
}

/// Writes the backend did not apply; resubmit them as they are
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteResult {
    pub unprocessed: Vec<WriteDescriptor>,
}

/// Builds one `BatchWriteItem` call and maps its leftovers back to descriptors
pub struct BatchWriter<'a> {
    registry: &'a Registry,
    config: &'a Config,
    layouts: HashMap<String, &'a TableLayout>,  // table -> layout, for leftovers
}

impl<'a> BatchWriter<'a> {
    pub fn new(registry: &'a Registry, config: &'a Config) -> Self {
        BatchWriter {
            registry,
            config,
            layouts: HashMap::new(),
        }
    }

    pub fn plan(&mut self, descriptors: Vec<WriteDescriptor>) -> Result<BatchWriteItemRequest> {
        if descriptors.is_empty() || descriptors.len() > self.config.max_batch_write_items {
            return Err(Error::invalid_argument(format!(
                "Batch write takes 1 to {} descriptors, got {}",
                self.config.max_batch_write_items,
                descriptors.len()
            )));
        }

        let registry = self.registry;
        let mut request_items: HashMap<String, Vec<WriteRequest>> = HashMap::new();
        for descriptor in descriptors {
            let collection = registry.get(descriptor.collection())?;
            let layout = collection.layout();
            self.layouts.insert(layout.table_name.clone(), layout);

            let write = match descriptor {
                WriteDescriptor::Replace { document, .. } => WriteRequest::Put {
                    item: wrap(collection, document, &self.config.separator)?.into_item(collection),
                },
                WriteDescriptor::Delete { id, parent_id, .. } => WriteRequest::Delete {
                    key: key_for(
                        collection,
                        &ItemIdentity {
                            collection: collection.name().to_string(),
                            id,
                            parent_id,
                        },
                        &self.config.separator,
                    )?,
                },
            };
            request_items.entry(layout.table_name.clone()).or_default().push(write);
        }

        debug!(tables = request_items.len(), "planned batch write");
        Ok(BatchWriteItemRequest { request_items })
    }

    pub fn collect(&self, response: BatchWriteItemResponse) -> Result<BatchWriteResult> {
        let mut unprocessed = Vec::new();
        for (table, writes) in response.unprocessed_items {
            let layout = self.layouts.get(&table).ok_or_else(|| {
                Error::internal(format!("Unprocessed writes for table '{}' which was not requested", table))
            })?;
            for write in writes {
                unprocessed.push(match write {
                    WriteRequest::Put { item } => {
                        let collection = record_type(&item)
                            .ok_or_else(|| Error::internal("Unprocessed put has no type discriminator"))?
                            .to_string();
                        WriteDescriptor::Replace {
                            collection,
                            document: unwrap(&item)?,
                        }
                    }
                    WriteRequest::Delete { key } => {
                        parse_primary_key(layout, &key, &self.config.separator)?.into()
                    }
                });
            }
        }

        if !unprocessed.is_empty() {
            warn!(count = unprocessed.len(), "batch write left items unprocessed");
        }
        Ok(BatchWriteResult { unprocessed })
    }
}
