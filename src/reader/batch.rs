use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use crate::backend::attribute::Item;
use crate::backend::{
    BatchGetItemRequest, BatchGetItemResponse, TransactGetItem, TransactGetItemsRequest, TransactGetItemsResponse,
};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::Document;
use crate::key::codec::{parse_primary_key, ItemIdentity};
use crate::record::wrapper::unwrap_for;
use crate::schema::layout::TableLayout;
use crate::schema::registry::Registry;
use crate::writer::request::key_for;

/// `{collection, id, parent_id?}` naming one document to read
pub type ReadDescriptor = ItemIdentity;

/// Found documents in request order, plus keys the backend skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReadResult {
    pub items: Vec<Document>,
    pub unprocessed: Vec<ReadDescriptor>,
}

/// Builds one `BatchGetItem` or `TransactGetItems` call and maps the
/// response back onto the request's descriptors
pub struct BatchReader<'a> {
    registry: &'a Registry,
    config: &'a Config,
    requested: Vec<ReadDescriptor>,
    layouts: HashMap<String, &'a TableLayout>,
}

impl<'a> BatchReader<'a> {
    pub fn new(registry: &'a Registry, config: &'a Config) -> Self {
        BatchReader {
            registry,
            config,
            requested: Vec::new(),
            layouts: HashMap::new(),
        }
    }

    /// Keys grouped by table, in descriptor order
    fn keys(&mut self, descriptors: Vec<ReadDescriptor>, limit: usize, operation: &str) -> Result<Vec<(String, Item)>> {
        if descriptors.is_empty() || descriptors.len() > limit {
            return Err(Error::invalid_argument(format!(
                "{} takes 1 to {} descriptors, got {}",
                operation,
                limit,
                descriptors.len()
            )));
        }

        let registry = self.registry;
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            if !seen.insert(descriptor) {
                return Err(Error::invalid_argument(format!(
                    "{} requests '{}' in '{}' more than once",
                    operation, descriptor.id, descriptor.collection
                )));
            }
            let collection = registry.get(&descriptor.collection)?;
            let layout = collection.layout();
            self.layouts.insert(layout.table_name.clone(), layout);
            keys.push((layout.table_name.clone(), key_for(collection, descriptor, &self.config.separator)?));
        }

        self.requested = descriptors;
        Ok(keys)
    }

    pub fn plan(&mut self, descriptors: Vec<ReadDescriptor>) -> Result<BatchGetItemRequest> {
        let keys = self.keys(descriptors, self.config.max_batch_get_items, "Batch read")?;
        let mut request_items: HashMap<String, Vec<Item>> = HashMap::new();
        for (table, key) in keys {
            request_items.entry(table).or_default().push(key);
        }
        debug!(tables = request_items.len(), keys = self.requested.len(), "planned batch read");
        Ok(BatchGetItemRequest {
            request_items,
            consistent_read: self.config.consistent_reads,
        })
    }

    pub fn collect(&self, response: BatchGetItemResponse) -> Result<BatchReadResult> {
        let mut found: HashMap<ItemIdentity, Document> = HashMap::new();
        for (table, items) in response.responses {
            let layout = self.layout(&table)?;
            for item in items {
                let identity = parse_primary_key(layout, &item, &self.config.separator)?;
                let document = unwrap_for(&identity.collection, &item)?;
                found.insert(identity, document);
            }
        }

        let mut unprocessed = Vec::new();
        for (table, keys) in response.unprocessed_keys {
            let layout = self.layout(&table)?;
            for key in keys {
                unprocessed.push(parse_primary_key(layout, &key, &self.config.separator)?);
            }
        }
        if !unprocessed.is_empty() {
            warn!(count = unprocessed.len(), "batch read left keys unprocessed");
        }

        let items = self.requested.iter().filter_map(|d| found.remove(d)).collect();
        Ok(BatchReadResult { items, unprocessed })
    }

    pub fn plan_transact(&mut self, descriptors: Vec<ReadDescriptor>) -> Result<TransactGetItemsRequest> {
        let keys = self.keys(descriptors, self.config.max_transact_items, "Transactional read")?;
        Ok(TransactGetItemsRequest {
            items: keys
                .into_iter()
                .map(|(table_name, key)| TransactGetItem { table_name, key })
                .collect(),
        })
    }

    /// One slot per descriptor; `None` where nothing is stored
    pub fn collect_transact(&self, response: TransactGetItemsResponse) -> Result<Vec<Option<Document>>> {
        if response.items.len() != self.requested.len() {
            return Err(Error::internal(format!(
                "Transactional read returned {} entries for {} keys",
                response.items.len(),
                self.requested.len()
            )));
        }
        self.requested
            .iter()
            .zip(response.items)
            .map(|(descriptor, item)| item.map(|item| unwrap_for(&descriptor.collection, &item)).transpose())
            .collect()
    }

    fn layout(&self, table: &str) -> Result<&'a TableLayout> {
        self.layouts
            .get(table)
            .copied()
            .ok_or_else(|| Error::internal(format!("Response names table '{}' which was not requested", table)))
    }
}
