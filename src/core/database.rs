use std::sync::Arc;
use tracing::debug;
use crate::backend::{Backend, GetItemRequest};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Document;
use crate::expression::ast::Condition;
use crate::key::boundary::{adjacency_bounds, collection_range};
use crate::key::codec::{compose_primary_key, ItemIdentity};
use crate::query::ast::{AdjacencyResult, ChildQuery, Cursor, FindOptions, FindQuery, FindResult};
use crate::query::matcher::PatternMatcher;
use crate::query::planner::QueryPlanner;
use crate::reader::batch::{BatchReadResult, BatchReader, ReadDescriptor};
use crate::record::wrapper::{record_type, unwrap, unwrap_for};
use crate::schema::collection::CollectionDefinition;
use crate::schema::registry::{Collection, Registry};
use crate::update::changes::UpdateSpec;
use crate::writer::batch::{BatchWriteResult, BatchWriter, WriteDescriptor};
use crate::writer::request::{delete_request, key_for, put_request, update_request, Existence};
use crate::writer::transact::{plan_transact_write, TransactWriteDescriptor};

/// Caller-facing entry point. Every operation resolves its collection,
/// builds exactly one backend request and unwraps the response.
pub struct Database {
    config: Config,
    registry: Arc<Registry>,      // Read-only after construction
    backend: Arc<dyn Backend>,
}

impl Database {
    pub fn open(definitions: Vec<CollectionDefinition>, backend: Arc<dyn Backend>, config: Config) -> Result<Self> {
        let registry = Arc::new(Registry::new(definitions, &config)?);
        debug!(collections = registry.len(), "opened database");
        Ok(Self::with_registry(registry, backend, config))
    }

    pub fn with_registry(registry: Arc<Registry>, backend: Arc<dyn Backend>, config: Config) -> Self {
        Database {
            config,
            registry,
            backend,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn collection(&self, name: &str) -> Result<&Arc<Collection>> {
        self.registry.get(name)
    }

    fn identity(collection: &str, id: &str, parent_id: Option<&str>) -> ItemIdentity {
        ItemIdentity {
            collection: collection.to_string(),
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
        }
    }

    /// Store a new document; an existing record with the same key is a conflict
    pub async fn insert(&self, collection: &str, document: Document) -> Result<Document> {
        let collection = self.collection(collection)?;
        let (request, identity) = put_request(collection, document, Existence::MustNotExist, None, &self.config)?;
        let stored = unwrap(&request.item)?;

        self.backend.put_item(request).await.map_err(|e| {
            condition_failure(e, ErrorKind::Conflict, || {
                format!("'{}' already exists in '{}'", identity.id, identity.collection)
            })
        })?;
        debug!(collection = %identity.collection, id = %identity.id, "inserted");
        Ok(stored)
    }

    /// Overwrite an existing document, recomputing every derived attribute
    pub async fn replace(&self, collection: &str, document: Document, condition: Option<&Condition>) -> Result<Document> {
        let collection = self.collection(collection)?;
        let (request, identity) = put_request(collection, document, Existence::MustExist, condition, &self.config)?;
        let stored = unwrap(&request.item)?;

        self.backend
            .put_item(request)
            .await
            .map_err(|e| missing_or_conflict(e, &identity, condition.is_some()))?;
        debug!(collection = %identity.collection, id = %identity.id, "replaced");
        Ok(stored)
    }

    pub async fn find_by_id(&self, collection: &str, id: &str, parent_id: Option<&str>) -> Result<Option<Document>> {
        let collection = self.collection(collection)?;
        let key = key_for(collection, &Self::identity(collection.name(), id, parent_id), &self.config.separator)?;
        let response = self
            .backend
            .get_item(GetItemRequest {
                table_name: collection.layout().table_name.clone(),
                key,
                consistent_read: self.config.consistent_reads,
            })
            .await?;
        response.item.map(|item| unwrap_for(collection.name(), &item)).transpose()
    }

    /// Exact-match lookup through the access pattern the query names
    pub async fn find(&self, collection: &str, query: &FindQuery) -> Result<FindResult> {
        let collection = self.collection(collection)?;
        let found = PatternMatcher::new(collection).find(query)?;
        let request = QueryPlanner::new(collection, &self.config.separator, self.config.max_in_values)
            .plan_find(&found, query)?;

        let response = self.backend.query(request).await?;
        Ok(FindResult {
            items: response
                .items
                .iter()
                .map(|item| unwrap_for(collection.name(), item))
                .collect::<Result<_>>()?,
            cursor: response.last_evaluated_key.as_ref().map(Cursor::from_key).transpose()?,
        })
    }

    /// Children of one parent, optionally bounded by child id
    pub async fn find_children(&self, collection: &str, parent_id: &str, query: &ChildQuery) -> Result<FindResult> {
        let collection = self.collection(collection)?;
        let parent = collection.parent.as_ref().ok_or_else(|| {
            Error::routing(format!("Collection '{}' is not a child collection", collection.name()))
        })?;
        if parent_id.is_empty() {
            return Err(Error::identity("Parent id must not be empty"));
        }

        let separator = &self.config.separator;
        let bounds = collection_range(collection.name(), separator, query.range.as_ref())?;
        let partition = compose_primary_key(&parent.collection_name, parent_id, separator);
        let request = QueryPlanner::new(collection, separator, self.config.max_in_values).plan_partition_range(
            partition,
            bounds,
            &query.options,
            self.config.consistent_reads,
        )?;

        let response = self.backend.query(request).await?;
        Ok(FindResult {
            items: response
                .items
                .iter()
                .map(|item| unwrap_for(collection.name(), item))
                .collect::<Result<_>>()?,
            cursor: response.last_evaluated_key.as_ref().map(Cursor::from_key).transpose()?,
        })
    }

    /// A parent and selected child collections in one range query
    pub async fn find_with_children(
        &self,
        collection: &str,
        parent_id: &str,
        children: &[&str],
        options: &FindOptions,
    ) -> Result<AdjacencyResult> {
        let parent = self.collection(collection)?;
        if parent.is_child() {
            return Err(Error::routing(format!("Collection '{}' is not a root collection", parent.name())));
        }
        for child in children {
            let child = self.collection(child)?;
            if child.parent.as_ref().is_none_or(|link| link.collection_name != parent.name()) {
                return Err(Error::routing(format!(
                    "Collection '{}' is not a child of '{}'",
                    child.name(),
                    parent.name()
                )));
            }
        }
        if parent_id.is_empty() {
            return Err(Error::identity("Parent id must not be empty"));
        }

        let separator = &self.config.separator;
        let adjacency = adjacency_bounds(parent.name(), children, separator);
        let partition = compose_primary_key(parent.name(), parent_id, separator);
        let request = QueryPlanner::new(parent, separator, self.config.max_in_values).plan_partition_range(
            partition,
            adjacency.bounds.clone(),
            options,
            self.config.consistent_reads,
        )?;

        let response = self.backend.query(request).await?;
        let mut items = Vec::with_capacity(response.items.len());
        for item in &response.items {
            let Some(kind) = record_type(item) else {
                return Err(Error::internal("Record has no type discriminator"));
            };
            if adjacency.admits(kind) {
                items.push((kind.to_string(), unwrap(item)?));
            }
        }

        Ok(AdjacencyResult {
            items,
            cursor: response.last_evaluated_key.as_ref().map(Cursor::from_key).transpose()?,
        })
    }

    /// Partial update; returns the document as stored afterwards
    pub async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        parent_id: Option<&str>,
        update: &UpdateSpec,
        condition: Option<&Condition>,
    ) -> Result<Document> {
        let collection = self.collection(collection)?;
        let identity = Self::identity(collection.name(), id, parent_id);
        let request = update_request(collection, &identity, update, condition, &self.config)?;

        let response = self
            .backend
            .update_item(request)
            .await
            .map_err(|e| missing_or_conflict(e, &identity, condition.is_some()))?;
        let item = response
            .attributes
            .ok_or_else(|| Error::internal("Update returned no attributes"))?;
        unwrap_for(collection.name(), &item)
    }

    /// Delete a document; returns it as it was before deletion
    pub async fn delete_by_id(
        &self,
        collection: &str,
        id: &str,
        parent_id: Option<&str>,
        condition: Option<&Condition>,
    ) -> Result<Document> {
        let collection = self.collection(collection)?;
        let identity = Self::identity(collection.name(), id, parent_id);
        let request = delete_request(collection, &identity, condition, &self.config)?;

        let response = self
            .backend
            .delete_item(request)
            .await
            .map_err(|e| missing_or_conflict(e, &identity, condition.is_some()))?;
        let item = response
            .attributes
            .ok_or_else(|| Error::internal("Delete returned no attributes"))?;
        unwrap_for(collection.name(), &item)
    }

    pub async fn batch_find_by_ids(&self, descriptors: Vec<ReadDescriptor>) -> Result<BatchReadResult> {
        let mut reader = BatchReader::new(&self.registry, &self.config);
        let request = reader.plan(descriptors)?;
        let response = self.backend.batch_get_item(request).await?;
        reader.collect(response)
    }

    pub async fn batch_write(&self, descriptors: Vec<WriteDescriptor>) -> Result<BatchWriteResult> {
        let mut writer = BatchWriter::new(&self.registry, &self.config);
        let request = writer.plan(descriptors)?;
        let response = self.backend.batch_write_item(request).await?;
        writer.collect(response)
    }

    /// Consistent snapshot of up to `max_transact_items` documents
    pub async fn transact_find_by_ids(&self, descriptors: Vec<ReadDescriptor>) -> Result<Vec<Option<Document>>> {
        let mut reader = BatchReader::new(&self.registry, &self.config);
        let request = reader.plan_transact(descriptors)?;
        let response = self.backend.transact_get_items(request).await?;
        reader.collect_transact(response)
    }

    /// All-or-nothing writes. A failed condition or a cancelled transaction
    /// surfaces as a conflict.
    pub async fn transact_write(&self, descriptors: Vec<TransactWriteDescriptor>) -> Result<Vec<ItemIdentity>> {
        let (request, identities) = plan_transact_write(&self.registry, &self.config, descriptors)?;
        self.backend.transact_write_items(request).await.map_err(|e| {
            condition_failure(e, ErrorKind::Conflict, || "Transaction condition failed".to_string())
        })?;
        Ok(identities)
    }
}

/// Translate the backend's raw condition signal; other errors pass through
fn condition_failure(err: Error, kind: ErrorKind, context: impl FnOnce() -> String) -> Error {
    if err.is(ErrorKind::ConditionFailed) {
        Error::new(kind, context())
    } else {
        err
    }
}

/// Without a caller condition only the existence guard can fail
fn missing_or_conflict(err: Error, identity: &ItemIdentity, has_condition: bool) -> Error {
    if has_condition {
        condition_failure(err, ErrorKind::Conflict, || {
            format!("Condition failed for '{}' in '{}'", identity.id, identity.collection)
        })
    } else {
        condition_failure(err, ErrorKind::NotFound, || {
            format!("'{}' does not exist in '{}'", identity.id, identity.collection)
        })
    }
}
