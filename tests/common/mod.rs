#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use Dynadex::backend::*;
use Dynadex::record::wrapper::wrap;
use Dynadex::{
    AccessPattern, CollectionDefinition, Config, Database, Document, Error, Normalizer, Registry, Result,
    TableLayout,
};

/// Every request the database issued, in order
#[derive(Debug, Clone)]
pub enum Call {
    Get(GetItemRequest),
    Put(PutItemRequest),
    Update(UpdateItemRequest),
    Delete(DeleteItemRequest),
    Query(QueryRequest),
    BatchGet(BatchGetItemRequest),
    BatchWrite(BatchWriteItemRequest),
    TransactGet(TransactGetItemsRequest),
    TransactWrite(TransactWriteItemsRequest),
}

/// Canned response for the next call; calls with nothing queued get an
/// empty success
pub enum Reply {
    Get(GetItemResponse),
    Update(UpdateItemResponse),
    Delete(DeleteItemResponse),
    Query(QueryResponse),
    BatchGet(BatchGetItemResponse),
    BatchWrite(BatchWriteItemResponse),
    TransactGet(TransactGetItemsResponse),
    Fail(Error),
}

#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Call {
        self.calls.lock().last().cloned().expect("no backend call recorded")
    }

    fn record(&self, call: Call) -> Option<Reply> {
        self.calls.lock().push(call);
        self.replies.lock().pop_front()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn get_item(&self, request: GetItemRequest) -> Result<GetItemResponse> {
        match self.record(Call::Get(request)) {
            None => Ok(GetItemResponse::default()),
            Some(Reply::Get(response)) => Ok(response),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for get_item"),
        }
    }

    async fn put_item(&self, request: PutItemRequest) -> Result<()> {
        match self.record(Call::Put(request)) {
            None => Ok(()),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for put_item"),
        }
    }

    async fn update_item(&self, request: UpdateItemRequest) -> Result<UpdateItemResponse> {
        match self.record(Call::Update(request)) {
            None => Ok(UpdateItemResponse::default()),
            Some(Reply::Update(response)) => Ok(response),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for update_item"),
        }
    }

    async fn delete_item(&self, request: DeleteItemRequest) -> Result<DeleteItemResponse> {
        match self.record(Call::Delete(request)) {
            None => Ok(DeleteItemResponse::default()),
            Some(Reply::Delete(response)) => Ok(response),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for delete_item"),
        }
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        match self.record(Call::Query(request)) {
            None => Ok(QueryResponse::default()),
            Some(Reply::Query(response)) => Ok(response),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for query"),
        }
    }

    async fn batch_get_item(&self, request: BatchGetItemRequest) -> Result<BatchGetItemResponse> {
        match self.record(Call::BatchGet(request)) {
            None => Ok(BatchGetItemResponse::default()),
            Some(Reply::BatchGet(response)) => Ok(response),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for batch_get_item"),
        }
    }

    async fn batch_write_item(&self, request: BatchWriteItemRequest) -> Result<BatchWriteItemResponse> {
        match self.record(Call::BatchWrite(request)) {
            None => Ok(BatchWriteItemResponse::default()),
            Some(Reply::BatchWrite(response)) => Ok(response),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for batch_write_item"),
        }
    }

    async fn transact_get_items(&self, request: TransactGetItemsRequest) -> Result<TransactGetItemsResponse> {
        match self.record(Call::TransactGet(request)) {
            None => Ok(TransactGetItemsResponse::default()),
            Some(Reply::TransactGet(response)) => Ok(response),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for transact_get_items"),
        }
    }

    async fn transact_write_items(&self, request: TransactWriteItemsRequest) -> Result<()> {
        match self.record(Call::TransactWrite(request)) {
            None => Ok(()),
            Some(Reply::Fail(err)) => Err(err),
            Some(_) => panic!("unexpected reply for transact_write_items"),
        }
    }
}

/// One table, two indexes: users keyed by team/role/name and email, posts
/// as children of users, comments as a second child collection
pub fn definitions() -> Vec<CollectionDefinition> {
    let layout = TableLayout::new("main", "pk", "sk")
        .with_index("gsi1", "gsi1pk", Some("gsi1sk"))
        .with_index("gsi2", "gsi2pk", Some("gsi2sk"))
        .with_ttl_attribute("ttl");
    vec![
        CollectionDefinition::root("user", layout.clone())
            .with_access_pattern(AccessPattern::new("gsi1", &["team"]).with_sort_key_paths(&["role", "name"]))
            .with_access_pattern(AccessPattern::new("gsi2", &["email"]).with_normalizer(Normalizer::lowercase()))
            .with_ttl_key_path("expiresAt"),
        CollectionDefinition::child("post", layout.clone(), "user", "userId"),
        CollectionDefinition::child("comment", layout, "user", "userId"),
    ]
}

pub fn database() -> (Database, Arc<ScriptedBackend>) {
    database_with(Config::default())
}

pub fn database_with(config: Config) -> (Database, Arc<ScriptedBackend>) {
    let backend = ScriptedBackend::new();
    let database = Database::open(definitions(), backend.clone(), config).expect("valid schema");
    (database, backend)
}

pub fn doc(value: Value) -> Document {
    Document::from_value(value).expect("object literal")
}

/// The item the backend would hold for `value`
pub fn stored(registry: &Registry, collection: &str, value: Value) -> Item {
    let collection = registry.get(collection).expect("registered collection");
    wrap(collection, doc(value), "|-|")
        .expect("wrappable document")
        .into_item(collection)
}
