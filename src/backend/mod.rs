//! Storage backend contract.
//!
//! Every caller-facing operation issues exactly one of these unary calls.
//! Implementations translate a failed condition into
//! `ErrorKind::ConditionFailed` and a cancelled transaction into
//! `ErrorKind::Conflict`; everything else surfaces as `ErrorKind::Backend`.

pub mod attribute;
#[cfg(feature = "aws")]
pub mod dynamodb;

use std::collections::HashMap;
use async_trait::async_trait;
use crate::core::error::Result;
pub use attribute::{AttributeType, AttributeValue, Item};

/// Placeholder maps that accompany expression strings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionAttributes {
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl ExpressionAttributes {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    pub fn names(&self) -> Option<&HashMap<String, String>> {
        (!self.names.is_empty()).then_some(&self.names)
    }

    pub fn values(&self) -> Option<&HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then_some(&self.values)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: Item,
    pub consistent_read: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GetItemResponse {
    pub item: Option<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Item,
    pub condition_expression: Option<String>,
    pub attributes: ExpressionAttributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: Item,
    pub update_expression: String,
    pub condition_expression: Option<String>,
    pub attributes: ExpressionAttributes,
}

/// Returned attributes are the full record after the update
#[derive(Debug, Clone, Default)]
pub struct UpdateItemResponse {
    pub attributes: Option<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: Item,
    pub condition_expression: Option<String>,
    pub attributes: ExpressionAttributes,
}

/// Returned attributes are the full record before deletion
#[derive(Debug, Clone, Default)]
pub struct DeleteItemResponse {
    pub attributes: Option<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub key_condition_expression: String,
    pub filter_expression: Option<String>,
    pub attributes: ExpressionAttributes,
    pub exclusive_start_key: Option<Item>,
    pub limit: Option<u32>,
    pub scan_forward: bool,
    pub consistent_read: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetItemRequest {
    pub request_items: HashMap<String, Vec<Item>>,  // table -> keys
    pub consistent_read: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchGetItemResponse {
    pub responses: HashMap<String, Vec<Item>>,
    pub unprocessed_keys: HashMap<String, Vec<Item>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put { item: Item },
    Delete { key: Item },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteItemRequest {
    pub request_items: HashMap<String, Vec<WriteRequest>>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchWriteItemResponse {
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactGetItem {
    pub table_name: String,
    pub key: Item,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactGetItemsRequest {
    pub items: Vec<TransactGetItem>,
}

/// One entry per requested key, in request order
#[derive(Debug, Clone, Default)]
pub struct TransactGetItemsResponse {
    pub items: Vec<Option<Item>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactWriteItem {
    Put(PutItemRequest),
    Update(UpdateItemRequest),
    Delete(DeleteItemRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactWriteItemsRequest {
    pub items: Vec<TransactWriteItem>,
}

/// Unary request/response interface to the wide-column store
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_item(&self, request: GetItemRequest) -> Result<GetItemResponse>;

    async fn put_item(&self, request: PutItemRequest) -> Result<()>;

    async fn update_item(&self, request: UpdateItemRequest) -> Result<UpdateItemResponse>;

    async fn delete_item(&self, request: DeleteItemRequest) -> Result<DeleteItemResponse>;

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse>;

    async fn batch_get_item(&self, request: BatchGetItemRequest) -> Result<BatchGetItemResponse>;

    async fn batch_write_item(&self, request: BatchWriteItemRequest) -> Result<BatchWriteItemResponse>;

    async fn transact_get_items(&self, request: TransactGetItemsRequest) -> Result<TransactGetItemsResponse>;

    async fn transact_write_items(&self, request: TransactWriteItemsRequest) -> Result<()>;
}
