//! Amazon DynamoDB adapter.
//!
//! Translates the backend contract onto `aws-sdk-dynamodb` calls one to
//! one. Retries, throttling and credentials stay with the SDK client the
//! caller configures.

use std::collections::HashMap;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{self as sdk, ReturnValue};
use aws_sdk_dynamodb::Client;
use bytes::Bytes;
use tracing::debug;
use crate::backend::{
    AttributeValue, Backend, BatchGetItemRequest, BatchGetItemResponse, BatchWriteItemRequest,
    BatchWriteItemResponse, DeleteItemRequest, DeleteItemResponse, ExpressionAttributes, GetItemRequest,
    GetItemResponse, Item, PutItemRequest, QueryRequest, QueryResponse, TransactGetItemsRequest,
    TransactGetItemsResponse, TransactWriteItem, TransactWriteItemsRequest, UpdateItemRequest,
    UpdateItemResponse, WriteRequest,
};
use crate::core::error::{Error, ErrorKind, Result};

type SdkItem = HashMap<String, sdk::AttributeValue>;

#[derive(Clone)]
pub struct DynamoDbBackend {
    client: Client,
}

impl std::fmt::Debug for DynamoDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbBackend").finish_non_exhaustive()
    }
}

impl DynamoDbBackend {
    pub fn from_client(client: Client) -> Self {
        DynamoDbBackend { client }
    }

    pub fn from_conf(config: aws_sdk_dynamodb::Config) -> Self {
        DynamoDbBackend {
            client: Client::from_conf(config),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn to_sdk(value: AttributeValue) -> sdk::AttributeValue {
    match value {
        AttributeValue::S(s) => sdk::AttributeValue::S(s),
        AttributeValue::N(n) => sdk::AttributeValue::N(n),
        AttributeValue::B(b) => sdk::AttributeValue::B(Blob::new(b.to_vec())),
        AttributeValue::Bool(b) => sdk::AttributeValue::Bool(b),
        AttributeValue::Null => sdk::AttributeValue::Null(true),
        AttributeValue::L(items) => sdk::AttributeValue::L(items.into_iter().map(to_sdk).collect()),
        AttributeValue::M(map) => sdk::AttributeValue::M(to_sdk_item(map)),
        AttributeValue::Ss(items) => sdk::AttributeValue::Ss(items),
        AttributeValue::Ns(items) => sdk::AttributeValue::Ns(items),
        AttributeValue::Bs(items) => {
            sdk::AttributeValue::Bs(items.into_iter().map(|b| Blob::new(b.to_vec())).collect())
        }
    }
}

fn from_sdk(value: sdk::AttributeValue) -> Result<AttributeValue> {
    Ok(match value {
        sdk::AttributeValue::S(s) => AttributeValue::S(s),
        sdk::AttributeValue::N(n) => AttributeValue::N(n),
        sdk::AttributeValue::B(b) => AttributeValue::B(Bytes::from(b.into_inner())),
        sdk::AttributeValue::Bool(b) => AttributeValue::Bool(b),
        sdk::AttributeValue::Null(_) => AttributeValue::Null,
        sdk::AttributeValue::L(items) => {
            AttributeValue::L(items.into_iter().map(from_sdk).collect::<Result<_>>()?)
        }
        sdk::AttributeValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        sdk::AttributeValue::Ss(items) => AttributeValue::Ss(items),
        sdk::AttributeValue::Ns(items) => AttributeValue::Ns(items),
        sdk::AttributeValue::Bs(items) => {
            AttributeValue::Bs(items.into_iter().map(|b| Bytes::from(b.into_inner())).collect())
        }
        other => return Err(Error::backend(format!("Unsupported attribute value {:?}", other))),
    })
}

fn to_sdk_item(item: Item) -> SdkItem {
    item.into_iter().map(|(k, v)| (k, to_sdk(v))).collect()
}

fn from_sdk_item(item: SdkItem) -> Result<Item> {
    item.into_iter().map(|(k, v)| Ok((k, from_sdk(v)?))).collect()
}

fn from_sdk_items(items: Vec<SdkItem>) -> Result<Vec<Item>> {
    items.into_iter().map(from_sdk_item).collect()
}

/// Empty placeholder maps must be omitted, not sent empty
fn split_attributes(
    attributes: ExpressionAttributes,
) -> (Option<HashMap<String, String>>, Option<SdkItem>) {
    let names = (!attributes.names.is_empty()).then_some(attributes.names);
    let values = (!attributes.values.is_empty()).then(|| to_sdk_item(attributes.values));
    (names, values)
}

fn sdk_failure<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    Error::backend(format!("DynamoDB {} failed: {}", operation, DisplayErrorContext(err)))
}

fn build_failure(err: aws_sdk_dynamodb::error::BuildError) -> Error {
    Error::backend(format!("Invalid DynamoDB request: {}", err))
}

fn condition_failed(operation: &str) -> Error {
    Error::new(ErrorKind::ConditionFailed, format!("DynamoDB {} condition check failed", operation))
}

fn put_for_transaction(request: PutItemRequest) -> Result<sdk::Put> {
    let (names, values) = split_attributes(request.attributes);
    sdk::Put::builder()
        .table_name(request.table_name)
        .set_item(Some(to_sdk_item(request.item)))
        .set_condition_expression(request.condition_expression)
        .set_expression_attribute_names(names)
        .set_expression_attribute_values(values)
        .build()
        .map_err(build_failure)
}

fn update_for_transaction(request: UpdateItemRequest) -> Result<sdk::Update> {
    let (names, values) = split_attributes(request.attributes);
    sdk::Update::builder()
        .table_name(request.table_name)
        .set_key(Some(to_sdk_item(request.key)))
        .update_expression(request.update_expression)
        .set_condition_expression(request.condition_expression)
        .set_expression_attribute_names(names)
        .set_expression_attribute_values(values)
        .build()
        .map_err(build_failure)
}

fn delete_for_transaction(request: DeleteItemRequest) -> Result<sdk::Delete> {
    let (names, values) = split_attributes(request.attributes);
    sdk::Delete::builder()
        .table_name(request.table_name)
        .set_key(Some(to_sdk_item(request.key)))
        .set_condition_expression(request.condition_expression)
        .set_expression_attribute_names(names)
        .set_expression_attribute_values(values)
        .build()
        .map_err(build_failure)
}

fn to_sdk_write(write: WriteRequest) -> Result<sdk::WriteRequest> {
    Ok(match write {
        WriteRequest::Put { item } => sdk::WriteRequest::builder()
            .put_request(
                sdk::PutRequest::builder()
                    .set_item(Some(to_sdk_item(item)))
                    .build()
                    .map_err(build_failure)?,
            )
            .build(),
        WriteRequest::Delete { key } => sdk::WriteRequest::builder()
            .delete_request(
                sdk::DeleteRequest::builder()
                    .set_key(Some(to_sdk_item(key)))
                    .build()
                    .map_err(build_failure)?,
            )
            .build(),
    })
}

fn from_sdk_write(write: sdk::WriteRequest) -> Result<WriteRequest> {
    if let Some(put) = write.put_request {
        return Ok(WriteRequest::Put {
            item: from_sdk_item(put.item)?,
        });
    }
    if let Some(delete) = write.delete_request {
        return Ok(WriteRequest::Delete {
            key: from_sdk_item(delete.key)?,
        });
    }
    Err(Error::backend("Unprocessed write has neither put nor delete"))
}

#[async_trait]
impl Backend for DynamoDbBackend {
    async fn get_item(&self, request: GetItemRequest) -> Result<GetItemResponse> {
        let output = self
            .client
            .get_item()
            .table_name(request.table_name)
            .set_key(Some(to_sdk_item(request.key)))
            .consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(|e| sdk_failure("GetItem", e))?;

        Ok(GetItemResponse {
            item: output.item.map(from_sdk_item).transpose()?,
        })
    }

    async fn put_item(&self, request: PutItemRequest) -> Result<()> {
        let (names, values) = split_attributes(request.attributes);
        self.client
            .put_item()
            .table_name(request.table_name)
            .set_item(Some(to_sdk_item(request.item)))
            .set_condition_expression(request.condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(|e| {
                if matches!(e.as_service_error(), Some(PutItemError::ConditionalCheckFailedException(_))) {
                    condition_failed("PutItem")
                } else {
                    sdk_failure("PutItem", e)
                }
            })?;
        Ok(())
    }

    async fn update_item(&self, request: UpdateItemRequest) -> Result<UpdateItemResponse> {
        let (names, values) = split_attributes(request.attributes);
        let output = self
            .client
            .update_item()
            .table_name(request.table_name)
            .set_key(Some(to_sdk_item(request.key)))
            .update_expression(request.update_expression)
            .set_condition_expression(request.condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| {
                if matches!(e.as_service_error(), Some(UpdateItemError::ConditionalCheckFailedException(_))) {
                    condition_failed("UpdateItem")
                } else {
                    sdk_failure("UpdateItem", e)
                }
            })?;

        Ok(UpdateItemResponse {
            attributes: output.attributes.map(from_sdk_item).transpose()?,
        })
    }

    async fn delete_item(&self, request: DeleteItemRequest) -> Result<DeleteItemResponse> {
        let (names, values) = split_attributes(request.attributes);
        let output = self
            .client
            .delete_item()
            .table_name(request.table_name)
            .set_key(Some(to_sdk_item(request.key)))
            .set_condition_expression(request.condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| {
                if matches!(e.as_service_error(), Some(DeleteItemError::ConditionalCheckFailedException(_))) {
                    condition_failed("DeleteItem")
                } else {
                    sdk_failure("DeleteItem", e)
                }
            })?;

        Ok(DeleteItemResponse {
            attributes: output.attributes.map(from_sdk_item).transpose()?,
        })
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let (names, values) = split_attributes(request.attributes);
        let limit = request
            .limit
            .map(i32::try_from)
            .transpose()
            .map_err(|_| Error::invalid_argument("Query limit out of range"))?;

        let output = self
            .client
            .query()
            .table_name(request.table_name)
            .set_index_name(request.index_name)
            .key_condition_expression(request.key_condition_expression)
            .set_filter_expression(request.filter_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .set_exclusive_start_key(request.exclusive_start_key.map(to_sdk_item))
            .set_limit(limit)
            .scan_index_forward(request.scan_forward)
            .consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(|e| sdk_failure("Query", e))?;

        Ok(QueryResponse {
            items: from_sdk_items(output.items.unwrap_or_default())?,
            last_evaluated_key: output
                .last_evaluated_key
                .filter(|key| !key.is_empty())
                .map(from_sdk_item)
                .transpose()?,
        })
    }

    async fn batch_get_item(&self, request: BatchGetItemRequest) -> Result<BatchGetItemResponse> {
        let mut request_items = HashMap::with_capacity(request.request_items.len());
        for (table, keys) in request.request_items {
            let keys_and_attributes = sdk::KeysAndAttributes::builder()
                .set_keys(Some(keys.into_iter().map(to_sdk_item).collect()))
                .consistent_read(request.consistent_read)
                .build()
                .map_err(build_failure)?;
            request_items.insert(table, keys_and_attributes);
        }

        let output = self
            .client
            .batch_get_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(|e| sdk_failure("BatchGetItem", e))?;

        let mut responses = HashMap::new();
        for (table, items) in output.responses.unwrap_or_default() {
            responses.insert(table, from_sdk_items(items)?);
        }
        let mut unprocessed_keys = HashMap::new();
        for (table, keys) in output.unprocessed_keys.unwrap_or_default() {
            unprocessed_keys.insert(table, from_sdk_items(keys.keys)?);
        }
        Ok(BatchGetItemResponse { responses, unprocessed_keys })
    }

    async fn batch_write_item(&self, request: BatchWriteItemRequest) -> Result<BatchWriteItemResponse> {
        let mut request_items = HashMap::with_capacity(request.request_items.len());
        for (table, writes) in request.request_items {
            request_items.insert(table, writes.into_iter().map(to_sdk_write).collect::<Result<Vec<_>>>()?);
        }

        let output = self
            .client
            .batch_write_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(|e| sdk_failure("BatchWriteItem", e))?;

        let mut unprocessed_items = HashMap::new();
        for (table, writes) in output.unprocessed_items.unwrap_or_default() {
            if writes.is_empty() {
                continue;
            }
            unprocessed_items.insert(table, writes.into_iter().map(from_sdk_write).collect::<Result<Vec<_>>>()?);
        }
        Ok(BatchWriteItemResponse { unprocessed_items })
    }

    async fn transact_get_items(&self, request: TransactGetItemsRequest) -> Result<TransactGetItemsResponse> {
        let mut items = Vec::with_capacity(request.items.len());
        for item in request.items {
            let get = sdk::Get::builder()
                .table_name(item.table_name)
                .set_key(Some(to_sdk_item(item.key)))
                .build()
                .map_err(build_failure)?;
            items.push(sdk::TransactGetItem::builder().get(get).build());
        }

        let output = self
            .client
            .transact_get_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| sdk_failure("TransactGetItems", e))?;

        Ok(TransactGetItemsResponse {
            items: output
                .responses
                .unwrap_or_default()
                .into_iter()
                .map(|response| response.item.map(from_sdk_item).transpose())
                .collect::<Result<_>>()?,
        })
    }

    async fn transact_write_items(&self, request: TransactWriteItemsRequest) -> Result<()> {
        let mut items = Vec::with_capacity(request.items.len());
        for item in request.items {
            let builder = sdk::TransactWriteItem::builder();
            items.push(match item {
                TransactWriteItem::Put(put) => builder.put(put_for_transaction(put)?),
                TransactWriteItem::Update(update) => builder.update(update_for_transaction(update)?),
                TransactWriteItem::Delete(delete) => builder.delete(delete_for_transaction(delete)?),
            }
            .build());
        }

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| {
                let reasons = match e.as_service_error() {
                    Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) => Some(
                        cancelled
                            .cancellation_reasons()
                            .iter()
                            .filter_map(|reason| reason.code().map(str::to_string))
                            .collect::<Vec<_>>(),
                    ),
                    _ => None,
                };
                match reasons {
                    Some(reasons) => {
                        debug!(?reasons, "transaction cancelled");
                        Error::new(
                            ErrorKind::Conflict,
                            format!("DynamoDB transaction cancelled: [{}]", reasons.join(", ")),
                        )
                    }
                    None => sdk_failure("TransactWriteItems", e),
                }
            })?;
        Ok(())
    }
}
