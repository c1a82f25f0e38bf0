use tracing::trace;
use crate::backend::attribute::Item;
use crate::backend::{DeleteItemRequest, PutItemRequest, UpdateItemRequest};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::Document;
use crate::expression::ast::Condition;
use crate::expression::compiler::compile_condition;
use crate::expression::mapper::ExpressionContext;
use crate::key::codec::{primary_key_item, primary_key_values, ItemIdentity};
use crate::record::wrapper::{parent_id_of, wrap};
use crate::schema::registry::Collection;
use crate::update::changes::UpdateSpec;
use crate::update::engine::derive_index_changes;
use crate::update::expression::build_update_expression;

/// Whether the written record must already exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    MustNotExist,
    MustExist,
}

/// Primary key of `identity` in its collection's table
pub fn key_for(collection: &Collection, identity: &ItemIdentity, separator: &str) -> Result<Item> {
    if identity.id.is_empty() {
        return Err(Error::identity(format!("Empty id for collection '{}'", collection.name())));
    }
    let parent_collection = match (&collection.parent, &identity.parent_id) {
        (Some(link), _) => Some(link.collection_name.as_str()),
        (None, None) => None,
        (None, Some(_)) => {
            return Err(Error::identity(format!(
                "Collection '{}' is not a child collection and takes no parent id",
                collection.name()
            )));
        }
    };
    let (partition, sort) = primary_key_values(
        collection.name(),
        parent_collection,
        &identity.id,
        identity.parent_id.as_deref(),
        separator,
    )?;
    Ok(primary_key_item(collection.layout(), partition, sort))
}

/// `attribute_[not_]exists(pk)`, AND-joined with the caller's condition
fn existence_condition(
    collection: &Collection,
    existence: Existence,
    condition: Option<&Condition>,
    context: &mut ExpressionContext,
    config: &Config,
) -> Result<String> {
    let partition = context.names.map(&collection.layout().primary_key.partition_attribute);
    let guard = match existence {
        Existence::MustNotExist => format!("attribute_not_exists({})", partition),
        Existence::MustExist => format!("attribute_exists({})", partition),
    };
    match condition {
        Some(condition) => {
            let compiled = compile_condition(condition, context, config.max_in_values)?;
            Ok(format!("({}) AND ({})", guard, compiled))
        }
        None => Ok(guard),
    }
}

/// Put of a fully wrapped document. Inserts generate `_id` when missing;
/// replacements require it.
pub fn put_request(
    collection: &Collection,
    document: Document,
    existence: Existence,
    condition: Option<&Condition>,
    config: &Config,
) -> Result<(PutItemRequest, ItemIdentity)> {
    if existence == Existence::MustExist && document.id()?.is_none() {
        return Err(Error::identity(format!(
            "Replacing a document in '{}' requires its _id",
            collection.name()
        )));
    }

    let parent_id = parent_id_of(collection, &document)?;
    let record = wrap(collection, document, &config.separator)?;
    let identity = ItemIdentity {
        collection: collection.name().to_string(),
        id: record.id().unwrap_or_default().to_string(),
        parent_id,
    };

    let mut context = ExpressionContext::new();
    let condition_expression = existence_condition(collection, existence, condition, &mut context, config)?;
    trace!(collection = %collection.name(), id = %identity.id, condition = %condition_expression, "built put");

    Ok((
        PutItemRequest {
            table_name: collection.layout().table_name.clone(),
            item: record.into_item(collection),
            condition_expression: Some(condition_expression),
            attributes: context.into_attributes(),
        },
        identity,
    ))
}

/// Partial update keeping every derived attribute consistent. Condition,
/// update and guard placeholders share one context.
pub fn update_request(
    collection: &Collection,
    identity: &ItemIdentity,
    update: &UpdateSpec,
    condition: Option<&Condition>,
    config: &Config,
) -> Result<UpdateItemRequest> {
    update.validate()?;
    let key = key_for(collection, identity, &config.separator)?;
    let derived = derive_index_changes(collection, update, &config.separator)?;

    let mut context = ExpressionContext::new();
    let update_expression = build_update_expression(update, &derived, &mut context)?;
    let condition_expression = existence_condition(collection, Existence::MustExist, condition, &mut context, config)?;
    trace!(
        collection = %collection.name(),
        id = %identity.id,
        update = %update_expression,
        condition = %condition_expression,
        "built update"
    );

    Ok(UpdateItemRequest {
        table_name: collection.layout().table_name.clone(),
        key,
        update_expression,
        condition_expression: Some(condition_expression),
        attributes: context.into_attributes(),
    })
}

pub fn delete_request(
    collection: &Collection,
    identity: &ItemIdentity,
    condition: Option<&Condition>,
    config: &Config,
) -> Result<DeleteItemRequest> {
    let key = key_for(collection, identity, &config.separator)?;
    let mut context = ExpressionContext::new();
    let condition_expression = existence_condition(collection, Existence::MustExist, condition, &mut context, config)?;

    Ok(DeleteItemRequest {
        table_name: collection.layout().table_name.clone(),
        key,
        condition_expression: Some(condition_expression),
        attributes: context.into_attributes(),
    })
}
