use tracing::debug;
use crate::backend::{TransactWriteItem, TransactWriteItemsRequest};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::Document;
use crate::expression::ast::Condition;
use crate::key::codec::ItemIdentity;
use crate::schema::registry::Registry;
use crate::update::changes::UpdateSpec;
use crate::writer::request::{delete_request, put_request, update_request, Existence};

/// One conditional write inside an all-or-nothing transaction
#[derive(Debug, Clone)]
pub enum TransactWriteDescriptor {
    Insert {
        collection: String,
        document: Document,
    },
    Replace {
        collection: String,
        document: Document,
        condition: Option<Condition>,
    },
    Update {
        identity: ItemIdentity,
        update: UpdateSpec,
        condition: Option<Condition>,
    },
    Delete {
        identity: ItemIdentity,
        condition: Option<Condition>,
    },
}

/// Builds a `TransactWriteItems` call; returns the identities written, in
/// request order, so generated ids reach the caller.
pub fn plan_transact_write(
    registry: &Registry,
    config: &Config,
    descriptors: Vec<TransactWriteDescriptor>,
) -> Result<(TransactWriteItemsRequest, Vec<ItemIdentity>)> {
    if descriptors.is_empty() || descriptors.len() > config.max_transact_items {
        return Err(Error::invalid_argument(format!(
            "Transactional write takes 1 to {} descriptors, got {}",
            config.max_transact_items,
            descriptors.len()
        )));
    }

    let mut items = Vec::with_capacity(descriptors.len());
    let mut identities = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let (item, identity) = match descriptor {
            TransactWriteDescriptor::Insert { collection, document } => {
                let collection = registry.get(&collection)?;
                let (put, identity) = put_request(collection, document, Existence::MustNotExist, None, config)?;
                (TransactWriteItem::Put(put), identity)
            }
            TransactWriteDescriptor::Replace { collection, document, condition } => {
                let collection = registry.get(&collection)?;
                let (put, identity) =
                    put_request(collection, document, Existence::MustExist, condition.as_ref(), config)?;
                (TransactWriteItem::Put(put), identity)
            }
            TransactWriteDescriptor::Update { identity, update, condition } => {
                let collection = registry.get(&identity.collection)?;
                let request = update_request(collection, &identity, &update, condition.as_ref(), config)?;
                (TransactWriteItem::Update(request), identity)
            }
            TransactWriteDescriptor::Delete { identity, condition } => {
                let collection = registry.get(&identity.collection)?;
                let request = delete_request(collection, &identity, condition.as_ref(), config)?;
                (TransactWriteItem::Delete(request), identity)
            }
        };
        items.push(item);
        identities.push(identity);
    }

    debug!(items = items.len(), "planned transactional write");
    Ok((TransactWriteItemsRequest { items }, identities))
}
