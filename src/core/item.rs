//! Item business logic - The item store adapter and the add-item flow.
//!
//! Provides functions for creating, retrieving, editing, and querying logged items.
//! Store functions are generic over `ConnectionTrait` so they run equally against a
//! connection or inside a transaction. `add_item` is the user-facing entry point and
//! consults the savings cap guard before writing anything.

use crate::{
    collaborators::Clock,
    core::{money, month_key::MonthKey, savings_cap::SavingsCapGuard},
    entities::{Item, ItemStatus, Tags, item},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// Fields supplied by the user when logging a new item.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    /// Display title
    pub title: String,
    /// Price the user avoided spending
    pub price: Decimal,
    /// Free-form notes
    pub notes: Option<String>,
    /// Link to the product page
    pub product_url: Option<String>,
    /// Tags
    pub tags: Tags,
    /// Reference into the image store
    pub image_ref: Option<String>,
}

impl NewItem {
    /// A new item with only a title and price.
    #[must_use]
    pub fn new(title: impl Into<String>, price: Decimal) -> Self {
        Self {
            title: title.into(),
            price,
            ..Self::default()
        }
    }
}

/// Edits to an existing item. `None` leaves the field unchanged; for optional
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct ItemEdit {
    /// New title
    pub title: Option<String>,
    /// New price
    pub price: Option<Decimal>,
    /// New notes
    pub notes: Option<Option<String>>,
    /// New product link
    pub product_url: Option<Option<String>>,
    /// Replacement tag set
    pub tags: Option<Tags>,
    /// New image reference
    pub image_ref: Option<Option<String>>,
}

fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidTitle);
    }
    Ok(trimmed.to_string())
}

/// Inserts a new `Active` item created at `created_at`. The month key is derived
/// here and never recomputed.
///
/// This is the raw store write; it does not check the savings cap.
pub async fn create_item<C>(
    db: &C,
    new_item: NewItem,
    created_at: DateTime<Utc>,
) -> Result<item::Model>
where
    C: ConnectionTrait,
{
    let title = validate_title(&new_item.title)?;
    let price_cents = money::to_cents(new_item.price)?;

    let item = item::ActiveModel {
        title: Set(title),
        price_cents: Set(price_cents),
        notes: Set(new_item.notes),
        product_url: Set(new_item.product_url),
        tags: Set(new_item.tags),
        image_ref: Set(new_item.image_ref),
        created_at: Set(created_at),
        month_key: Set(MonthKey::from_datetime(&created_at).to_string()),
        status: Set(ItemStatus::Active),
        ..Default::default()
    };

    let result = item.insert(db).await?;
    debug!(item_id = result.id, month = %result.month_key, "Item created");
    Ok(result)
}

/// Logs a new item on behalf of the user.
///
/// The cap check and the insert share one transaction, so two concurrent adds cannot
/// both pass the gate. Fails with [`Error::CapReached`] when a free-tier account would
/// pass the savings cap; nothing is written in that case.
pub async fn add_item<C>(
    db: &C,
    guard: &SavingsCapGuard,
    clock: &dyn Clock,
    new_item: NewItem,
) -> Result<item::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    guard.check_can_add(&txn, new_item.price).await?;
    let created = create_item(&txn, new_item, clock.now()).await?;
    txn.commit().await?;
    info!(
        item_id = created.id,
        price = %created.price(),
        month = %created.month_key,
        "Logged avoided purchase"
    );
    Ok(created)
}

/// Finds an item by its unique ID.
pub async fn get_item<C>(db: &C, item_id: i64) -> Result<Option<item::Model>>
where
    C: ConnectionTrait,
{
    Item::find_by_id(item_id).one(db).await.map_err(Into::into)
}

/// Applies user edits to an item. Identity, creation time, month and status are
/// never touched here.
pub async fn update_item<C>(db: &C, item_id: i64, edit: ItemEdit) -> Result<item::Model>
where
    C: ConnectionTrait,
{
    let existing = get_item(db, item_id)
        .await?
        .ok_or(Error::ItemNotFound { id: item_id })?;

    let mut active_model: item::ActiveModel = existing.into();
    if let Some(title) = edit.title {
        active_model.title = Set(validate_title(&title)?);
    }
    if let Some(price) = edit.price {
        active_model.price_cents = Set(money::to_cents(price)?);
    }
    if let Some(notes) = edit.notes {
        active_model.notes = Set(notes);
    }
    if let Some(product_url) = edit.product_url {
        active_model.product_url = Set(product_url);
    }
    if let Some(tags) = edit.tags {
        active_model.tags = Set(tags);
    }
    if let Some(image_ref) = edit.image_ref {
        active_model.image_ref = Set(image_ref);
    }

    active_model.update(db).await.map_err(Into::into)
}

/// Moves an item to `next`, enforcing the lifecycle rules.
pub async fn set_item_status<C>(
    db: &C,
    current: item::Model,
    next: ItemStatus,
) -> Result<item::Model>
where
    C: ConnectionTrait,
{
    if !current.status.can_transition_to(next) {
        return Err(Error::InvalidTransition {
            id: current.id,
            from: current.status,
            to: next,
        });
    }

    let mut active_model: item::ActiveModel = current.into();
    active_model.status = Set(next);
    active_model.update(db).await.map_err(Into::into)
}

/// Removes an item from the store. Returns `false` if it did not exist.
///
/// This is the raw store delete; user-facing deletes go through the undo buffer.
pub async fn delete_item<C>(db: &C, item_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Item::delete_by_id(item_id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Retrieves the items of one month, optionally narrowed to a single status,
/// oldest first.
pub async fn query_items<C>(
    db: &C,
    month: MonthKey,
    status: Option<ItemStatus>,
) -> Result<Vec<item::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Item::find().filter(item::Column::MonthKey.eq(month.to_string()));
    if let Some(status) = status {
        query = query.filter(item::Column::Status.eq(status));
    }

    query
        .order_by_asc(item::Column::CreatedAt)
        .order_by_asc(item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves every item regardless of month or status, oldest first.
pub async fn query_all_items<C>(db: &C) -> Result<Vec<item::Model>>
where
    C: ConnectionTrait,
{
    Item::find()
        .order_by_asc(item::Column::CreatedAt)
        .order_by_asc(item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Re-fetches items by identity, optionally narrowed to a single status.
/// Ids that no longer exist are silently absent from the result.
pub async fn get_items_by_ids<C>(
    db: &C,
    item_ids: &[i64],
    status: Option<ItemStatus>,
) -> Result<Vec<item::Model>>
where
    C: ConnectionTrait,
{
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = Item::find().filter(item::Column::Id.is_in(item_ids.iter().copied()));
    if let Some(status) = status {
        query = query.filter(item::Column::Status.eq(status));
    }

    query
        .order_by_asc(item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
