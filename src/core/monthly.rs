//! Month ledger business logic
//!
//! Freezes a summary of each closed month. When a new month starts, the previous
//! month's still-`Active` items are totalled into a `MonthSummary` exactly once; that
//! summary is what the reward draw later works from. Items logged into a month after
//! its summary was frozen are never added to it retroactively.

use crate::{
    collaborators::Clock,
    core::{
        item::{get_item, query_items},
        money,
        month_key::MonthKey,
    },
    entities::{ItemIds, ItemStatus, MonthSummary, item, month_summary},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// Finds the summary for a month, if one has been frozen.
pub async fn get_summary<C>(db: &C, month: MonthKey) -> Result<Option<month_summary::Model>>
where
    C: ConnectionTrait,
{
    MonthSummary::find()
        .filter(month_summary::Column::MonthKey.eq(month.to_string()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a summary by its unique ID.
pub async fn get_summary_by_id<C>(db: &C, summary_id: i64) -> Result<Option<month_summary::Model>>
where
    C: ConnectionTrait,
{
    MonthSummary::find_by_id(summary_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all summaries, newest month first.
pub async fn list_summaries<C>(db: &C) -> Result<Vec<month_summary::Model>>
where
    C: ConnectionTrait,
{
    MonthSummary::find()
        .order_by_desc(month_summary::Column::MonthKey)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the summaries whose reward has not been drawn yet, oldest month first.
pub async fn summaries_awaiting_draw<C>(db: &C) -> Result<Vec<month_summary::Model>>
where
    C: ConnectionTrait,
{
    MonthSummary::find()
        .filter(month_summary::Column::WinnerItemId.is_null())
        .order_by_asc(month_summary::Column::MonthKey)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn insert_summary<C>(
    db: &C,
    month: MonthKey,
    items: &[item::Model],
    now: DateTime<Utc>,
) -> Result<month_summary::Model>
where
    C: ConnectionTrait,
{
    let total_saved_cents = money::sum_cents(items.iter().map(|item| item.price_cents))?;
    let item_count = i64::try_from(items.len()).unwrap_or(i64::MAX);

    let summary = month_summary::ActiveModel {
        month_key: Set(month.to_string()),
        total_saved_cents: Set(total_saved_cents),
        item_count: Set(item_count),
        item_ids: Set(ItemIds(items.iter().map(|item| item.id).collect())),
        winner_item_id: Set(None),
        closed_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    };

    summary.insert(db).await.map_err(Into::into)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Maps the outcome of a summary insert, treating a unique violation on the month
/// as "another writer froze it first".
fn inserted_unless_taken(
    result: Result<month_summary::Model>,
) -> Result<Option<month_summary::Model>> {
    match result {
        Ok(summary) => Ok(Some(summary)),
        Err(Error::Database(e)) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Freezes the summary for `month` on demand.
///
/// Unlike [`rollover_if_needed`], this treats both an existing summary and an empty
/// month as errors: [`Error::DuplicateSummary`] and [`Error::EmptyMonth`].
pub async fn create_summary(
    db: &DatabaseConnection,
    month: MonthKey,
    now: DateTime<Utc>,
) -> Result<month_summary::Model> {
    let txn = db.begin().await?;

    if get_summary(&txn, month).await?.is_some() {
        return Err(Error::DuplicateSummary { month });
    }

    let items = query_items(&txn, month, Some(ItemStatus::Active)).await?;
    if items.is_empty() {
        return Err(Error::EmptyMonth { month });
    }

    let summary = inserted_unless_taken(insert_summary(&txn, month, &items, now).await)?
        .ok_or(Error::DuplicateSummary { month })?;
    txn.commit().await?;

    info!(
        %month,
        total = %summary.total_saved(),
        items = summary.item_count,
        "Month summary created"
    );
    Ok(summary)
}

/// Freezes last month's summary if it is due.
///
/// The previous month is `now` minus one calendar month. Nothing happens when that
/// month already has a summary or has no `Active` items left; calling this
/// repeatedly is safe.
///
/// # Returns
/// * `Ok(Some(summary))` - A summary was frozen by this call
/// * `Ok(None)` - Nothing to do
pub async fn rollover_if_needed(
    db: &DatabaseConnection,
    clock: &dyn Clock,
) -> Result<Option<month_summary::Model>> {
    let now = clock.now();
    let previous = MonthKey::from_datetime(&now).previous();

    // All checks and the insert share one transaction so the read is consistent
    // with what gets frozen.
    let txn = db.begin().await?;

    if get_summary(&txn, previous).await?.is_some() {
        debug!(month = %previous, "Summary already exists; rollover skipped");
        return Ok(None);
    }

    let items = query_items(&txn, previous, Some(ItemStatus::Active)).await?;
    if items.is_empty() {
        debug!(month = %previous, "No active items; rollover skipped");
        return Ok(None);
    }

    let Some(summary) = inserted_unless_taken(insert_summary(&txn, previous, &items, now).await)?
    else {
        debug!(month = %previous, "Concurrent rollover froze the month first");
        return Ok(None);
    };
    txn.commit().await?;

    info!(
        month = %previous,
        total = %summary.total_saved(),
        items = summary.item_count,
        "Month rolled over"
    );
    Ok(Some(summary))
}

/// The total shown to the user for a summary.
///
/// When the winner was bought, its price no longer counts as saved:
/// `total_saved - winner.price`, clamped at zero. Nothing is written back.
#[must_use]
pub fn adjusted_total(summary: &month_summary::Model, winner: Option<&item::Model>) -> Decimal {
    let total = summary.total_saved();
    match winner {
        Some(winner)
            if Some(winner.id) == summary.winner_item_id
                && winner.status == ItemStatus::Purchased =>
        {
            (total - winner.price()).max(Decimal::ZERO)
        }
        _ => total,
    }
}

/// Loads the winner (if any) and computes [`adjusted_total`].
pub async fn adjusted_total_saved<C>(db: &C, summary: &month_summary::Model) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let winner = match summary.winner_item_id {
        Some(winner_id) => get_item(db, winner_id).await?,
        None => None,
    };
    Ok(adjusted_total(summary, winner.as_ref()))
}

/// Formats a summary into a human-readable line block for logs or display.
#[must_use]
pub fn format_month_summary(summary: &month_summary::Model, display_total: Decimal) -> String {
    let month_label = summary
        .month()
        .ok()
        .and_then(MonthKey::first_day)
        .map_or_else(
            || summary.month_key.clone(),
            |date| date.format("%B %Y").to_string(),
        );

    let mut text = format!(
        "{month_label} - {} items resisted, ${:.2} saved\n",
        summary.item_count,
        summary.total_saved()
    );

    match (summary.winner_item_id, summary.closed_at) {
        (Some(winner_id), Some(closed_at)) => {
            text.push_str(&format!(
                "  Reward drawn {} (item #{winner_id})\n",
                closed_at.format("%Y-%m-%d")
            ));
        }
        _ => text.push_str("  Reward not drawn yet\n"),
    }

    if display_total != summary.total_saved() {
        text.push_str(&format!(
            "  Adjusted for purchase: ${display_total:.2}\n"
        ));
    }

    text
}
