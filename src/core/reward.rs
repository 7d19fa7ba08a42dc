//! Reward draw business logic
//!
//! Once a month has a frozen summary, one of its still-`Active` items is drawn at
//! random as the reward the user may buy. The draw happens exactly once per summary:
//! the winner becomes `Won`, every other counted item becomes `Skipped`, and the
//! summary records the winner, all in a single database transaction. Afterwards the
//! user confirms whether they actually bought the winner.

use crate::{
    collaborators::Clock,
    core::{
        item::{get_item, get_items_by_ids, set_item_status},
        monthly::get_summary_by_id,
    },
    entities::{ItemStatus, MonthSummary, item, month_summary},
    errors::{Error, Result},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// What a successful draw changed.
#[derive(Debug, Clone)]
pub struct DrawOutcome {
    /// The summary with `winner_item_id` and `closed_at` filled in
    pub summary: month_summary::Model,
    /// The item now in `Won`
    pub winner: item::Model,
    /// The items now in `Skipped`
    pub skipped: Vec<item::Model>,
}

/// Whether the summary's reward is still to be drawn.
#[must_use]
pub const fn can_draw(summary: &month_summary::Model) -> bool {
    summary.winner_item_id.is_none()
}

/// Picks an index in `0..candidate_count` with equal probability.
fn pick_winner_index<R: Rng>(candidate_count: usize, rng: &mut R) -> usize {
    rng.gen_range(0..candidate_count)
}

/// Draws the reward for a summary using an entropy-seeded generator.
pub async fn draw_winner(
    db: &DatabaseConnection,
    summary_id: i64,
    clock: &dyn Clock,
) -> Result<DrawOutcome> {
    let mut rng = StdRng::from_entropy();
    draw_winner_with_rng(db, summary_id, clock, &mut rng).await
}

/// Draws the reward for a summary using the supplied generator.
///
/// Candidates are the items the summary counted when it was frozen, re-fetched by id,
/// that are still `Active`. Items logged into the month later are never candidates.
///
/// # Errors
/// * [`Error::AlreadyDrawn`] - the summary already has a winner, including when a
///   concurrent draw committed first
/// * [`Error::NoCandidates`] - none of the counted items is still `Active`; the summary
///   is left undrawn
/// * [`Error::SummaryNotFound`] - no summary with `summary_id`
pub async fn draw_winner_with_rng<R: Rng>(
    db: &DatabaseConnection,
    summary_id: i64,
    clock: &dyn Clock,
    rng: &mut R,
) -> Result<DrawOutcome> {
    // Every read and write below runs in this transaction; dropping it on an early
    // return rolls everything back.
    let txn = db.begin().await?;

    let summary = get_summary_by_id(&txn, summary_id)
        .await?
        .ok_or(Error::SummaryNotFound { id: summary_id })?;
    let month = summary.month()?;

    if !can_draw(&summary) {
        return Err(Error::AlreadyDrawn { month });
    }

    let mut candidates =
        get_items_by_ids(&txn, &summary.item_ids.0, Some(ItemStatus::Active)).await?;
    if candidates.is_empty() {
        debug!(%month, "Draw attempted with no active candidates");
        return Err(Error::NoCandidates { month });
    }

    let candidate_count = candidates.len();
    let winner = candidates.remove(pick_winner_index(candidate_count, rng));
    let winner = set_item_status(&txn, winner, ItemStatus::Won).await?;

    let mut skipped = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        skipped.push(set_item_status(&txn, candidate, ItemStatus::Skipped).await?);
    }

    // Only an undrawn summary matches, so a racing draw cannot record a second winner
    let now = clock.now();
    let update = MonthSummary::update_many()
        .col_expr(month_summary::Column::WinnerItemId, Expr::value(winner.id))
        .col_expr(month_summary::Column::ClosedAt, Expr::value(now))
        .filter(month_summary::Column::Id.eq(summary.id))
        .filter(month_summary::Column::WinnerItemId.is_null())
        .exec(&txn)
        .await?;
    if update.rows_affected != 1 {
        return Err(Error::AlreadyDrawn { month });
    }

    let summary = get_summary_by_id(&txn, summary_id)
        .await?
        .ok_or(Error::SummaryNotFound { id: summary_id })?;
    txn.commit().await?;

    info!(
        %month,
        winner_id = winner.id,
        winner = %winner.title,
        candidates = candidate_count,
        "Reward drawn"
    );
    Ok(DrawOutcome {
        summary,
        winner,
        skipped,
    })
}

/// Records whether the user bought the drawn winner.
///
/// Repeating the same answer is a no-op; giving the other answer overwrites the first
/// so a mistaken tap can be corrected. Items that were never drawn as winner are
/// rejected with [`Error::InvalidTransition`].
pub async fn confirm_purchase<C>(db: &C, item_id: i64, purchased: bool) -> Result<item::Model>
where
    C: ConnectionTrait,
{
    let item = get_item(db, item_id)
        .await?
        .ok_or(Error::ItemNotFound { id: item_id })?;

    let target = if purchased {
        ItemStatus::Purchased
    } else {
        ItemStatus::NotPurchased
    };

    if item.status == target {
        debug!(item_id, status = ?target, "Purchase already confirmed");
        return Ok(item);
    }

    let updated = set_item_status(db, item, target).await?;
    info!(item_id, purchased, "Purchase confirmation recorded");
    Ok(updated)
}
