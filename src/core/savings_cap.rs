//! Savings cap guard.
//!
//! Free-tier accounts may only log items while their lifetime "avoided spend" total
//! stays under a ceiling. The guard reports a staged status (normal, warning, urgent,
//! at cap) for the UI and blocks adds that would cross the ceiling. Everything here is
//! recomputed from the item store on every call; nothing is cached across mutations.

use crate::{
    collaborators::EntitlementSource,
    core::{item::query_all_items, money},
    errors::{Error, Result},
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sea_orm::ConnectionTrait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Cap and warning thresholds, in currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CapThresholds {
    /// Lifetime total at which free-tier adds stop
    pub free_tier_cap: Decimal,
    /// Total at which the UI starts warning
    pub warning_threshold: Decimal,
    /// Total at which the warning becomes urgent
    pub urgent_threshold: Decimal,
}

impl Default for CapThresholds {
    fn default() -> Self {
        Self {
            free_tier_cap: Decimal::from(1_500),
            warning_threshold: Decimal::from(1_000),
            urgent_threshold: Decimal::from(1_400),
        }
    }
}

/// Staged cap status shown to free-tier users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStatus {
    /// Below the warning threshold
    Normal,
    /// At or above the warning threshold
    Warning,
    /// At or above the urgent threshold
    Urgent,
    /// At or above the cap; new items are blocked
    AtCap,
}

/// Snapshot of where the account stands against the cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapReport {
    /// Lifetime total of all item prices
    pub total: Decimal,
    /// Free-tier ceiling
    pub cap: Decimal,
    /// Room left before the cap, never negative
    pub remaining: Decimal,
    /// Total as a percentage of the cap (may exceed 100)
    pub progress_percent: Decimal,
    /// Staged status
    pub status: CapStatus,
    /// Whether the account is exempt
    pub premium: bool,
}

/// Gates the add-item flow for accounts without premium access.
#[derive(Clone)]
pub struct SavingsCapGuard {
    thresholds: CapThresholds,
    entitlement: Arc<dyn EntitlementSource>,
}

impl std::fmt::Debug for SavingsCapGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavingsCapGuard")
            .field("thresholds", &self.thresholds)
            .field("premium", &self.entitlement.has_premium_access())
            .finish()
    }
}

impl SavingsCapGuard {
    /// Creates a guard over the given thresholds and entitlement source.
    #[must_use]
    pub fn new(thresholds: CapThresholds, entitlement: Arc<dyn EntitlementSource>) -> Self {
        Self {
            thresholds,
            entitlement,
        }
    }

    /// The configured thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> &CapThresholds {
        &self.thresholds
    }

    /// Lifetime sum of every item's price, regardless of status or month.
    pub async fn total_savings<C>(&self, db: &C) -> Result<Decimal>
    where
        C: ConnectionTrait,
    {
        let items = query_all_items(db).await?;
        let cents = money::sum_cents(items.iter().map(|item| item.price_cents))?;
        Ok(money::from_cents(cents))
    }

    /// Status for a known total. Premium accounts always report `Normal`.
    #[must_use]
    pub fn status_for_total(&self, total: Decimal) -> CapStatus {
        if self.entitlement.has_premium_access() {
            return CapStatus::Normal;
        }

        let t = &self.thresholds;
        if total >= t.free_tier_cap {
            CapStatus::AtCap
        } else if total >= t.urgent_threshold {
            CapStatus::Urgent
        } else if total >= t.warning_threshold {
            CapStatus::Warning
        } else {
            CapStatus::Normal
        }
    }

    /// Current staged status.
    pub async fn status<C>(&self, db: &C) -> Result<CapStatus>
    where
        C: ConnectionTrait,
    {
        let total = self.total_savings(db).await?;
        Ok(self.status_for_total(total))
    }

    /// Whether a new item may be logged at all right now.
    pub async fn can_add_item<C>(&self, db: &C) -> Result<bool>
    where
        C: ConnectionTrait,
    {
        if self.entitlement.has_premium_access() {
            return Ok(true);
        }
        let total = self.total_savings(db).await?;
        Ok(total < self.thresholds.free_tier_cap)
    }

    /// Gate used by the add flow: blocks a free-tier add when the cap is already
    /// reached or when `price` would carry the total past it.
    pub async fn check_can_add<C>(&self, db: &C, price: Decimal) -> Result<()>
    where
        C: ConnectionTrait,
    {
        if self.entitlement.has_premium_access() {
            return Ok(());
        }

        let total = self.total_savings(db).await?;
        let cap = self.thresholds.free_tier_cap;
        if total >= cap || total + price > cap {
            warn!(%total, %price, %cap, "Add blocked by savings cap");
            return Err(Error::CapReached { total, cap });
        }

        let after = self.status_for_total(total + price);
        if after != CapStatus::Normal {
            info!(status = ?after, total = %(total + price), "Savings cap approaching");
        }
        Ok(())
    }

    /// Builds a display report of the account against the cap.
    pub async fn report<C>(&self, db: &C) -> Result<CapReport>
    where
        C: ConnectionTrait,
    {
        let total = self.total_savings(db).await?;
        let cap = self.thresholds.free_tier_cap;
        let progress_percent = if cap.is_zero() {
            Decimal::ZERO
        } else {
            (total / cap * Decimal::ONE_HUNDRED).round_dp(1)
        };

        Ok(CapReport {
            total,
            cap,
            remaining: (cap - total).max(Decimal::ZERO),
            progress_percent,
            status: self.status_for_total(total),
            premium: self.entitlement.has_premium_access(),
        })
    }
}

/// Generates a text progress bar such as `[████████░░] 80%`.
#[must_use]
pub fn format_progress_bar(progress_percent: Decimal, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped = progress_percent
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or(0.0);

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = ((clamped / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    format!(
        "[{}{}] {}%",
        "█".repeat(filled),
        "░".repeat(empty),
        progress_percent.round()
    )
}
