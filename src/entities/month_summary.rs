//! Month summary entity - The frozen ledger entry for a closed month.
//!
//! A summary is written once when its month closes. The total and count never change
//! afterwards; only the draw fills in `winner_item_id` and `closed_at`.

use crate::core::{money, month_key::MonthKey};
use crate::errors;
use rust_decimal::Decimal;
use sea_orm::{FromJsonQueryResult, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Month summary database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "month_summaries")]
pub struct Model {
    /// Unique identifier for the summary
    #[sea_orm(primary_key)]
    pub id: i64,
    /// `YYYY-MM` month covered; at most one summary per month
    #[sea_orm(unique)]
    pub month_key: String,
    /// Sum of the counted items' prices, in cents
    pub total_saved_cents: i64,
    /// Number of counted items
    pub item_count: i64,
    /// Ids of the items counted when the summary was frozen
    pub item_ids: ItemIds,
    /// Id of the drawn winner; `None` until the draw happens
    pub winner_item_id: Option<i64>,
    /// When the draw completed
    pub closed_at: Option<DateTimeUtc>,
    /// When the summary was frozen
    pub created_at: DateTimeUtc,
}

impl Model {
    /// The frozen total as a currency amount.
    #[must_use]
    pub fn total_saved(&self) -> Decimal {
        money::from_cents(self.total_saved_cents)
    }

    /// The month this summary covers.
    pub fn month(&self) -> errors::Result<MonthKey> {
        self.month_key.parse()
    }
}

/// Item ids captured at freeze time, persisted as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ItemIds(pub Vec<i64>);

/// `MonthSummary` has no foreign-key relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
