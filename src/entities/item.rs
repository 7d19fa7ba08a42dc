//! Item entity - One logged temptation the user chose not to buy.
//!
//! Each item records a title and price, optional metadata, the month it belongs to,
//! and where it sits in the reward lifecycle. The price is stored in whole cents.

use crate::core::{money, month_key::MonthKey};
use crate::errors;
use rust_decimal::Decimal;
use sea_orm::{FromJsonQueryResult, entity::prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display title (never empty)
    pub title: String,
    /// Price in whole cents
    pub price_cents: i64,
    /// Free-form notes
    pub notes: Option<String>,
    /// Link to the product page
    pub product_url: Option<String>,
    /// Unordered set of tags
    pub tags: Tags,
    /// Opaque reference into the image store
    pub image_ref: Option<String>,
    /// When the item was logged
    pub created_at: DateTimeUtc,
    /// `YYYY-MM` month derived from `created_at`
    pub month_key: String,
    /// Lifecycle state
    pub status: ItemStatus,
}

impl Model {
    /// The item's price as a currency amount.
    #[must_use]
    pub fn price(&self) -> Decimal {
        money::from_cents(self.price_cents)
    }

    /// The month this item is grouped under.
    pub fn month(&self) -> errors::Result<MonthKey> {
        self.month_key.parse()
    }
}

/// Tag set persisted as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Tags(pub BTreeSet<String>);

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Where an item sits in the monthly reward lifecycle.
///
/// `Active` items are waiting for their month's draw. The draw moves exactly one
/// item to `Won` and the rest to `Skipped`; the winner is later confirmed as
/// `Purchased` or `NotPurchased`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ItemStatus {
    /// Logged and waiting for the month's draw
    #[sea_orm(string_value = "active")]
    Active,
    /// Selected by the draw
    #[sea_orm(string_value = "won")]
    Won,
    /// Not selected by the draw
    #[sea_orm(string_value = "skipped")]
    Skipped,
    /// Winner the user went on to buy
    #[sea_orm(string_value = "purchased")]
    Purchased,
    /// Winner the user decided not to buy
    #[sea_orm(string_value = "not_purchased")]
    NotPurchased,
}

impl ItemStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `Purchased` and `NotPurchased` may be swapped so a mistaken confirmation can
    /// be corrected. Nothing ever returns to `Active`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Won | Self::Skipped)
                | (Self::Won, Self::Purchased | Self::NotPurchased)
                | (Self::Purchased, Self::NotPurchased)
                | (Self::NotPurchased, Self::Purchased)
        )
    }
}

/// Items have no foreign keys; summaries reference them by id.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ItemStatus::{Active, NotPurchased, Purchased, Skipped, Won};

        assert!(Active.can_transition_to(Won));
        assert!(Active.can_transition_to(Skipped));
        assert!(Won.can_transition_to(Purchased));
        assert!(Won.can_transition_to(NotPurchased));
        assert!(Purchased.can_transition_to(NotPurchased));

        assert!(!Active.can_transition_to(Purchased));
        assert!(!Skipped.can_transition_to(Won));
        assert!(!Skipped.can_transition_to(Active));
        assert!(!Won.can_transition_to(Skipped));
        assert!(!Purchased.can_transition_to(Active));
    }

    #[tokio::test]
    async fn test_tags_and_status_persist_through_sqlite() -> errors::Result<()> {
        let db = crate::test_utils::setup_test_db().await?;
        let tags: Tags = ["kitchen", "gadget"].into_iter().collect();

        let inserted = ActiveModel {
            title: sea_orm::Set("Espresso machine".to_string()),
            price_cents: sea_orm::Set(24_900),
            notes: sea_orm::Set(None),
            product_url: sea_orm::Set(None),
            tags: sea_orm::Set(tags.clone()),
            image_ref: sea_orm::Set(None),
            created_at: sea_orm::Set(crate::test_utils::utc(2024, 3, 9)),
            month_key: sea_orm::Set("2024-03".to_string()),
            status: sea_orm::Set(ItemStatus::Won),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let fetched = Entity::find_by_id(inserted.id).one(&db).await?;
        let fetched = fetched.ok_or(errors::Error::ItemNotFound { id: inserted.id })?;
        assert_eq!(fetched.tags, tags);
        assert_eq!(fetched.status, ItemStatus::Won);
        assert_eq!(fetched.month()?, MonthKey::new(2024, 3)?);
        assert_eq!(fetched.price(), Decimal::new(24_900, 2));
        Ok(())
    }

    #[test]
    fn test_tags_ignore_order_and_duplicates() {
        let a: Tags = ["shoes", "sale", "shoes"].into_iter().collect();
        let b: Tags = ["sale", "shoes"].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 2);
    }
}
