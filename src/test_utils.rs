//! Shared test utilities for the ledger core.
//!
//! This module provides common helper functions for setting up test databases,
//! creating test items with sensible defaults, and stand-ins for the collaborators
//! (clock, image store) that tests need to control.

#![allow(clippy::unwrap_used)]

use crate::{
    collaborators::{Clock, ImageStore},
    core::item::{NewItem, create_item},
    entities::{Item, ItemStatus, MonthSummary, item, month_summary},
    errors::{Error, Result},
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, DatabaseConnection, Set, prelude::*};
use std::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Noon UTC on the given day.
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// Creates an `Active` test item logged at `created_at`, bypassing the cap guard.
pub async fn create_test_item(
    db: &DatabaseConnection,
    title: &str,
    price: Decimal,
    created_at: DateTime<Utc>,
) -> Result<item::Model> {
    create_item(db, NewItem::new(title, price), created_at).await
}

/// Puts a drawn summary and its items back to their undrawn state.
/// Stands in for the debug tooling that the core itself never offers.
pub async fn reset_draw(db: &DatabaseConnection, summary: &month_summary::Model) -> Result<()> {
    for item in Item::find()
        .filter(item::Column::Id.is_in(summary.item_ids.0.iter().copied()))
        .all(db)
        .await?
    {
        let mut active_model: item::ActiveModel = item.into();
        active_model.status = Set(ItemStatus::Active);
        active_model.update(db).await?;
    }

    let stored = MonthSummary::find_by_id(summary.id)
        .one(db)
        .await?
        .ok_or(Error::SummaryNotFound { id: summary.id })?;
    let mut active_model: month_summary::ActiveModel = stored.into();
    active_model.winner_item_id = Set(None);
    active_model.closed_at = Set(None);
    active_model.update(db).await?;
    Ok(())
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// A clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Image store that records every release, optionally failing each one.
#[derive(Debug, Default)]
pub struct RecordingImageStore {
    released: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingImageStore {
    /// A store whose releases always fail.
    pub fn failing() -> Self {
        Self {
            released: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Image references released so far, in order.
    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

impl ImageStore for RecordingImageStore {
    fn release(&self, image_ref: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Io(std::io::Error::other(format!(
                "image store unavailable: {image_ref}"
            ))));
        }
        self.released.lock().unwrap().push(image_ref.to_string());
        Ok(())
    }
}
