//! Unified error type for the ledger core.
//!
//! Every fallible operation returns [`Result`]. The domain variants map one-to-one
//! onto the failures a caller is expected to handle (empty month, duplicate summary,
//! no draw candidates, already drawn, expired undo, savings cap reached); the rest
//! wrap infrastructure failures.

use crate::core::month_key::MonthKey;
use crate::entities::ItemStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced by the ledger core.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// The underlying store failed.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure outside the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required environment variable was missing or malformed.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// No item exists with the given id.
    #[error("Item not found: {id}")]
    ItemNotFound {
        /// Requested item id
        id: i64,
    },

    /// No month summary exists for the given id.
    #[error("Month summary not found: {id}")]
    SummaryNotFound {
        /// Requested summary id
        id: i64,
    },

    /// A price was negative or carried more than two decimal places.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// An item title was empty after trimming.
    #[error("Item title cannot be empty")]
    InvalidTitle,

    /// A month key string or `(year, month)` pair was malformed.
    #[error("Invalid month key: {value}")]
    InvalidMonthKey {
        /// The rejected input
        value: String,
    },

    /// A status change that the item lifecycle does not allow.
    #[error("Item {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Item id
        id: i64,
        /// Current status
        from: ItemStatus,
        /// Requested status
        to: ItemStatus,
    },

    /// Explicit summary creation found no `Active` items for the month.
    #[error("No active items to summarize for {month}")]
    EmptyMonth {
        /// Month that was requested
        month: MonthKey,
    },

    /// Explicit summary creation for a month that already has one.
    #[error("A summary for {month} already exists")]
    DuplicateSummary {
        /// Month that was requested
        month: MonthKey,
    },

    /// The draw found no eligible items; the summary stays undrawn.
    #[error("No active items are left to draw from for {month}")]
    NoCandidates {
        /// Month of the summary
        month: MonthKey,
    },

    /// The summary already has a winner.
    #[error("The reward for {month} has already been drawn")]
    AlreadyDrawn {
        /// Month of the summary
        month: MonthKey,
    },

    /// Undo was requested after the grace window closed.
    #[error("Deletion {handle} can no longer be undone")]
    Expired {
        /// Handle returned by the delete
        handle: u64,
    },

    /// The free-tier savings cap blocks adding another item.
    #[error("Savings cap of {cap} reached (current total {total})")]
    CapReached {
        /// Lifetime total before the blocked add
        total: Decimal,
        /// Free-tier ceiling
        cap: Decimal,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
