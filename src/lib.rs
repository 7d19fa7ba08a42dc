//! `ImpulseLedger` - Track purchases you talked yourself out of
//!
//! This crate is the core of an impulse-spending tracker: users log items they chose
//! not to buy, each closed month is frozen into a summary of the money saved, and once
//! a month one logged item is drawn at random as a guilt-free reward. Free-tier
//! accounts are held under a lifetime savings cap, and deletions can be undone for a
//! short grace period.

#![deny(
    unsafe_code,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    // Library code propagates errors instead of panicking
    clippy::expect_used,
    clippy::panic,
    clippy::unwrap_used,
    clippy::dbg_macro,
    clippy::todo,
    rust_2018_idioms,
)]
// Store functions return the crate `Result`; their error cases are the variants
// named in `errors::Error`.
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

/// Interfaces to the clock, image store and entitlement source
pub mod collaborators;
/// Configuration management for database and application settings
pub mod config;
/// Core business logic - items, month ledger, reward draw, savings cap, undo
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;

#[cfg(test)]
pub mod test_utils;
