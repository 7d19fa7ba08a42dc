//! Core business logic - framework-agnostic item, ledger, reward, and undo operations.

/// Item store adapter and the add-item flow
pub mod item;
/// Currency conversion and tax helpers
pub mod money;
/// Calendar month keys
pub mod month_key;
/// Month ledger: frozen summaries of closed months
pub mod monthly;
/// Reward draw and purchase confirmation
pub mod reward;
/// Free-tier savings cap guard
pub mod savings_cap;
/// Reversible deletion with a grace window
pub mod undo;
