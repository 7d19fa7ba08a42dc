//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables backing the item store.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod item;
pub mod month_summary;

// Re-export specific types to avoid conflicts
pub use item::{
    Column as ItemColumn, Entity as Item, ItemStatus, Model as ItemModel, Tags,
};
pub use month_summary::{
    Column as MonthSummaryColumn, Entity as MonthSummary, ItemIds, Model as MonthSummaryModel,
};
