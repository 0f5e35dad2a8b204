//! Action groups for AnkiWeb operations.
//!
//! Each module provides a set of related operations grouped by page.

mod account;
mod cards;

pub use account::AccountActions;
pub use cards::CardActions;
