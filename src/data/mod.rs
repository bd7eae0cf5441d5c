//! Data layer module
//!
//! Handles all data persistence:
//! - Account records and the follow edge table
//! - The append-only message log

mod database;
mod models;

pub use database::Database;
pub use models::*;

#[cfg(test)]
mod database_test;
