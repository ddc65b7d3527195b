//! Tessera Core: shared domain types, repository traits and the
//! store-level error taxonomy.

pub mod error;
pub mod models;
pub mod repository;
