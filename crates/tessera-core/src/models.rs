//! Domain models for Tessera.

pub mod refresh_token;
pub mod user;
