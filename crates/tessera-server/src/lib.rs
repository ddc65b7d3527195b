//! Tessera Server: settings, HTTP routes and process bootstrap.

pub mod routes;
pub mod settings;
