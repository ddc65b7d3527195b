//! Repository implementations.

mod memory;
mod refresh_token;
mod user;

pub use memory::{MemoryRefreshTokenRepository, MemoryUserRepository};
pub use refresh_token::SurrealRefreshTokenRepository;
pub use user::SurrealUserRepository;
