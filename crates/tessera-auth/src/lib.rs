//! Tessera Auth: password hashing, JWT issuance/verification and the
//! session engine (register, login, refresh, logout, verify).

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, ErrorKind};
pub use service::{AuthService, LoginInput, LoginOutput, RefreshOutput, RegisterInput};
pub use token::{AccessTokenClaims, TokenIssuer, TokenPair};
