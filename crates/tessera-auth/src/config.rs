//! Authentication configuration.

use thiserror::Error;

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared HMAC secret for signing access and refresh tokens.
    pub jwt_secret: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 604_800 = 7 days).
    pub refresh_token_lifetime_secs: u64,
    /// Minimum password length, counted in characters.
    pub min_password_length: usize,
    /// Argon2 time cost (iterations). This is the tunable work factor.
    pub hash_cost: u32,
    /// Argon2 memory cost in KiB.
    pub hash_memory_kib: u32,
    /// Optional pepper prepended to passwords before hashing.
    pub pepper: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "tessera".into(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 604_800,
            min_password_length: 8,
            hash_cost: 10,
            hash_memory_kib: 19_456,
            pepper: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid lifetime {input:?}: expected e.g. 900, 30s, 15m, 12h or 7d")]
pub struct LifetimeParseError {
    input: String,
}

/// Parse a lifetime such as `"15m"` or `"7d"` into whole seconds.
///
/// Bare integers are seconds. Millisecond values round up to the next
/// second. Zero is rejected.
pub fn parse_lifetime(input: &str) -> Result<u64, LifetimeParseError> {
    let err = || LifetimeParseError {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let value: u64 = digits.parse().map_err(|_| err())?;

    let secs = match unit.trim() {
        "" | "s" | "sec" | "secs" => Some(value),
        "ms" => Some(value.div_ceil(1000)),
        "m" | "min" | "mins" => value.checked_mul(60),
        "h" | "hr" | "hrs" => value.checked_mul(3_600),
        "d" | "day" | "days" => value.checked_mul(86_400),
        "w" => value.checked_mul(604_800),
        _ => None,
    }
    .ok_or_else(err)?;

    if secs == 0 {
        return Err(err());
    }
    Ok(secs)
}
