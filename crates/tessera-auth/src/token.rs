//! JWT issuance and verification for access and refresh tokens, plus
//! the digest used to key refresh tokens in the registry.
//!
//! Both token types are HS256-signed with one process-wide secret. The
//! `type` claim keeps them apart, so a refresh token is never accepted
//! as an access token or the other way round.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tessera_core::models::user::User;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User ID (UUID string).
    pub id: String,
    /// Subject, same value as `id`.
    pub sub: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        parse_user_id(&self.id, &self.sub)
    }
}

/// JWT claims embedded in every refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub id: String,
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl RefreshTokenClaims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        parse_user_id(&self.id, &self.sub)
    }
}

fn parse_user_id(id: &str, sub: &str) -> Result<Uuid, AuthError> {
    if id != sub {
        return Err(AuthError::TokenInvalid("id and subject disagree".into()));
    }
    Uuid::parse_str(id).map_err(|_| AuthError::TokenInvalid("malformed user id".into()))
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// When the refresh token stops verifying.
    pub refresh_expires_at: DateTime<Utc>,
}

/// Signs and verifies tokens with a single shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Crypto("JWT secret is empty".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            access_lifetime: lifetime(config.access_token_lifetime_secs),
            refresh_lifetime: lifetime(config.refresh_token_lifetime_secs),
        })
    }

    /// Access token lifetime in seconds.
    pub fn access_lifetime_secs(&self) -> u64 {
        self.access_lifetime.num_seconds().max(0) as u64
    }

    /// Issue a signed access/refresh pair for the user.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let refresh_expires_at = now + self.refresh_lifetime;

        let access = AccessTokenClaims {
            id: user.id.to_string(),
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            token_type: TokenType::Access,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let refresh = RefreshTokenClaims {
            id: user.id.to_string(),
            sub: user.id.to_string(),
            token_type: TokenType::Refresh,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: refresh_expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            refresh_expires_at,
        })
    }

    /// Verify an access token, distinguishing expiry from tampering.
    pub fn verify_access(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        let claims: AccessTokenClaims = self.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::TokenInvalid("not an access token".into()));
        }
        Ok(claims)
    }

    /// Verify a refresh token's signature, expiry and type.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, AuthError> {
        let claims: RefreshTokenClaims = self.decode(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::TokenInvalid("not a refresh token".into()));
        }
        Ok(claims)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        jsonwebtoken::decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid(e.to_string()),
            })
    }
}

/// Lifetimes are capped at 100 years so `now + lifetime` cannot overflow.
const MAX_LIFETIME_SECS: u64 = 100 * 365 * 86_400;

fn lifetime(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_LIFETIME_SECS) as i64)
}

/// SHA-256 hash of a signed refresh token, hex-encoded.
///
/// This is the registry key; raw refresh tokens are never stored.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
