//! Authentication service: register, login, refresh, logout and
//! verify orchestration.

use tessera_core::error::TesseraError;
use tessera_core::models::refresh_token::CreateRefreshToken;
use tessera_core::models::user::{CreateUser, PublicUser, User, normalize_email};
use tessera_core::repository::{RefreshTokenRepository, UserRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password::PasswordHasher;
use crate::token::{self, AccessTokenClaims, TokenIssuer, TokenPair};

/// Input for the registration flow. Absent and empty fields are treated
/// the same.
#[derive(Debug, Default)]
pub struct RegisterInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Input for the login flow.
#[derive(Debug, Default)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Signed single-use refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: PublicUser,
}

/// Successful refresh result (new token pair).
#[derive(Debug)]
pub struct RefreshOutput {
    pub access_token: String,
    /// Replaces the consumed refresh token.
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Authentication service.
///
/// Generic over the credential store and the refresh token registry so
/// the same protocol runs on top of any storage adapter.
pub struct AuthService<U: UserRepository, R: RefreshTokenRepository> {
    user_repo: U,
    token_repo: R,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    config: AuthConfig,
}

impl<U: UserRepository, R: RefreshTokenRepository> AuthService<U, R> {
    pub fn new(user_repo: U, token_repo: R, config: AuthConfig) -> Result<Self, AuthError> {
        Ok(Self {
            user_repo,
            token_repo,
            hasher: PasswordHasher::from_config(&config)?,
            issuer: TokenIssuer::new(&config)?,
            config,
        })
    }

    /// Create an account and return its public projection.
    pub async fn register(&self, input: RegisterInput) -> Result<PublicUser, AuthError> {
        let (email, password) =
            match (present_email(input.email), present_password(input.password)) {
                (Some(email), Some(password)) => (email, password),
                _ => return Err(AuthError::MissingFields),
            };

        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::PasswordTooShort {
                min_length: self.config.min_password_length,
            });
        }

        let password_hash = self.hash_password(password).await?;

        let user = self
            .user_repo
            .create(CreateUser {
                email: normalize_email(&email),
                password_hash,
                first_name: input.first_name.unwrap_or_default(),
                last_name: input.last_name.unwrap_or_default(),
            })
            .await
            .map_err(|e| match e {
                TesseraError::AlreadyExists { .. } => AuthError::EmailExists,
                other => AuthError::Store(other),
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user.into())
    }

    /// Authenticate with email + password and issue a token pair.
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutput, AuthError> {
        let (email, password) =
            match (present_email(input.email), present_password(input.password)) {
                (Some(email), Some(password)) => (email, password),
                _ => return Err(AuthError::MissingFields),
            };

        // 1. Look up user. Unknown email and wrong password must be
        //    indistinguishable to the caller.
        let user = match self.user_repo.get_by_email(&normalize_email(&email)).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                debug!("login rejected: unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        // 2. Verify password.
        if !self
            .verify_password(password, user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        // 3. Issue tokens and make the refresh token redeemable.
        let pair = self.issue_session(&user).await?;

        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutput {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: self.issuer.access_lifetime_secs(),
            user: user.into(),
        })
    }

    /// Rotate a refresh token: consume it, then issue a new pair.
    ///
    /// The presented token is redeemed before anything else is checked,
    /// so it is gone for good whatever happens afterwards. Two
    /// concurrent calls with the same token cannot both get past step 1.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<RefreshOutput, AuthError> {
        let raw = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::TokenMissing)?;

        // 1. Redeem (atomic check-and-remove).
        let record = self
            .token_repo
            .redeem(&token::hash_refresh_token(raw))
            .await
            .map_err(|e| match e {
                TesseraError::NotFound { .. } => {
                    AuthError::TokenInvalid("refresh token not found or already used".into())
                }
                other => AuthError::Store(other),
            })?;

        // 2. Verify signature and expiry. Expired refresh tokens are
        //    reported as invalid.
        let claims = self.issuer.verify_refresh(raw).map_err(|e| match e {
            AuthError::TokenExpired => AuthError::TokenInvalid("refresh token expired".into()),
            other => other,
        })?;
        let user_id = claims.user_id()?;
        if user_id != record.user_id {
            warn!(user_id = %record.user_id, "refresh token subject mismatch");
            return Err(AuthError::TokenInvalid("subject mismatch".into()));
        }

        // 3. The owner must still exist.
        let user = self.find_user(user_id).await?;

        // 4. Issue the successor pair.
        let pair = self.issue_session(&user).await?;

        debug!(user_id = %user.id, "refresh token rotated");
        Ok(RefreshOutput {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: self.issuer.access_lifetime_secs(),
        })
    }

    /// Revoke a refresh token if one is supplied. Succeeds whether or
    /// not the token was live.
    ///
    /// A store failure is still reported as an internal error, so the
    /// caller is never told a token is revoked when the registry did
    /// not record it.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        if let Some(raw) = refresh_token.filter(|t| !t.is_empty()) {
            self.token_repo
                .revoke(&token::hash_refresh_token(raw))
                .await?;
        }
        Ok(())
    }

    /// Verify a bearer access token and return its claims.
    ///
    /// Purely stateless: no store lookup is performed.
    pub fn verify(&self, access_token: Option<&str>) -> Result<AccessTokenClaims, AuthError> {
        let token = access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::TokenMissing)?;
        self.issuer.verify_access(token)
    }

    /// Resolve verified claims to the current user.
    pub async fn current_user(&self, claims: &AccessTokenClaims) -> Result<PublicUser, AuthError> {
        let user = self.find_user(claims.user_id()?).await?;
        Ok(user.into())
    }

    /// Delete a user and every refresh token it owns.
    pub async fn remove_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.user_repo.delete(user_id).await.map_err(|e| match e {
            TesseraError::NotFound { .. } => AuthError::UserNotFound,
            other => AuthError::Store(other),
        })?;
        let revoked = self.token_repo.revoke_all(user_id).await?;

        info!(user_id = %user_id, revoked, "user removed");
        Ok(())
    }

    /// Drop registry records for refresh tokens that expired unused.
    pub async fn purge_expired_refresh_tokens(&self) -> Result<u64, AuthError> {
        let purged = self.token_repo.purge_expired().await?;
        if purged > 0 {
            debug!(purged, "expired refresh tokens purged");
        }
        Ok(purged)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.user_repo.get_by_id(user_id).await.map_err(|e| match e {
            TesseraError::NotFound { .. } => AuthError::UserNotFound,
            other => AuthError::Store(other),
        })
    }

    async fn issue_session(&self, user: &User) -> Result<TokenPair, AuthError> {
        let pair = self.issuer.issue_pair(user)?;
        self.token_repo
            .register(CreateRefreshToken {
                token_hash: token::hash_refresh_token(&pair.refresh_token),
                user_id: user.id,
                expires_at: pair.refresh_expires_at,
            })
            .await?;
        Ok(pair)
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Crypto(format!("hashing task failed: {e}")))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Crypto(format!("verification task failed: {e}")))?
    }
}

fn present_email(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Passwords are taken verbatim; only the empty string counts as absent.
fn present_password(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
