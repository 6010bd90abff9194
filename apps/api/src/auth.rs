//! JWT authentication module.
//!
//! Issues and validates access tokens, hashes passwords, and resolves the
//! `Authorization` header into an [`AuthUser`] for handlers.
//!
//! ## Request Flow
//! ```text
//! Authorization: Bearer eyJ...
//!        │
//!        ▼
//! extract_bearer_token() ──► JwtManager::validate_token() ──► Claims
//!        │                                                     │
//!        │ missing/invalid → 401                               ▼
//!        │                                   users.get(sub), is_active?
//!        │                                                     │
//!        ▼                                                     ▼
//!   handler(user: AuthUser) ◄──────────────────────── AuthUser { role, .. }
//!        │
//!        ▼
//!   user.require_admin()? / user.require_inventory_manager()?  → 403
//! ```

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use medstore_core::input::UserDraft;
use medstore_core::{Role, User};
use medstore_db::{Database, DbError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Username of the account created on first start.
pub const BOOTSTRAP_ADMIN: &str = "admin";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Username at issue time
    pub username: String,

    /// Role at issue time
    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            lifetime_secs,
        }
    }

    /// Generate an access token for a user.
    pub fn generate_token(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let validation = Validation::default();

        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "Rejected token");
            ApiError::unauthorized("Invalid or expired token")
        })?;

        Ok(token_data.claims)
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password for storage (Argon2id, random salt, PHC string).
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Check a password against a stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Extractor
// =============================================================================

/// The signed-in caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Admin only (user management, item and supplier deletion).
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }

    /// Admin or Inventory Manager (catalog writes).
    pub fn require_inventory_manager(&self) -> ApiResult<()> {
        if self.role.can_manage_inventory() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Inventory Manager or Admin access required"))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

        let claims = state.jwt.validate_token(token)?;

        // The role is read fresh so a demotion or deactivation applies at once.
        let user = match state.db.users().get(&claims.sub).await {
            Ok(user) => user,
            Err(DbError::NotFound { .. }) => {
                return Err(ApiError::unauthorized("Account no longer exists"))
            }
            Err(e) => return Err(e.into()),
        };

        if !user.is_active {
            return Err(ApiError::unauthorized("Account is disabled"));
        }

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Creates the `admin` account when the user table is empty and a bootstrap
/// password is configured. Returns whether an account was created.
pub async fn bootstrap_admin(db: &Database, config: &AppConfig) -> ApiResult<bool> {
    let password = match config.auth.bootstrap_admin_password.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(false),
    };

    if db.users().count().await? > 0 {
        return Ok(false);
    }

    let draft = UserDraft {
        username: BOOTSTRAP_ADMIN.to_string(),
        password: password.to_string(),
        email: None,
        full_name: Some("Administrator".to_string()),
        role: Role::Admin,
    }
    .normalize()?;

    let hash = hash_password(&draft.password)?;
    let user = db.users().create(draft, hash).await?;
    info!(user_id = %user.id, "Bootstrap admin account created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: "u-1".to_string(),
            username: "jordan".to_string(),
            email: None,
            full_name: None,
            role,
            password_hash: String::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret".to_string(), 3600);

        let token = manager.generate_token(&user(Role::InventoryManager)).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.username, "jordan");
        assert_eq!(claims.role, Role::InventoryManager);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new("secret-a".to_string(), 3600);
        let checker = JwtManager::new("secret-b".to_string(), 3600);

        let token = issuer.generate_token(&user(Role::User)).unwrap();
        let err = checker.validate_token(&token).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_expired_token_rejected() {
        // Beyond the default 60s leeway
        let manager = JwtManager::new("test-secret".to_string(), -120);
        let token = manager.generate_token(&user(Role::Admin)).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_role_guards() {
        let manager = AuthUser {
            id: "u".to_string(),
            username: "m".to_string(),
            role: Role::InventoryManager,
        };
        assert!(manager.require_inventory_manager().is_ok());
        assert!(manager.require_admin().is_err());

        let plain = AuthUser {
            role: Role::User,
            ..manager
        };
        assert!(plain.require_inventory_manager().is_err());
    }
}
