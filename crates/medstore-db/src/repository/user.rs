//! # User Repository
//!
//! Database operations for accounts. Password hashing happens in the API
//! layer; this repository only ever sees the finished PHC string.

use chrono::Utc;
use medstore_core::input::{patch_text, UserDraft, UserPatch};
use medstore_core::User;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const USER_COLUMNS: &str =
    "id, username, email, full_name, role, password_hash, is_active, created_at, updated_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates an account.
    ///
    /// `draft.password` is validated but not stored; `password_hash` is.
    pub async fn create(&self, draft: UserDraft, password_hash: String) -> DbResult<User> {
        let draft = draft.normalize()?;
        let now = Utc::now();

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: draft.username,
            email: draft.email,
            full_name: draft.full_name,
            role: draft.role,
            password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(username = %user.username, role = %user.role, "Creating user");

        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ))
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("Username", &user.username))?;

        Ok(user)
    }

    /// Gets a user by ID.
    pub async fn get(&self, id: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Looks a user up by username, ignoring case. `None` when unknown.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Lists all users by username.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Updates profile, role or active flag.
    pub async fn update(&self, id: &str, patch: UserPatch) -> DbResult<User> {
        let patch = patch.normalize()?;
        let mut user = self.get(id).await?;

        user.email = patch_text(user.email, patch.email);
        user.full_name = patch_text(user.full_name, patch.full_name);
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(active) = patch.is_active {
            user.is_active = active;
        }
        user.updated_at = Utc::now();

        debug!(id = %id, role = %user.role, active = user.is_active, "Updating user");

        sqlx::query(
            "UPDATE users SET email = ?2, full_name = ?3, role = ?4, is_active = ?5, updated_at = ?6 WHERE id = ?1",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    /// Replaces the stored password hash.
    pub async fn set_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Deletes an account. Ledger rows keep the id in `performed_by`.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Counts users.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use medstore_core::Role;

    #[tokio::test]
    async fn test_username_unique_ignoring_case() {
        let db = test_db().await;
        user(&db, "jsmith").await;

        let err = db
            .users()
            .create(
                UserDraft {
                    username: "JSmith".to_string(),
                    password: "another password".to_string(),
                    email: None,
                    full_name: None,
                    role: Role::User,
                },
                "hash".to_string(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Username 'JSmith' already exists");

        let found = db.users().find_by_username("JSMITH").await.unwrap();
        assert_eq!(found.map(|u| u.username), Some("jsmith".to_string()));
    }

    #[tokio::test]
    async fn test_short_password_rejected_before_insert() {
        let db = test_db().await;
        let result = db
            .users()
            .create(
                UserDraft {
                    username: "short".to_string(),
                    password: "123".to_string(),
                    email: None,
                    full_name: None,
                    role: Role::User,
                },
                "hash".to_string(),
            )
            .await;
        assert!(matches!(result, Err(DbError::Core(_))));
        assert_eq!(db.users().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_and_password() {
        let db = test_db().await;
        let created = user(&db, "nurse.kim").await;

        let updated = db
            .users()
            .update(
                &created.id,
                UserPatch {
                    role: Some(Role::Admin),
                    is_active: Some(false),
                    full_name: Some("Kim Park".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert!(!updated.is_active);

        db.users().set_password(&created.id, "new-hash").await.unwrap();
        assert_eq!(db.users().get(&created.id).await.unwrap().password_hash, "new-hash");

        db.users().delete(&created.id).await.unwrap();
        assert!(matches!(
            db.users().set_password(&created.id, "x").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
