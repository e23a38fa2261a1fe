use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

/// User record as persisted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// Fields of a user record to be created; the store assigns the id.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("email already in use")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Abstract user-record store. Uniqueness of username and non-null email
/// is enforced at insert time; a conflicting insert reports the same
/// duplicate errors as the read-side checks.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Bump `updated_at` after a successful standard login.
    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> Result<(), StoreError>;
}

/// Postgres-backed store. The unique indexes on `username` and `email`
/// are the authoritative guard against concurrent registrations.
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some("users_email_key") => StoreError::DuplicateEmail,
                _ => StoreError::DuplicateUsername,
            };
        }
    }
    StoreError::Backend(err.into())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, email, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password_hash, email, created_at, updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        debug!(user_id = %inserted.id, username = %inserted.username, "user row inserted");
        Ok(inserted)
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(())
    }
}

/// Dictionary-backed store keyed by username. Serves tests and
/// database-less deployments; duplicate checks happen under a single
/// lock, so inserts are atomic like their Postgres counterpart.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.get(username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        if users.contains_key(&user.username) {
            return Err(StoreError::DuplicateUsername);
        }
        if let Some(email) = user.email.as_deref() {
            if users.values().any(|u| u.email.as_deref() == Some(email)) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let record = User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            password_hash: user.password_hash,
            email: user.email,
            created_at: user.created_at,
            updated_at: None,
        };
        users.insert(user.username, record.clone());
        Ok(record)
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> Result<(), StoreError> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        if let Some(user) = users.values_mut().find(|u| u.id == id) {
            user.updated_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: Option<&str>) -> NewUser {
        NewUser {
            username: username.into(),
            password_hash: "$argon2id$fake".into(),
            email: email.map(str::to_owned),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_username() {
        let store = MemoryUserStore::default();
        let created = store.insert(new_user("alice", None)).await.expect("insert");
        let found = store
            .find_by_username("alice")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.id, created.id);
        assert!(found.updated_at.is_none());
    }

    #[tokio::test]
    async fn username_lookup_is_case_sensitive() {
        let store = MemoryUserStore::default();
        store.insert(new_user("Alice", None)).await.expect("insert");
        assert!(store
            .find_by_username("alice")
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_username_insert_conflicts() {
        let store = MemoryUserStore::default();
        store.insert(new_user("bob", None)).await.expect("insert");
        let err = store.insert(new_user("bob", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[tokio::test]
    async fn duplicate_email_insert_conflicts() {
        let store = MemoryUserStore::default();
        store
            .insert(new_user("carol", Some("carol@example.com")))
            .await
            .expect("insert");
        let err = store
            .insert(new_user("carla", Some("carol@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn missing_email_never_collides() {
        let store = MemoryUserStore::default();
        store.insert(new_user("dave", None)).await.expect("insert");
        store.insert(new_user("dan", None)).await.expect("insert");
    }

    #[tokio::test]
    async fn record_login_sets_updated_at() {
        let store = MemoryUserStore::default();
        let user = store.insert(new_user("erin", None)).await.expect("insert");
        let at = OffsetDateTime::now_utc();
        store.record_login(user.id, at).await.expect("record login");
        let found = store
            .find_by_username("erin")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.updated_at, Some(at));
    }
}
