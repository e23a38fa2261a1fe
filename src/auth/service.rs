use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task;
use tracing::{info, warn};

use crate::auth::error::AuthError;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::store::{NewUser, User, UserStore};

/// Registration and credential verification over an abstract user store.
/// Argon2 work runs on a blocking worker so it never stalls the runtime.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn UserStore>,
}

impl CredentialService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Creates a user record. Duplicate username is reported before
    /// duplicate email is even checked; on any failure path nothing is
    /// inserted. The store's uniqueness constraints remain the
    /// authoritative guard against concurrent registrations.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<User, AuthError> {
        if self.store.find_by_username(username).await?.is_some() {
            warn!(username, "registration rejected: username already exists");
            return Err(AuthError::DuplicateUsername);
        }
        if let Some(email) = email {
            if self.store.find_by_email(email).await?.is_some() {
                warn!(username, "registration rejected: email already in use");
                return Err(AuthError::DuplicateEmail);
            }
        }

        let plain = password.to_owned();
        let password_hash = task::spawn_blocking(move || hash_password(&plain))
            .await
            .map_err(|e| AuthError::Internal(e.into()))??;

        let user = self
            .store
            .insert(NewUser {
                username: username.to_owned(),
                password_hash,
                email: email.map(str::to_owned),
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Looks up the user and checks the password against the stored hash.
    /// Unknown username and wrong password yield the same error.
    pub async fn verify(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = match self.store.find_by_username(username).await? {
            Some(u) => u,
            None => {
                warn!(username, "login failed: unknown username");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let plain = password.to_owned();
        let hash = user.password_hash.clone();
        let ok = task::spawn_blocking(move || verify_password(&plain, &hash))
            .await
            .map_err(|e| AuthError::Internal(e.into()))?;

        if !ok {
            warn!(username, user_id = %user.id, "login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Bumps `updated_at`. Called by the standard login flow only; the
    /// password-grant flow leaves the timestamp untouched.
    pub async fn record_login(&self, user: &User) -> Result<(), AuthError> {
        self.store
            .record_login(user.id, OffsetDateTime::now_utc())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryUserStore;

    fn make_service() -> CredentialService {
        CredentialService::new(Arc::new(MemoryUserStore::default()))
    }

    #[tokio::test]
    async fn register_then_verify_succeeds() {
        let service = make_service();
        let created = service
            .register("alice", "secret1", None)
            .await
            .expect("register");
        assert_eq!(created.username, "alice");
        assert!(!created.password_hash.is_empty());
        assert_ne!(created.password_hash, "secret1");

        let verified = service.verify("alice", "secret1").await.expect("verify");
        assert_eq!(verified.id, created.id);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let service = make_service();
        service
            .register("alice", "secret1", None)
            .await
            .expect("register");
        let err = service.register("alice", "other1", None).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
        // The original record is untouched.
        service.verify("alice", "secret1").await.expect("verify");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_insert() {
        let service = make_service();
        service
            .register("alice", "secret1", Some("alice@example.com"))
            .await
            .expect("register");
        let err = service
            .register("bob", "secret2", Some("alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
        let err = service.verify("bob", "secret2").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_username_wins_over_duplicate_email() {
        let service = make_service();
        service
            .register("alice", "secret1", Some("alice@example.com"))
            .await
            .expect("register");
        let err = service
            .register("alice", "other1", Some("alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_indistinguishable() {
        let service = make_service();
        service
            .register("alice", "secret1", None)
            .await
            .expect("register");

        let unknown = service.verify("nobody", "secret1").await.unwrap_err();
        let wrong = service.verify("alice", "wrong-pass").await.unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn record_login_bumps_updated_at() {
        let service = make_service();
        let user = service
            .register("alice", "secret1", None)
            .await
            .expect("register");
        assert!(user.updated_at.is_none());

        service.record_login(&user).await.expect("record login");
        let after = service.verify("alice", "secret1").await.expect("verify");
        assert!(after.updated_at.is_some());
    }
}
