use std::sync::Arc;

use anyhow::Context;

use crate::auth::jwt::TokenIssuer;
use crate::auth::service::CredentialService;
use crate::auth::store::{MemoryUserStore, PgUserStore, UserStore};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialService,
    pub issuer: TokenIssuer,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn UserStore> = match config.database_url.as_deref() {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgUserStore::new(db))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using the in-memory user store");
                Arc::new(MemoryUserStore::default())
            }
        };

        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        let issuer = TokenIssuer::new(&config.jwt);
        Self {
            credentials: CredentialService::new(store),
            issuer,
            config,
        }
    }

    #[cfg(test)]
    pub fn for_tests(store: Arc<dyn UserStore>) -> Self {
        use crate::config::JwtConfig;

        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-signing-key-test-signing-key!".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
        });
        Self::from_parts(store, config)
    }
}
