use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
}

/// Development-only signing key. Never used unless explicitly opted in
/// with JWT_ALLOW_DEV_SECRET=1.
const DEV_SECRET: &str = "insecure-dev-signing-key-0123456789abcdef";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();

        let secret = match std::env::var("JWT_SECRET") {
            Ok(s) => s,
            Err(_) => {
                let dev_ok = std::env::var("JWT_ALLOW_DEV_SECRET")
                    .map(|v| v == "1")
                    .unwrap_or(false);
                if !dev_ok {
                    anyhow::bail!(
                        "JWT_SECRET must be set (set JWT_ALLOW_DEV_SECRET=1 to use the development key)"
                    );
                }
                tracing::warn!("JWT_SECRET not set; using the development signing key");
                DEV_SECRET.into()
            }
        };
        if secret.len() < 32 {
            tracing::warn!("JWT_SECRET is shorter than 32 bytes; HS256 keys should be at least 256 bits");
        }

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "login-api".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "login-api-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        Ok(Self { database_url, jwt })
    }
}
