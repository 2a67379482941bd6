use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

/// Argon2id work factors. Verification reads the parameters embedded in the
/// stored hash, so tuning these only affects newly created hashes.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub hmac_secret: String,
    pub mail_from: String,
    pub secure_cookies: bool,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let session = SessionConfig {
            secret: std::env::var("TOKEN_SECRET")?,
            ttl_hours: std::env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(8),
        };
        let hmac_secret = std::env::var("HMAC_CODE_SECRET")?;
        let mail_from =
            std::env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@localhost".into());
        let secure_cookies = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let hash = HashConfig {
            memory_kib: std::env::var("HASH_MEMORY_KIB")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(19456),
            iterations: std::env::var("HASH_ITERATIONS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            parallelism: std::env::var("HASH_PARALLELISM")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(1),
        };
        Ok(Self {
            database_url,
            session,
            hmac_secret,
            mail_from,
            secure_cookies,
            hash,
        })
    }
}
