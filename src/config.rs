use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub global_max: u32,
    pub global_window_secs: u64,
    pub sensitive_max: u32,
    pub sensitive_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    /// Marks the jwt cookie Secure + SameSite=None. Off for local http dev.
    pub cookie_secure: bool,
    /// Externally reachable base URL, used in password-reset emails.
    pub public_url: String,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            expires_days: env_parsed("JWT_EXPIRES_DAYS", 90),
        };
        let rate_limit = RateLimitConfig {
            global_max: env_parsed("RL_GLOBAL_MAX", 100),
            global_window_secs: env_parsed("RL_GLOBAL_WINDOW_SECS", 15 * 60),
            sensitive_max: env_parsed("RL_SENSITIVE_MAX", 5),
            sensitive_window_secs: env_parsed("RL_SENSITIVE_WINDOW_SECS", 60 * 60),
        };
        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let public_url =
            std::env::var("PUBLIC_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        Ok(Self {
            database_url,
            jwt,
            rate_limit,
            cookie_secure,
            public_url,
        })
    }
}
