use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub max_body_size: usize,
    pub cache: CachePolicy,
    pub quota_sweep_interval: Duration,
    pub rate_limit: u32,
    pub rate_limit_window: Duration,
    pub sheets_base_url: String,
    pub google: Option<GoogleOAuthConfig>,
}

/// OAuth client credentials, only needed to refresh expired access tokens.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachePolicy {
    /// Writes drop every cached response under the written collection.
    InvalidateOnWrite,
    /// Cached responses live until their TTL regardless of writes.
    ExpireOnly,
}

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("SHEETAPI_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid SHEETAPI_HOST: {e}"))?;

        let port: u16 = env_or("SHEETAPI_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid SHEETAPI_PORT: {e}"))?;

        let log_level = env_or("SHEETAPI_LOG_LEVEL", "info");

        let max_body_size: usize = env_or("SHEETAPI_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid SHEETAPI_MAX_BODY_SIZE: {e}"))?;

        let cache = match env_or("SHEETAPI_CACHE_INVALIDATE_ON_WRITE", "true").as_str() {
            "false" | "0" | "no" => CachePolicy::ExpireOnly,
            _ => CachePolicy::InvalidateOnWrite,
        };

        let sweep_secs: u64 = env_or("SHEETAPI_QUOTA_SWEEP_SECS", "60")
            .parse()
            .map_err(|e| format!("Invalid SHEETAPI_QUOTA_SWEEP_SECS: {e}"))?;

        let rate_limit: u32 = env_or("SHEETAPI_RATE_LIMIT", "200")
            .parse()
            .map_err(|e| format!("Invalid SHEETAPI_RATE_LIMIT: {e}"))?;

        let window_secs: u64 = env_or("SHEETAPI_RATE_LIMIT_WINDOW_SECS", "600")
            .parse()
            .map_err(|e| format!("Invalid SHEETAPI_RATE_LIMIT_WINDOW_SECS: {e}"))?;

        let sheets_base_url = env_or("SHEETAPI_SHEETS_BASE_URL", DEFAULT_SHEETS_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let google = match (
            std::env::var("GOOGLE_CLIENT_ID").ok(),
            std::env::var("GOOGLE_CLIENT_SECRET").ok(),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                token_url: env_or("GOOGLE_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL),
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            log_level,
            max_body_size,
            cache,
            quota_sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            rate_limit,
            rate_limit_window: Duration::from_secs(window_secs.max(1)),
            sheets_base_url,
            google,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
