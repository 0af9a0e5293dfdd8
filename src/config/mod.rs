use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub seed_demo_data: bool,
    pub pagination: PaginationConfig,
    /// Origin allowed to call the API from a browser. Any origin when unset.
    pub cors_allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Secret for signing visit cursors. A random per-process key is used when unset.
    pub cursor_hmac_secret: Option<String>,
    #[serde(default = "PaginationConfig::default_limit")]
    pub default_limit: usize,
    #[serde(default = "PaginationConfig::default_max_limit")]
    pub max_limit: usize,
}

impl PaginationConfig {
    const fn default_limit() -> usize {
        50
    }

    const fn default_max_limit() -> usize {
        500
    }

    /// Clamp a requested page size into `1..=max_limit`
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            cursor_hmac_secret: None,
            default_limit: Self::default_limit(),
            max_limit: Self::default_max_limit(),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = env_or("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a valid port number")?;

        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = env_or("REDIRECT_PORT", "3000")
            .parse::<u16>()
            .context("REDIRECT_PORT must be a valid port number")?;

        let seed_demo_data = std::env::var("SEED_DEMO_DATA")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        let default_limit = match std::env::var("DEFAULT_PAGE_LIMIT") {
            Ok(v) => v
                .parse::<usize>()
                .context("DEFAULT_PAGE_LIMIT must be a positive integer")?,
            Err(_) => PaginationConfig::default_limit(),
        };
        let max_limit = match std::env::var("MAX_PAGE_LIMIT") {
            Ok(v) => v
                .parse::<usize>()
                .context("MAX_PAGE_LIMIT must be a positive integer")?,
            Err(_) => PaginationConfig::default_max_limit(),
        };
        if default_limit > max_limit {
            tracing::warn!(
                "DEFAULT_PAGE_LIMIT ({default_limit}) exceeds MAX_PAGE_LIMIT ({max_limit}); pages will be capped"
            );
        }

        let cursor_hmac_secret = std::env::var("CURSOR_HMAC_SECRET").ok();
        if cursor_hmac_secret.is_none() {
            tracing::warn!("CURSOR_HMAC_SECRET not set; visit cursors will not survive restarts");
        }

        let cors_allowed_origin = std::env::var("CORS_ALLOWED_ORIGIN").ok();

        Ok(Config {
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            seed_demo_data,
            pagination: PaginationConfig {
                cursor_hmac_secret,
                default_limit,
                max_limit,
            },
            cors_allowed_origin,
        })
    }
}
