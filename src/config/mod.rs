use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("{key} must be a valid {expected} (got {value:?})")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub project_name: String,
    pub app_status: String,
}

impl AppSettings {
    pub fn is_production(&self) -> bool {
        self.app_status.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub max_connections: usize,
    // Keep-alive duration in seconds
    pub keep_alive_seconds: u64,
    // Client timeout for reading payload/body in seconds
    pub client_timeout_seconds: u64,
    pub client_shutdown_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JWT signing algorithm name, e.g. RS256 or HS256
    pub algorithm: String,
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
    pub jwt_secret: Option<String>,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_minutes: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allowed_hosts: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            app: AppSettings {
                project_name: required("PROJECT_NAME")?,
                app_status: env::var("APP_STATUS").unwrap_or_else(|_| "development".to_string()),
            },
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: parsed("PORT", 8000, "port number")?,
                workers: parsed("WORKERS", 4, "number")?,
                max_connections: parsed("MAX_CONNECTIONS", 1000, "number")?,
                keep_alive_seconds: parsed("KEEP_ALIVE_SECONDS", 75, "number")?,
                client_timeout_seconds: parsed("CLIENT_TIMEOUT_SECONDS", 30, "number")?,
                client_shutdown_seconds: parsed("CLIENT_SHUTDOWN_SECONDS", 5, "number")?,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed("DB_MAX_CONNECTIONS", 10, "number")?,
            },
            auth: AuthConfig {
                algorithm: env::var("ALGORITHM").unwrap_or_else(|_| "RS256".to_string()),
                private_key_path: env::var("PRIVATE_KEY_PATH").ok(),
                public_key_path: env::var("PUBLIC_KEY_PATH").ok(),
                jwt_secret: env::var("JWT_SECRET").ok(),
                access_token_expire_minutes: parsed("ACCESS_TOKEN_EXPIRE_MINUTES", 30, "number")?,
                refresh_token_expire_minutes: parsed("REFRESH_TOKEN_EXPIRE_MINUTES", 10080, "number")?,
                bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST, "number")?,
            },
            security: SecurityConfig {
                allowed_hosts: parse_list(&env::var("ALLOWED_HOSTS").unwrap_or_else(|_| "*".to_string())),
                allowed_origins: parse_list(&env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string())),
                rate_limit_requests: parsed("RATE_LIMIT_REQUESTS", 100, "number")?,
                rate_limit_window_seconds: parsed("RATE_LIMIT_WINDOW_SECONDS", 60, "number")?,
                max_request_size_bytes: parsed("MAX_REQUEST_SIZE_BYTES", 10_485_760, "number")?, // 10MB
            },
            logging: LoggingConfig {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                directory: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            },
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, expected, value }),
        Err(_) => Ok(default),
    }
}

/// Parse a list setting given either as a JSON array (`["a","b"]`) or a
/// comma-separated string (`a,b`).
pub fn parse_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
            return items;
        }
    }

    trimmed
        .split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
