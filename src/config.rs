use crate::error::{AppError, Result};

/// Minimum characters for a payout / collection phone number.
pub const MIN_PHONE_LEN: usize = 10;

/// Capacity of the settlement command channel.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Balance granted to the seeded demo account.
pub const DEMO_USER_BALANCE: f64 = 1250.0;

/// Starting balance for newly registered accounts.
pub const NEW_USER_BALANCE: f64 = 100.0;

/// Seeded demo user credentials.
pub const DEMO_USER_EMAIL: &str = "user@example.com";
pub const DEMO_USER_NAME: &str = "Demo User";
pub const DEMO_USER_PASSWORD: &str = "password";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Admin dashboard credentials (ADMIN_USERNAME / ADMIN_PASSWORD).
    pub admin_username: String,
    pub admin_password: String,
    /// Simulated auth processing delay in milliseconds (AUTH_DELAY_MS).
    pub auth_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| {
                    AppError::Config("API_PORT must be a valid port number".to_string())
                })?,
            admin_username: std::env::var("ADMIN_USERNAME")
                .unwrap_or_else(|_| "admin".to_string()),
            admin_password: std::env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin123".to_string()),
            auth_delay_ms: std::env::var("AUTH_DELAY_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse::<u64>()
                .unwrap_or(250),
        })
    }
}
