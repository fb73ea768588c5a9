// src/config.rs - Configuration for the dispatch backend and scan stations
use serde::Deserialize;
use std::env;
use anyhow::{Context, Result};
use rand::{thread_rng, Rng, distributions::Alphanumeric};
use std::path::Path;
use std::fs;

use crate::scan::session::BinSizePolicy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub scanner: ScannerConfig,
    pub station: StationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration_hours: i64,
    pub bcrypt_cost: u32,
    pub max_login_attempts: u32,
    pub lockout_duration_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// Scanner input handling shared by every station.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    pub statistics_debounce_ms: u64,
    /// Lines closer together than this belong to one QR payload.
    pub qr_burst_window_ms: u64,
    pub machine_barcode_length: usize,
    pub bin_size_policy: BinSizePolicy,
}

/// How a scan station reaches the backend.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StationConfig {
    pub base_url: String,
    pub username: String,
    pub password: Option<String>,
    pub request_timeout_secs: u64,
}

// Dummy defaults for tests (no ENV read here)
impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dummy_secret_for_tests_only_32_chars!".to_string(),
            token_expiration_hours: 24,
            bcrypt_cost: 10,
            max_login_attempts: 5,
            lockout_duration_minutes: 15,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "dispatch.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
            max_request_size: 1024 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            statistics_debounce_ms: 2000,
            qr_burst_window_ms: 150,
            machine_barcode_length: 32,
            bin_size_policy: BinSizePolicy::KeepFirst,
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            username: "operator".to_string(),
            password: None,
            request_timeout_secs: 10,
        }
    }
}

// Secure JWT secret for first start
pub fn generate_jwt_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

impl Config {
    /// `.env`, then the optional `CONFIG_FILE` TOML, then environment overrides.
    pub fn load() -> Result<Config> {
        load_env_file()?;

        let mut config = if let Ok(config_file) = env::var("CONFIG_FILE") {
            let config_str = fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {}", config_file))?;
            Config::from_toml_str(&config_str)
                .with_context(|| format!("Failed to parse config file: {}", config_file))?
        } else {
            Config::default()
        };

        config.apply_overrides(|key| env::var(key).ok())?;

        config.validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Config> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BIND_ADDRESS") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DISPATCH_PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(workers) = lookup("DISPATCH_WORKERS").and_then(|v| v.parse::<usize>().ok()) {
            self.server.workers = Some(workers);
        }
        if let Some(jwt_secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = jwt_secret;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.security.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(url) = lookup("STATION_BASE_URL") {
            self.station.base_url = url;
        }
        if let Some(username) = lookup("STATION_USERNAME") {
            self.station.username = username;
        }
        if let Some(password) = lookup("STATION_PASSWORD") {
            self.station.password = Some(password);
        }
        if let Some(policy) = lookup("SCANNER_BIN_SIZE_POLICY") {
            self.scanner.bin_size_policy = policy
                .parse::<BinSizePolicy>()
                .with_context(|| format!("Unknown bin size policy '{}'", policy))?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long (current: {})",
                self.auth.jwt_secret.len()
            ));
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(anyhow::anyhow!(
                "max_connections ({}) must be >= min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            ));
        }

        if self.scanner.machine_barcode_length == 0 {
            anyhow::bail!("scanner.machine_barcode_length must be positive");
        }

        if self.scanner.statistics_debounce_ms == 0 {
            anyhow::bail!("scanner.statistics_debounce_ms must be positive");
        }

        Ok(())
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.auth.jwt_secret == AuthConfig::default().jwt_secret
    }

    pub fn is_production(&self) -> bool {
        env::var("DISPATCH_ENV").map(|v| v == "production").unwrap_or(false)
    }

    pub fn print_startup_info(&self) {
        log::info!("Dispatch tracker starting up");
        log::info!("Server: {}:{}", self.server.host, self.server.port);
        log::info!("Database: {}", self.database.url);
        log::info!("Auth: JWT ({}h expiration)", self.auth.token_expiration_hours);
        log::info!("Logging: {} level", self.logging.level);
        log::info!(
            "Scanner: {} ms statistics debounce, bin size policy {}",
            self.scanner.statistics_debounce_ms, self.scanner.bin_size_policy
        );

        if !self.is_production() {
            log::warn!("Running in development mode");
        }

        if self.security.require_https {
            log::info!("HTTPS enforcement enabled");
        } else if self.is_production() {
            log::warn!("HTTPS not required in production mode");
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}
