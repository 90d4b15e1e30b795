use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAYMENT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Application configuration, loaded once at startup and shared immutably
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Secret API key for follow-up reads against the payment provider
    #[serde(default)]
    pub payment_api_key: Option<String>,

    /// Payment provider REST base URL
    #[serde(default = "default_payment_api_base_url")]
    #[validate(custom = "validate_http_url")]
    pub payment_api_base_url: String,

    /// Per-request timeout for payment provider calls (seconds)
    #[serde(default = "default_payment_request_timeout_secs")]
    pub payment_request_timeout_secs: u64,

    /// Webhook secret for verifying payment provider callbacks.
    /// When absent, webhook bodies are parsed unverified (local development only).
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Webhook timestamp tolerance (seconds)
    #[serde(default = "default_webhook_tolerance_secs")]
    pub payment_webhook_tolerance_secs: u64,

    /// Store name used in notification subjects
    #[serde(default = "default_store_name")]
    pub store_name: String,

    /// Sender address for outbound notifications
    #[serde(default = "default_mail_from")]
    #[validate(email)]
    pub mail_from: String,

    /// Recipient of new-order admin notifications
    #[serde(default)]
    pub admin_notification_email: Option<String>,

    /// HTTP relay that performs the actual email delivery; logs only when unset
    #[serde(default)]
    pub mail_relay_url: Option<String>,

    /// Maximum concurrent notification sends
    #[serde(default = "default_notification_workers")]
    #[validate(range(min = 1, max = 64))]
    pub notification_workers: usize,

    /// Bounded notification queue capacity
    #[serde(default = "default_notification_queue_capacity")]
    #[validate(range(min = 1))]
    pub notification_queue_capacity: usize,

    /// Default currency code for orders whose session carries none
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            payment_api_key: None,
            payment_api_base_url: default_payment_api_base_url(),
            payment_request_timeout_secs: default_payment_request_timeout_secs(),
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: default_webhook_tolerance_secs(),
            store_name: default_store_name(),
            mail_from: default_mail_from(),
            admin_notification_email: None,
            mail_relay_url: None,
            notification_workers: default_notification_workers(),
            notification_queue_capacity: default_notification_queue_capacity(),
            default_currency: default_currency(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn payment_request_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_request_timeout_secs)
    }

    /// Webhook secret, ignoring blank values
    pub fn webhook_secret(&self) -> Option<&str> {
        self.payment_webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() && self.webhook_secret().is_none() {
            let mut err = ValidationError::new("payment_webhook_secret_required");
            err.message = Some(
                "Unverified webhook parsing is only allowed outside production. Set APP__PAYMENT_WEBHOOK_SECRET."
                    .into(),
            );
            errors.add("payment_webhook_secret", err);
        }

        if let Some(url) = self.mail_relay_url.as_deref() {
            if let Err(err) = validate_http_url(url) {
                errors.add("mail_relay_url", err);
            }
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_payment_api_base_url() -> String {
    DEFAULT_PAYMENT_API_BASE_URL.to_string()
}

fn default_payment_request_timeout_secs() -> u64 {
    10
}

fn default_webhook_tolerance_secs() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}

fn default_store_name() -> String {
    "Storefront".to_string()
}

fn default_mail_from() -> String {
    "orders@storefront.local".to_string()
}

fn default_notification_workers() -> usize {
    2
}

fn default_notification_queue_capacity() -> usize {
    256
}

fn default_currency() -> String {
    "usd".to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        let mut err = ValidationError::new("http_url");
        err.message = Some("Must be an http:// or https:// URL".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    if app_config.webhook_secret().is_none() {
        info!("No webhook secret configured; payment webhooks will be parsed without signature verification");
    }

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn production_requires_webhook_secret() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn production_with_secret_passes() {
        let mut cfg = base_config();
        cfg.payment_webhook_secret = Some("whsec_test".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let mut cfg = base_config();
        cfg.payment_webhook_secret = Some("   ".into());
        assert!(cfg.webhook_secret().is_none());
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn development_allows_unverified_webhooks() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn relay_url_must_be_http() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.mail_relay_url = Some("smtp://mail.local".into());
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn zero_workers_fail_validation() {
        let mut cfg = base_config();
        cfg.notification_workers = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate().is_err());
    }
}
