use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Which storage backend the service runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

/// Payment provider (Razorpay) credentials
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub store: StoreKind,
    pub log_level: String,
    pub http_port: u16,
    pub environment: String,
    pub access_token_secret: String,
    pub payment: PaymentConfig,
    pub settlement_concurrency: usize,
    pub audit_log_dir: PathBuf,
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let acquire_timeout_secs = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_secs = env::var("DATABASE_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(600); // 10 minutes

        let max_lifetime_secs = env::var("DATABASE_MAX_LIFETIME_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1800); // 30 minutes

        let test_before_acquire = env::var("DATABASE_TEST_BEFORE_ACQUIRE")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(true);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/yesno".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        Self {
            key_id: env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            key_secret: env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            api_base: env::var("RAZORPAY_API_BASE")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
        }
    }

    /// Callback signatures are keyed by `key_secret`; only development may run without one
    pub fn validate(&self, environment: &str) -> Result<(), String> {
        if self.key_secret.is_empty() && environment != "development" {
            return Err("RAZORPAY_KEY_SECRET environment variable is required".to_string());
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            key_secret: String::new(),
            api_base: "https://api.razorpay.com/v1".to_string(),
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let store = match env::var("STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreKind::Postgres,
            "memory" => StoreKind::Memory,
            other => {
                return Err(format!(
                    "Invalid STORE: {}. Must be one of: [\"postgres\", \"memory\"]",
                    other
                ))
            }
        };

        // The in-memory store needs no database, so only require one for postgres
        let database = match store {
            StoreKind::Postgres => DatabaseConfig::from_env()?,
            StoreKind::Memory => DatabaseConfig::default(),
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let http_port = env::var("HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }
        let environment = environment.to_lowercase();

        let access_token_secret = match env::var("ACCESS_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment == "development" => "development-access-token-secret".to_string(),
            _ => return Err("ACCESS_TOKEN_SECRET environment variable is required".to_string()),
        };

        let settlement_concurrency = env::var("SETTLEMENT_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8);

        if settlement_concurrency == 0 {
            return Err("SETTLEMENT_CONCURRENCY must be greater than 0".to_string());
        }

        let payment = PaymentConfig::from_env();
        payment.validate(&environment)?;

        let audit_log_dir = PathBuf::from(
            env::var("AUDIT_LOG_DIR").unwrap_or_else(|_| "./logs".to_string()),
        );

        Ok(Self {
            database,
            store,
            log_level: log_level.to_lowercase(),
            http_port,
            environment,
            access_token_secret,
            payment,
            settlement_concurrency,
            audit_log_dir,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            store: StoreKind::Postgres,
            log_level: "info".to_string(),
            http_port: 8080,
            environment: "development".to_string(),
            access_token_secret: "development-access-token-secret".to_string(),
            payment: PaymentConfig::default(),
            settlement_concurrency: 8,
            audit_log_dir: PathBuf::from("./logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 30);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.settlement_concurrency, 8);
        assert_eq!(config.store, StoreKind::Postgres);
        assert!(config.is_development());
        assert!(!config.is_production());
    }

    #[test]
    fn test_payment_config_default_points_at_razorpay() {
        let config = PaymentConfig::default();
        assert!(config.api_base.starts_with("https://api.razorpay.com"));
        assert!(config.key_secret.is_empty());
    }

    #[test]
    fn test_payment_secret_required_outside_development() {
        let config = PaymentConfig::default();
        assert!(config.validate("development").is_ok());
        assert!(config.validate("staging").is_err());
        assert!(config.validate("production").is_err());

        let config = PaymentConfig {
            key_secret: "secret".to_string(),
            ..PaymentConfig::default()
        };
        assert!(config.validate("production").is_ok());
    }
}
