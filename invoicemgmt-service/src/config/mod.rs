//! Configuration module for invoicemgmt-service.

use service_core::config as core_config;
use service_core::error::AppError;
use service_core::grpc::BillItemClientConfig;
use service_core::retry::RetryConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InvoiceMgmtConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub bill_item_service: BillItemServiceConfig,
    pub retry: RetrySettings,
    /// Enabled feature flag names.
    pub features: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct BillItemServiceConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub bulk_issue_max_attempts: u32,
    pub adjustment_max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            bulk_issue_max_attempts: 20,
            adjustment_max_attempts: 20,
            delay_ms: 100,
        }
    }
}

impl RetrySettings {
    pub fn bulk_issue(&self) -> RetryConfig {
        RetryConfig::fixed(
            self.bulk_issue_max_attempts,
            Duration::from_millis(self.delay_ms),
        )
    }

    pub fn adjustment(&self) -> RetryConfig {
        RetryConfig::fixed(
            self.adjustment_max_attempts,
            Duration::from_millis(self.delay_ms),
        )
    }
}

impl BillItemServiceConfig {
    pub fn client_config(&self) -> BillItemClientConfig {
        BillItemClientConfig {
            endpoint: self.endpoint.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..Default::default()
        }
    }
}

/// Read an environment variable, falling back to `default` when it is unset
/// or does not parse.
fn get_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl InvoiceMgmtConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let defaults = RetrySettings::default();

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "invoicemgmt-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", 2),
            },
            bill_item_service: BillItemServiceConfig {
                endpoint: env::var("BILL_ITEM_SERVICE_ENDPOINT")
                    .unwrap_or_else(|_| "http://order-service:50061".to_string()),
                connect_timeout_secs: get_env("BILL_ITEM_SERVICE_CONNECT_TIMEOUT_SECS", 5),
                request_timeout_secs: get_env("BILL_ITEM_SERVICE_REQUEST_TIMEOUT_SECS", 30),
            },
            retry: RetrySettings {
                bulk_issue_max_attempts: get_env(
                    "BULK_ISSUE_MAX_ATTEMPTS",
                    defaults.bulk_issue_max_attempts,
                ),
                adjustment_max_attempts: get_env(
                    "ADJUSTMENT_MAX_ATTEMPTS",
                    defaults.adjustment_max_attempts,
                ),
                delay_ms: get_env("RETRY_DELAY_MS", defaults.delay_ms),
            },
            features: parse_flags(&env::var("FEATURE_FLAGS").unwrap_or_default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_retry_defaults() {
        let retry = RetrySettings::default();
        assert_eq!(retry.bulk_issue().max_attempts, 20);
        assert_eq!(retry.adjustment().max_attempts, 20);
        assert_eq!(
            retry.bulk_issue().backoff_duration(3),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_parse_flags() {
        assert_eq!(
            parse_flags(" ENABLE_A, ,ENABLE_B "),
            vec!["ENABLE_A".to_string(), "ENABLE_B".to_string()]
        );
        assert!(parse_flags("").is_empty());
    }

    #[test]
    #[serial]
    fn test_database_url_is_required() {
        env::remove_var("DATABASE_URL");
        let err = InvoiceMgmtConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL is required"));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        env::set_var("DATABASE_URL", "postgres://localhost/invoicemgmt");
        env::set_var("BULK_ISSUE_MAX_ATTEMPTS", "5");
        env::set_var("RETRY_DELAY_MS", "not-a-number");
        env::set_var(
            "FEATURE_FLAGS",
            "ENABLE_PAYMENT_SEQUENCE_NUMBER_MANUAL_SETTING",
        );

        let config = InvoiceMgmtConfig::from_env().unwrap();
        assert_eq!(config.retry.bulk_issue_max_attempts, 5);
        assert_eq!(config.retry.adjustment_max_attempts, 20);
        assert_eq!(config.retry.delay_ms, 100);
        assert_eq!(config.features.len(), 1);

        env::remove_var("DATABASE_URL");
        env::remove_var("BULK_ISSUE_MAX_ATTEMPTS");
        env::remove_var("RETRY_DELAY_MS");
        env::remove_var("FEATURE_FLAGS");
    }
}
