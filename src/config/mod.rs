use serde::Serialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::auth::GateConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConfig {
    pub master_dsn: String,
    /// Reads go here when set, otherwise to the master.
    pub replica_dsn: Option<String>,
    pub master_max_connections: u32,
    pub replica_max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    /// Upper bound for resolving the geo references of one response.
    pub aggregation_timeout_ms: u64,
    /// Routes of one listing aggregated at the same time.
    pub aggregation_concurrency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub app_secret: String,
    /// Enables the signature freshness check.
    pub strict_mode: bool,
    pub max_signature_age_secs: u64,
    pub signed_param_prefix: Option<String>,
    pub exempt_path_prefixes: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("ADDRESS") {
            self.server.address = v;
        }

        // Database overrides
        if let Ok(v) = env::var("MASTER_DSN") {
            self.database.master_dsn = v;
        }
        if let Ok(v) = env::var("REPLICA_DSN") {
            self.database.replica_dsn = Some(v).filter(|dsn| !dsn.trim().is_empty());
        }
        if let Ok(v) = env::var("MASTER_MAX_OPEN") {
            self.database.master_max_connections = v.parse().unwrap_or(self.database.master_max_connections);
        }
        if let Ok(v) = env::var("REPLICA_MAX_OPEN") {
            self.database.replica_max_connections = v.parse().unwrap_or(self.database.replica_max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("API_AGGREGATION_TIMEOUT_MS") {
            self.api.aggregation_timeout_ms = v.parse().unwrap_or(self.api.aggregation_timeout_ms);
        }
        if let Ok(v) = env::var("API_AGGREGATION_CONCURRENCY") {
            self.api.aggregation_concurrency = v.parse().unwrap_or(self.api.aggregation_concurrency);
        }

        // Security overrides
        if let Ok(v) = env::var("APP_SECRET_TOKEN") {
            self.security.app_secret = v;
        }
        if let Ok(v) = env::var("PROD_FLAG") {
            self.security.strict_mode = v.parse().unwrap_or(self.security.strict_mode);
        }
        if let Ok(v) = env::var("SECURITY_STRICT_MODE") {
            self.security.strict_mode = v.parse().unwrap_or(self.security.strict_mode);
        }
        if let Ok(v) = env::var("SECURITY_MAX_SIGNATURE_AGE_SECS") {
            self.security.max_signature_age_secs = v.parse().unwrap_or(self.security.max_signature_age_secs);
        }
        if let Ok(v) = env::var("SECURITY_SIGNED_PARAM_PREFIX") {
            self.security.signed_param_prefix = Some(v).filter(|p| !p.is_empty());
        }
        if let Ok(v) = env::var("SECURITY_EXEMPT_PATH_PREFIXES") {
            self.security.exempt_path_prefixes = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    /// Checks the settings that have no usable default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.app_secret.is_empty() {
            return Err(ConfigError::Missing("APP_SECRET_TOKEN"));
        }
        if self.database.master_dsn.is_empty() {
            return Err(ConfigError::Missing("MASTER_DSN"));
        }
        Ok(())
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            secret: self.security.app_secret.as_bytes().to_vec(),
            strict: self.security.strict_mode,
            max_age: Duration::from_secs(self.security.max_signature_age_secs),
            signed_prefix: self.security.signed_param_prefix.clone(),
            exempt_prefixes: self.security.exempt_path_prefixes.clone(),
        }
    }

    pub fn aggregation_timeout(&self) -> Duration {
        Duration::from_millis(self.api.aggregation_timeout_ms)
    }

    /// At least one, and never more than the read pool can serve at once.
    pub fn aggregation_concurrency(&self) -> usize {
        let pool = if self.database.replica_dsn.is_some() {
            self.database.replica_max_connections
        } else {
            self.database.master_max_connections
        };
        self.api
            .aggregation_concurrency
            .clamp(1, usize::try_from(pool.max(1)).unwrap_or(usize::MAX))
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                address: "0.0.0.0:8080".to_string(),
            },
            database: DatabaseConfig {
                master_dsn: String::new(),
                replica_dsn: None,
                master_max_connections: 6,
                replica_max_connections: 6,
                connection_timeout: 30,
            },
            api: ApiConfig {
                aggregation_timeout_ms: 10_000,
                aggregation_concurrency: 3,
            },
            security: SecurityConfig {
                app_secret: String::new(),
                strict_mode: false,
                max_signature_age_secs: 60 * 60,
                signed_param_prefix: Some("vk_".to_string()),
                exempt_path_prefixes: default_exempt_prefixes(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                address: "0.0.0.0:8080".to_string(),
            },
            database: DatabaseConfig {
                master_dsn: String::new(),
                replica_dsn: None,
                master_max_connections: 10,
                replica_max_connections: 10,
                connection_timeout: 10,
            },
            api: ApiConfig {
                aggregation_timeout_ms: 5_000,
                aggregation_concurrency: 5,
            },
            security: SecurityConfig {
                app_secret: String::new(),
                strict_mode: true,
                max_signature_age_secs: 60 * 60,
                signed_param_prefix: Some("vk_".to_string()),
                exempt_path_prefixes: default_exempt_prefixes(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                address: "0.0.0.0:8080".to_string(),
            },
            database: DatabaseConfig {
                master_dsn: String::new(),
                replica_dsn: None,
                master_max_connections: 20,
                replica_max_connections: 30,
                connection_timeout: 5,
            },
            api: ApiConfig {
                aggregation_timeout_ms: 3_000,
                aggregation_concurrency: 15,
            },
            security: SecurityConfig {
                app_secret: String::new(),
                strict_mode: true,
                max_signature_age_secs: 60 * 60,
                signed_param_prefix: Some("vk_".to_string()),
                exempt_path_prefixes: default_exempt_prefixes(),
            },
        }
    }
}

fn default_exempt_prefixes() -> Vec<String> {
    vec!["/swagger/".to_string(), "/health".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.security.strict_mode);
        assert_eq!(config.security.max_signature_age_secs, 3600);
        assert!(config.database.replica_dsn.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.strict_mode);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.security.signed_param_prefix.as_deref(), Some("vk_"));
    }

    #[test]
    fn validate_requires_secret_and_dsn() {
        let mut config = AppConfig::development();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("APP_SECRET_TOKEN"))));

        config.security.app_secret = "secret".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("MASTER_DSN"))));

        config.database.master_dsn = "postgres://localhost/outing".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn aggregation_concurrency_fits_the_read_pool() {
        let mut config = AppConfig::production();
        assert_eq!(config.aggregation_concurrency(), 15);

        config.api.aggregation_concurrency = 100;
        assert_eq!(config.aggregation_concurrency(), 20);

        config.database.replica_dsn = Some("postgres://replica/outing".to_string());
        assert_eq!(config.aggregation_concurrency(), 30);

        config.api.aggregation_concurrency = 0;
        assert_eq!(config.aggregation_concurrency(), 1);
    }

    #[test]
    fn serialized_config_omits_the_secret() {
        let mut config = AppConfig::development();
        config.security.app_secret = "do-not-log".to_string();

        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("do-not-log"));
        assert!(rendered.contains("max_signature_age_secs"));
    }

    #[test]
    fn gate_config_carries_security_section() {
        let mut config = AppConfig::production();
        config.security.app_secret = "s3cret".to_string();

        let gate = config.gate_config();
        assert_eq!(gate.secret, b"s3cret".to_vec());
        assert!(gate.strict);
        assert_eq!(gate.max_age, Duration::from_secs(3600));
        assert!(gate.exempt_prefixes.iter().any(|p| p == "/swagger/"));
    }
}
