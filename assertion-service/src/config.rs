//! Configuration for the assertion service, loaded the way `acton_service::config`
//! loads its own `Config`: environment variables override a TOML file which
//! overrides built-in defaults.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub graph: GraphConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// One of `test`, `development`, `production`. Controls root-purity
    /// assertion severity and the `X-Test-User-Id` auth bypass.
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// Gates `GET /health/jobs`; returns 404 when false.
    #[serde(default = "default_false")]
    pub health_endpoints_enabled: bool,

    /// Allowed CORS origin for the frontend collaborator.
    #[serde(default)]
    pub frontend_origin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,

    #[serde(default = "default_graph_db")]
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_cleanup_interval_hours")]
    pub draft_cleanup_interval_hours: u64,

    #[serde(default = "default_cleanup_interval_hours")]
    pub idempotency_cleanup_interval_hours: u64,

    #[serde(default = "default_outbox_cleanup_interval_hours")]
    pub outbox_cleanup_interval_hours: u64,
}

fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_environment() -> Environment {
    Environment::Development
}
fn default_false() -> bool {
    false
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connection_timeout() -> u64 {
    10
}
fn default_graph_db() -> String {
    "neo4j".to_string()
}
fn default_cleanup_interval_hours() -> u64 {
    12
}
fn default_outbox_cleanup_interval_hours() -> u64 {
    24
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                port: default_port(),
                log_level: default_log_level(),
                environment: default_environment(),
                health_endpoints_enabled: default_false(),
                frontend_origin: None,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/assertion_service".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connection_timeout_secs: default_connection_timeout(),
            },
            graph: GraphConfig {
                uri: "bolt://localhost:7687".to_string(),
                user: "neo4j".to_string(),
                password: String::new(),
                database: default_graph_db(),
            },
            jobs: JobsConfig {
                draft_cleanup_interval_hours: default_cleanup_interval_hours(),
                idempotency_cleanup_interval_hours: default_cleanup_interval_hours(),
                outbox_cleanup_interval_hours: default_outbox_cleanup_interval_hours(),
            },
        }
    }
}

impl Config {
    /// Load configuration: defaults < `./config.toml` < `ASSERTIONS_`-prefixed
    /// environment variables, mirroring `acton_service::config::Config::load`.
    pub fn load() -> AppResult<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("ASSERTIONS_").split("__"));

        figment
            .extract()
            .map_err(|e| AppError::Internal(format!("configuration error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.service.port, 8080);
        assert!(!cfg.service.health_endpoints_enabled);
        assert_eq!(cfg.service.environment, Environment::Development);
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("ASSERTIONS_SERVICE__PORT", "9999");
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("ASSERTIONS_").split("__"));
        let cfg: Config = figment.extract().expect("config should parse");
        assert_eq!(cfg.service.port, 9999);
        std::env::remove_var("ASSERTIONS_SERVICE__PORT");
    }
}
