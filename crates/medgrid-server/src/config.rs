use std::net::SocketAddr;
use std::time::Duration;

use medgrid_db_memory::StorageConfig;
use serde::{Deserialize, Serialize};

/// Shortest accepted token signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub hospital: HospitalSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.server.port == 0 {
            return invalid("server.port must be > 0");
        }
        if self.server.body_limit_bytes == 0 {
            return invalid("server.body_limit_bytes must be > 0");
        }
        if self.storage.options.max_commit_attempts == 0 {
            return invalid("storage.max_commit_attempts must be > 0");
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return invalid("auth.jwt_secret must be set");
        }
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if self.auth.token_ttl_secs <= 0 {
            return invalid("auth.token_ttl_secs must be > 0");
        }
        if let Some(admin) = &self.auth.bootstrap_admin
            && (admin.email.trim().is_empty() || admin.password.is_empty())
        {
            return invalid("auth.bootstrap_admin requires email and password");
        }
        if self.notifications.session_buffer == 0 {
            return invalid("notifications.session_buffer must be > 0");
        }
        if self.notifications.ping_interval_secs == 0 {
            return invalid("notifications.ping_interval_secs must be > 0");
        }
        if self.hospital.default_id.trim().is_empty() {
            return invalid("hospital.default_id must not be empty");
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.notifications.ping_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Browser origins allowed by CORS. Empty allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://localhost:5173".into(),
        "http://localhost:5174".into(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret. Required.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
    /// Administrator account created at startup when absent.
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn default_token_ttl() -> i64 {
    8 * 60 * 60
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl(),
            bootstrap_admin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub full_name: String,
}

fn default_admin_name() -> String {
    "Administrator".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Undelivered notifications held per session before it starts missing updates.
    #[serde(default = "default_session_buffer")]
    pub session_buffer: usize,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

fn default_session_buffer() -> usize {
    medgrid_notifications::hub::DEFAULT_SESSION_BUFFER
}
fn default_ping_interval() -> u64 {
    30
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            session_buffer: default_session_buffer(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalSettings {
    /// Hospital assigned to departments created without one.
    #[serde(default = "default_hospital_id")]
    pub default_id: String,
}

fn default_hospital_id() -> String {
    "default".into()
}

impl Default for HospitalSettings {
    fn default() -> Self {
        Self {
            default_id: default_hospital_id(),
        }
    }
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default file looked up when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "medgrid.toml";

    /// Loads defaults, then the TOML file if it exists, then `MEDGRID__*`
    /// environment overrides, and validates the result.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // e.g. MEDGRID__SERVER__PORT=5001
        builder = builder.add_source(
            Environment::with_prefix("MEDGRID")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: AppConfig = builder.build()?.try_deserialize()?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.auth.jwt_secret = "x".repeat(MIN_JWT_SECRET_LEN);
        cfg
    }

    #[test]
    fn defaults_match_deployment() {
        let cfg = valid();
        cfg.validate().unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.server.body_limit_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.addr().port(), 5000);
        assert_eq!(cfg.hospital.default_id, "default");
    }

    #[test]
    fn secret_is_required() {
        let cfg = AppConfig::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(m)) if m.contains("jwt_secret")));

        let mut cfg = valid();
        cfg.auth.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_values_rejected() {
        let mut cfg = valid();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.notifications.session_buffer = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }
}
