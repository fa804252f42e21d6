use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub use reqwest::Url;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the portal service and CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub backend: BackendConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let raw_url =
            env::var("PORTAL_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        let base_url =
            Url::parse(raw_url.trim()).map_err(|err| ConfigError::InvalidBackendUrl {
                value: raw_url.clone(),
                reason: err.to_string(),
            })?;

        let request_timeout_secs = env::var("PORTAL_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout)?;

        let token = env::var("PORTAL_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            backend: BackendConfig {
                base_url,
                request_timeout_secs,
                token,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the internship management REST backend and the session used against it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub request_timeout_secs: u64,
    /// Bearer token for one-shot CLI commands. The HTTP service forwards per-request tokens instead.
    pub token: Option<String>,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Explicit token first, then `PORTAL_TOKEN`.
    pub fn resolve_token(&self, explicit: Option<String>) -> Result<String, ConfigError> {
        explicit
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .or_else(|| self.token.clone())
            .ok_or(ConfigError::MissingToken)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidBackendUrl {
        value: String,
        reason: String,
    },
    InvalidTimeout,
    MissingToken,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBackendUrl { value, reason } => {
                write!(f, "PORTAL_BACKEND_URL '{value}' is not an absolute URL ({reason})")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "PORTAL_REQUEST_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::MissingToken => {
                write!(f, "a bearer token is required (pass --token or set PORTAL_TOKEN)")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBackendUrl { .. }
            | ConfigError::InvalidTimeout
            | ConfigError::MissingToken => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("PORTAL_BACKEND_URL");
        env::remove_var("PORTAL_REQUEST_TIMEOUT_SECS");
        env::remove_var("PORTAL_TOKEN");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.backend.base_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.backend.request_timeout(), Duration::from_secs(10));
        assert!(config.backend.token.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_relative_backend_url() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PORTAL_BACKEND_URL", "api/student");
        let err = AppConfig::load().expect_err("relative url rejected");
        assert!(matches!(err, ConfigError::InvalidBackendUrl { .. }));
        reset_env();
    }

    #[test]
    fn rejects_zero_timeout_and_blank_token() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PORTAL_TOKEN", "   ");
        let config = AppConfig::load().expect("blank token is ignored");
        assert!(config.backend.token.is_none());

        env::set_var("PORTAL_REQUEST_TIMEOUT_SECS", "0");
        let err = AppConfig::load().expect_err("zero timeout rejected");
        assert!(matches!(err, ConfigError::InvalidTimeout));
        reset_env();
    }

    #[test]
    fn explicit_token_wins_over_environment() {
        let backend = BackendConfig {
            base_url: Url::parse(DEFAULT_BACKEND_URL).expect("valid url"),
            request_timeout_secs: 10,
            token: Some("from-env".to_string()),
        };

        assert_eq!(
            backend.resolve_token(Some("cli".to_string())).expect("token"),
            "cli"
        );
        assert_eq!(
            backend.resolve_token(Some(" ".to_string())).expect("token"),
            "from-env"
        );

        let anonymous = BackendConfig {
            token: None,
            ..backend
        };
        assert!(matches!(
            anonymous.resolve_token(None),
            Err(ConfigError::MissingToken)
        ));
    }
}
