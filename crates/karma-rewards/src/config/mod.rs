use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub rewards: RewardDataConfig,
    pub store: RewardStoreConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            rewards: RewardDataConfig::from_env()?,
            store: RewardStoreConfig::from_env()?,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Locations of the static reward data loaded once at startup.
#[derive(Debug, Clone)]
pub struct RewardDataConfig {
    pub engine_config_path: PathBuf,
    pub conditions_path: PathBuf,
    pub scorer_path: PathBuf,
}

impl RewardDataConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            engine_config_path: path_var("REWARD_CONFIG_PATH", "config/reward_config.json")?,
            conditions_path: path_var("REWARD_CONDITIONS_PATH", "config/conditions.csv")?,
            scorer_path: path_var("REWARD_SCORER_PATH", "config/scorer.json")?,
        })
    }
}

/// Where granted rewards are kept and how long they are retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardStoreConfig {
    pub backend: StoreBackend,
    pub retention_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local ledger, lost on restart.
    Memory,
    /// SQLite database addressed by a `sqlite:` URL.
    Sqlite(String),
}

impl RewardStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("REWARD_STORE_URL")
            .unwrap_or_else(|_| "sqlite://karma_rewards.db".to_string());
        let url = url.trim();
        let backend = if url.eq_ignore_ascii_case("memory") {
            StoreBackend::Memory
        } else if url.starts_with("sqlite:") {
            StoreBackend::Sqlite(url.to_string())
        } else {
            return Err(ConfigError::InvalidStoreUrl);
        };

        let retention_days = env::var("REWARD_RETENTION_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|days| *days > 0)
            .ok_or(ConfigError::InvalidRetention)?;

        Ok(Self {
            backend,
            retention_days,
        })
    }
}

fn path_var(name: &'static str, default: &str) -> Result<PathBuf, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyPath { variable: name }),
        Ok(value) => Ok(PathBuf::from(value.trim())),
        Err(_) => Ok(PathBuf::from(default)),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    EmptyPath { variable: &'static str },
    InvalidStoreUrl,
    InvalidRetention,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::EmptyPath { variable } => {
                write!(f, "{variable} must not be empty when set")
            }
            ConfigError::InvalidStoreUrl => {
                write!(f, "REWARD_STORE_URL must be 'memory' or a sqlite: URL")
            }
            ConfigError::InvalidRetention => {
                write!(f, "REWARD_RETENTION_DAYS must be a positive number of days")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::EmptyPath { .. }
            | ConfigError::InvalidStoreUrl
            | ConfigError::InvalidRetention => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
