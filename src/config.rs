//! Configuration handling for the benchmark applications.
//!
//! Everything is read once at startup from CLI arguments with environment
//! fallbacks. The `Database` and `ConnectionString` variables keep the names
//! benchmark drivers already set.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool configuration options.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10 for PostgreSQL, 1 for SQLite)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
}

impl PoolOptions {
    /// Get max_connections with default value based on database type.
    pub fn max_connections_or_default(&self, is_sqlite: bool) -> u32 {
        self.max_connections.unwrap_or(if is_sqlite {
            DEFAULT_MAX_CONNECTIONS_SQLITE
        } else {
            DEFAULT_MAX_CONNECTIONS
        })
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    pub fn acquire_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        )
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let Some(min) = self.min_connections {
            if min == 0 {
                return Err("min_connections must be greater than 0".to_string());
            }
            if let Some(max) = self.max_connections {
                if min > max {
                    return Err(format!(
                        "min_connections ({}) cannot exceed max_connections ({})",
                        min, max
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Which sample application to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AppKind {
    /// Server-rendered person form
    #[default]
    Views,
    /// JSON pet store API
    PetStore,
}

impl AppKind {
    /// File used for the embedded database when `--sqlite-path` is not given.
    pub fn default_sqlite_file(&self) -> &'static str {
        match self {
            Self::Views => "BasicViews.db",
            Self::PetStore => "BasicApi.db",
        }
    }
}

impl std::fmt::Display for AppKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Views => write!(f, "views"),
            Self::PetStore => write!(f, "pet-store"),
        }
    }
}

/// Configuration for the benchmark applications.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "benchapps",
    about = "Benchmark sample applications: pet store API and server-rendered views",
    version,
    author
)]
pub struct Config {
    /// Application to serve
    #[arg(long, value_enum, default_value = "views", env = "BENCH_APP")]
    pub app: AppKind,

    /// Database provider: unset for SQLite, "None" for no database, "PostgreSql"
    #[arg(long, env = "Database")]
    pub database: Option<String>,

    /// Connection string for the PostgreSql provider (sensitive - not logged)
    #[arg(long, env = "ConnectionString", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// SQLite file for the embedded provider
    #[arg(long, env = "BENCH_SQLITE_PATH")]
    pub sqlite_path: Option<PathBuf>,

    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "BENCH_HOST")]
    pub host: String,

    /// HTTP port to bind to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "BENCH_PORT")]
    pub port: u16,

    /// Directory containing `wwwroot`
    #[arg(long, default_value = ".", env = "BENCH_CONTENT_ROOT")]
    pub content_root: PathBuf,

    /// Maximum pooled connections
    #[arg(long, env = "BENCH_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Connection acquire timeout in seconds
    #[arg(long, env = "BENCH_ACQUIRE_TIMEOUT")]
    pub acquire_timeout: Option<u64>,

    /// Seconds to wait for in-flight requests after a shutdown signal
    #[arg(
        long,
        default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        env = "BENCH_SHUTDOWN_TIMEOUT"
    )]
    pub shutdown_timeout: u64,

    /// Bearer tokens granted the pet-store-reader scope
    #[arg(
        long = "reader-token",
        value_name = "TOKEN",
        env = "PETSTORE_READER_TOKENS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub reader_tokens: Vec<String>,

    /// Bearer tokens granted the pet-store-reader and pet-store-writer scopes
    #[arg(
        long = "writer-token",
        value_name = "TOKEN",
        env = "PETSTORE_WRITER_TOKENS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub writer_tokens: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "BENCH_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "BENCH_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            app: AppKind::Views,
            database: None,
            connection_string: None,
            sqlite_path: None,
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            content_root: PathBuf::from("."),
            max_connections: None,
            acquire_timeout: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            reader_tokens: Vec::new(),
            writer_tokens: Vec::new(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of the embedded SQLite database.
    pub fn sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.app.default_sqlite_file()))
    }

    /// Directory served as static content.
    pub fn web_root(&self) -> PathBuf {
        self.content_root.join("wwwroot")
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            acquire_timeout_secs: self.acquire_timeout,
            ..PoolOptions::default()
        }
    }

    pub fn shutdown_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.app, AppKind::Views);
        assert_eq!(config.host, DEFAULT_HTTP_HOST);
        assert_eq!(config.port, DEFAULT_HTTP_PORT);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_sqlite_path_defaults_per_app() {
        let views = Config::default();
        assert_eq!(views.sqlite_path(), PathBuf::from("BasicViews.db"));

        let api = Config {
            app: AppKind::PetStore,
            ..Config::default()
        };
        assert_eq!(api.sqlite_path(), PathBuf::from("BasicApi.db"));

        let explicit = Config {
            sqlite_path: Some(PathBuf::from("/tmp/x.db")),
            ..Config::default()
        };
        assert_eq!(explicit.sqlite_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_web_root_under_content_root() {
        let config = Config {
            content_root: PathBuf::from("/srv/app"),
            ..Config::default()
        };
        assert_eq!(config.web_root(), PathBuf::from("/srv/app/wwwroot"));
    }

    #[test]
    fn test_parse_from_args() {
        let config = Config::try_parse_from([
            "benchapps",
            "--app",
            "pet-store",
            "--database",
            "PostgreSql",
            "--connection-string",
            "Host=db;Reset On Return=true;Enlist=false",
            "--writer-token",
            "w1,w2",
        ])
        .unwrap();
        assert_eq!(config.app, AppKind::PetStore);
        assert_eq!(config.database.as_deref(), Some("PostgreSql"));
        assert_eq!(config.writer_tokens, vec!["w1", "w2"]);
    }

    #[test]
    fn test_pool_options_defaults() {
        let opts = PoolOptions::default();
        assert_eq!(opts.max_connections_or_default(false), 10);
        assert_eq!(opts.max_connections_or_default(true), 1);
        assert_eq!(opts.min_connections_or_default(), 1);
        assert_eq!(opts.idle_timeout_or_default(), Duration::from_secs(600));
        assert_eq!(opts.acquire_timeout_or_default(), Duration::from_secs(30));
    }

    #[test]
    fn test_pool_options_from_config() {
        let config = Config {
            max_connections: Some(64),
            acquire_timeout: Some(5),
            ..Config::default()
        };
        let opts = config.pool_options();
        assert_eq!(opts.max_connections_or_default(true), 64);
        assert_eq!(opts.acquire_timeout_or_default(), Duration::from_secs(5));
    }

    #[test]
    fn test_pool_options_validation() {
        let zero = PoolOptions {
            max_connections: Some(0),
            ..PoolOptions::default()
        };
        assert!(zero.validate().unwrap_err().contains("max_connections"));

        let inverted = PoolOptions {
            max_connections: Some(2),
            min_connections: Some(5),
            ..PoolOptions::default()
        };
        assert!(inverted.validate().unwrap_err().contains("cannot exceed"));
    }
}
