use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const DATABASE_TIMEOUT_ENV: &str = "DATABASE_TIMEOUT_SECS";
pub const DATABASE_MAX_CONNECTIONS_ENV: &str = "DATABASE_MAX_CONNECTIONS";
pub const AUTH_SECRET_ENV: &str = "AUTH_SECRET";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_DATABASE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_AUTH_SECRET: &str = "snip-development-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Text => write!(f, "text"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

/// The storage backend selected from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { dsn: String },
    File { path: PathBuf },
    InMemory,
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Postgres { .. } => write!(f, "postgres"),
            StorageBackend::File { .. } => write!(f, "file"),
            StorageBackend::InMemory => write!(f, "in-memory"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snip-gateway", about = "URL shortener HTTP service")]
pub struct Cli {
    #[arg(
        short = 'a',
        long,
        env = SERVER_ADDRESS_ENV,
        default_value = DEFAULT_SERVER_ADDRESS
    )]
    pub server_address: SocketAddr,

    /// Prefix of every issued short URL.
    #[arg(
        short = 'b',
        long,
        env = BASE_URL_ENV,
        default_value = DEFAULT_BASE_URL,
        value_parser = parse_base_url
    )]
    pub base_url: String,

    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<String>,

    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    #[arg(
        long,
        env = DATABASE_TIMEOUT_ENV,
        default_value_t = DEFAULT_DATABASE_TIMEOUT_SECS
    )]
    pub database_timeout_secs: u64,

    #[arg(
        long,
        env = DATABASE_MAX_CONNECTIONS_ENV,
        default_value_t = DEFAULT_DATABASE_MAX_CONNECTIONS
    )]
    pub database_max_connections: u32,

    /// Secret used to sign the `auth` cookie.
    #[arg(long, env = AUTH_SECRET_ENV, default_value = DEFAULT_AUTH_SECRET, hide_env_values = true)]
    pub auth_secret: String,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,
}

impl Cli {
    /// Picks the backend: a database DSN wins over a file path, and with
    /// neither the URLs live in memory. Empty values count as absent.
    pub fn backend(&self) -> StorageBackend {
        if let Some(dsn) = self.database_dsn.as_deref().filter(|dsn| !dsn.is_empty()) {
            return StorageBackend::Postgres {
                dsn: dsn.to_string(),
            };
        }

        match self.file_storage_path.as_deref() {
            Some(path) if !path.is_empty() => StorageBackend::File {
                path: PathBuf::from(path),
            },
            _ => StorageBackend::InMemory,
        }
    }

    pub fn database_timeout(&self) -> Duration {
        Duration::from_secs(self.database_timeout_secs)
    }
}

fn parse_base_url(value: &str) -> Result<String, String> {
    let rest = value
        .strip_prefix("http://")
        .or_else(|| value.strip_prefix("https://"))
        .ok_or_else(|| format!("base url must start with http:// or https://, got {value:?}"))?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(format!("base url has no host: {value:?}"));
    }

    Ok(value.trim_end_matches('/').to_string())
}
