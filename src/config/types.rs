// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub files: FilesConfig,
    pub etag: EtagConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    pub http: HttpConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Served files configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilesConfig {
    /// Base download folder; every served path is confined to it
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

/// Entity tag configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EtagConfig {
    pub enabled: bool,
    /// `weak` or `strong`
    pub kind: String,
    /// Digest used by strong etags (MD5, SHA-1, SHA-256, ...)
    pub algorithm: String,
    /// Answer matching `If-None-Match` requests with 304
    pub conditional: bool,
}

/// TLS configuration; both files must be set to enable TLS
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TlsConfig {
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

impl TlsConfig {
    pub const fn is_enabled(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Largest request body aggregated before the request is rejected
    pub max_request_size: u64,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds allowed for a client to send a complete request head
    pub header_read_timeout: u64,
    pub max_connections: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}
