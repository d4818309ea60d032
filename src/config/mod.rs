// Configuration module entry point
// Loads the immutable service configuration and builds the shared state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::StartupError;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, EtagConfig, FilesConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig,
    TlsConfig,
};

/// Default config file, resolved by the `config` crate without extension
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("DOSE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("etag.enabled", true)?
            .set_default("etag.kind", "weak")?
            .set_default("etag.algorithm", "MD5")?
            .set_default("etag.conditional", true)?
            .set_default("http.max_request_size", 65_536)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.header_read_timeout", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, StartupError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| StartupError::InvalidAddress(format!("{e}")))
    }

    /// Absolute, canonical base download folder
    ///
    /// A missing setting, a missing folder, or a path that is not a
    /// directory are all fatal.
    pub fn base_dir(&self) -> Result<PathBuf, StartupError> {
        let configured = self
            .files
            .base_dir
            .as_ref()
            .ok_or(StartupError::MissingBaseDir)?;

        let canonical =
            configured
                .canonicalize()
                .map_err(|source| StartupError::BaseDirUnavailable {
                    path: configured.clone(),
                    source,
                })?;

        if !canonical.is_dir() {
            return Err(StartupError::BaseDirNotDirectory(canonical));
        }
        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("dose.toml");
        fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[files]\nbase_dir = \"/srv\"\n");
        let cfg = Config::load_from(&path).unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.etag.enabled);
        assert_eq!(cfg.etag.kind, "weak");
        assert_eq!(cfg.etag.algorithm, "MD5");
        assert_eq!(cfg.http.max_request_size, 65_536);
        assert!(!cfg.tls.is_enabled());
        assert_eq!(cfg.logging.access_log_format, "combined");
    }

    #[test]
    fn test_explicit_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[server]
port = 9090

[files]
base_dir = "/srv/files"

[etag]
enabled = true
kind = "strong"
algorithm = "SHA-256"
"#,
        );
        let cfg = Config::load_from(&path).unwrap();

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.etag.kind, "strong");
        assert_eq!(cfg.etag.algorithm, "SHA-256");
        assert_eq!(cfg.files.base_dir, Some(PathBuf::from("/srv/files")));
    }

    #[test]
    fn test_missing_base_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[server]\nport = 8081\n");
        let cfg = Config::load_from(&path).unwrap();

        assert!(matches!(cfg.base_dir(), Err(StartupError::MissingBaseDir)));
    }

    #[test]
    fn test_nonexistent_base_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let path = write_config(
            &dir,
            &format!("[files]\nbase_dir = {:?}\n", missing.to_string_lossy()),
        );
        let cfg = Config::load_from(&path).unwrap();

        assert!(matches!(
            cfg.base_dir(),
            Err(StartupError::BaseDirUnavailable { .. })
        ));
    }

    #[test]
    fn test_file_as_base_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();
        let path = write_config(
            &dir,
            &format!("[files]\nbase_dir = {:?}\n", file.to_string_lossy()),
        );
        let cfg = Config::load_from(&path).unwrap();

        assert!(matches!(
            cfg.base_dir(),
            Err(StartupError::BaseDirNotDirectory(_))
        ));
    }

    #[test]
    fn test_base_dir_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!("[files]\nbase_dir = {:?}\n", dir.path().to_string_lossy()),
        );
        let cfg = Config::load_from(&path).unwrap();

        let base = cfg.base_dir().unwrap();
        assert!(base.is_absolute());
        assert_eq!(base, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_socket_addr() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[server]\nhost = \"127.0.0.1\"\nport = 8443\n");
        let cfg = Config::load_from(&path).unwrap();

        assert_eq!(
            cfg.get_socket_addr().unwrap(),
            "127.0.0.1:8443".parse().unwrap()
        );
    }
}
