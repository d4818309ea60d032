// Application state module
// Process-wide immutable state built once at startup

use tokio_rustls::TlsAcceptor;

use super::types::Config;
use crate::error::StartupError;
use crate::handler::RequestDispatcher;
use crate::http::EtagGenerator;
use crate::server::tls;

/// Application state
///
/// Shared read-only by every connection; nothing in here changes after
/// construction.
pub struct AppState {
    pub config: Config,
    pub dispatcher: RequestDispatcher,
    /// Present when TLS is configured; connections are then encrypted
    pub tls_acceptor: Option<TlsAcceptor>,
}

impl AppState {
    /// Build the state, failing on any configuration error
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let base_dir = config.base_dir()?;
        let etag = EtagGenerator::from_config(&config.etag)?;
        let dispatcher = RequestDispatcher::new(base_dir, etag, config.etag.conditional);

        let tls_acceptor = match (&config.tls.cert_file, &config.tls.key_file) {
            (Some(cert), Some(key)) => Some(tls::load_acceptor(cert, key)?),
            (None, None) => None,
            _ => {
                return Err(StartupError::Tls(
                    "tls.cert_file and tls.key_file must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            config,
            dispatcher,
            tls_acceptor,
        })
    }
}
