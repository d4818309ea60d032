// TLS module
// Builds the rustls acceptor from PEM certificate and key files

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::StartupError;

/// Load certificate chain and private key, failing at startup on any problem
pub fn load_acceptor(cert_file: &Path, key_file: &Path) -> Result<TlsAcceptor, StartupError> {
    let certs = load_certs(cert_file)?;
    let key = load_key(key_file)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| StartupError::Tls(format!("invalid certificate or key: {e}")))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path) -> Result<BufReader<File>, StartupError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| StartupError::Tls(format!("cannot open {}: {e}", path.display())))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, StartupError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StartupError::Tls(format!("bad certificate in {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(StartupError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, StartupError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| StartupError::Tls(format!("bad private key in {}: {e}", path.display())))?
        .ok_or_else(|| StartupError::Tls(format!("no private key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_acceptor(&dir.path().join("cert.pem"), &dir.path().join("key.pem"));
        assert!(matches!(result, Err(StartupError::Tls(_))));
    }

    #[test]
    fn test_empty_certificate_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "").unwrap();
        std::fs::write(&key, "").unwrap();

        match load_acceptor(&cert, &key) {
            Err(StartupError::Tls(message)) => assert!(message.contains("no certificates")),
            _ => panic!("expected TLS error"),
        }
    }
}
