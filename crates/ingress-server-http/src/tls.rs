//! TLS material loading for HTTPS listeners

use crate::IngressError;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tracing::info;

/// Load TLS certificates from a PEM file
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, IngressError> {
    let file = File::open(path)
        .map_err(|e| IngressError::TlsError(format!("Failed to open cert file: {}", e)))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| IngressError::TlsError(format!("Failed to parse certs: {}", e)))?;

    if certs.is_empty() {
        return Err(IngressError::TlsError(format!(
            "No certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Load a private key from a PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, IngressError> {
    let file = File::open(path)
        .map_err(|e| IngressError::TlsError(format!("Failed to open key file: {}", e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| IngressError::TlsError(format!("Failed to parse key: {}", e)))?
        .ok_or_else(|| IngressError::TlsError("No private key found".to_string()))
}

/// Build a server config from PEM certificate chain and key files
pub fn server_config_from_pem(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<ServerConfig>, IngressError> {
    info!("Loading TLS certificate from: {}", cert_path.display());
    let certs = load_certs(cert_path)?;

    info!("Loading TLS private key from: {}", key_path.display());
    let key = load_private_key(key_path)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| IngressError::TlsError(format!("Invalid cert/key: {}", e)))?;

    // Requests are parsed as HTTP/1.x only
    config.alpn_protocols = vec![b"http/1.1".to_vec(), b"http/1.0".to_vec()];

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_self_signed(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        std::fs::write(&cert_path, certified.cert.pem()).unwrap();
        std::fs::write(&key_path, certified.key_pair.serialize_pem()).unwrap();
        (cert_path, key_path)
    }

    #[test]
    fn test_server_config_from_pem() {
        let dir = tempfile::tempdir().unwrap();
        let (cert_path, key_path) = write_self_signed(dir.path());

        let config = server_config_from_pem(&cert_path, &key_path).unwrap();
        assert_eq!(config.alpn_protocols[0], b"http/1.1");
    }

    #[test]
    fn test_missing_files_are_tls_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        assert!(matches!(
            load_certs(&missing),
            Err(IngressError::TlsError(_))
        ));
        assert!(matches!(
            load_private_key(&missing),
            Err(IngressError::TlsError(_))
        ));
    }

    #[test]
    fn test_key_file_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let (cert_path, _) = write_self_signed(dir.path());
        // A certificate-only file holds no private key
        assert!(matches!(
            load_private_key(&cert_path),
            Err(IngressError::TlsError(_))
        ));
        assert!(matches!(
            load_certs(&dir.path().join("key.pem")),
            Err(IngressError::TlsError(_))
        ));
    }
}
