//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("TLS file not found: {0}")]
    MissingFile(PathBuf),

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to build TLS context: {0}")]
    Context(io::Error),
}

/// Load TLS configuration from certificate and key files.
///
/// The PEM files are checked up front so a bad deployment reports which file
/// is wrong. The resulting config advertises `h2` and `http/1.1` over ALPN.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let certificates = count_certificates(cert_path)?;
    check_private_key(key_path)?;

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(TlsError::Context)?;

    tracing::info!(
        cert = %cert_path.display(),
        certificates,
        "TLS context initialized"
    );
    Ok(config)
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    if !path.exists() {
        return Err(TlsError::MissingFile(path.to_path_buf()));
    }
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn count_certificates(path: &Path) -> Result<usize, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs.len())
}

fn check_private_key(path: &Path) -> Result<(), TlsError> {
    let mut reader = open(path)?;
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(TlsError::NoPrivateKey(path.to_path_buf())),
        Err(source) => Err(TlsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
