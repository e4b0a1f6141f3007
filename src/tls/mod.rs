use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tracing::warn;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::version::{TLS12, TLS13};
use tokio_rustls::rustls::{ServerConfig, SupportedProtocolVersion};

// -----------------------------------------------------------------------------
// ----- TlsSettings -----------------------------------------------------------

/// `[tls]` section. Empty paths mean "not configured".
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsSettings {
    pub certificate: String,
    pub key_file: String,
    pub chain_file: String,
    pub sslv2: bool,
    pub sslv3: bool,
    pub tlsv1: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            certificate: String::new(),
            key_file: String::new(),
            chain_file: String::new(),
            sslv2: false,
            sslv3: false,
            tlsv1: true,
        }
    }
}

impl TlsSettings {
    pub fn certificate(&self) -> Option<&Path> {
        non_empty(&self.certificate)
    }

    pub fn key_file(&self) -> Option<&Path> {
        non_empty(&self.key_file)
    }

    pub fn chain_file(&self) -> Option<&Path> {
        non_empty(&self.chain_file)
    }

    pub fn policy(&self) -> ProtocolPolicy {
        ProtocolPolicy {
            sslv2: self.sslv2,
            sslv3: self.sslv3,
            tlsv1: self.tlsv1,
        }
    }

    /// `Ok(None)` when TLS is off. Half a key pair is never accepted.
    pub fn key_pair(&self) -> Result<Option<KeyPairFiles<'_>>, TlsError> {
        match (self.certificate(), self.key_file()) {
            (None, None) => Ok(None),
            (Some(certificate), Some(key)) => Ok(Some(KeyPairFiles {
                certificate,
                key,
                chain: self.chain_file(),
            })),
            _ => Err(TlsError::IncompleteKeyPair),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeyPairFiles<'a> {
    pub certificate: &'a Path,
    pub key: &'a Path,
    pub chain: Option<&'a Path>,
}

// -----------------------------------------------------------------------------
// ----- ProtocolPolicy --------------------------------------------------------

static NEGOTIABLE_VERSIONS: &[&SupportedProtocolVersion] = &[&TLS13, &TLS12];

/// Per-version switches from `[tls]`.
///
/// rustls only implements TLS 1.2 and 1.3, and both are always offered.
/// `sslv2`, `sslv3` and `tlsv1` (TLS 1.0) name versions rustls never
/// negotiates: switching them off is already the case, switching the SSL
/// ones on only produces a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolPolicy {
    pub sslv2: bool,
    pub sslv3: bool,
    pub tlsv1: bool,
}

impl Default for ProtocolPolicy {
    fn default() -> Self {
        TlsSettings::default().policy()
    }
}

impl ProtocolPolicy {
    pub fn versions(&self) -> &'static [&'static SupportedProtocolVersion] {
        NEGOTIABLE_VERSIONS
    }

    /// Legacy versions the config asks for that cannot be negotiated.
    pub fn unavailable(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.sslv2 {
            names.push("SSLv2");
        }
        if self.sslv3 {
            names.push("SSLv3");
        }
        names
    }
}

// -----------------------------------------------------------------------------
// ----- TLS: Exported ---------------------------------------------------------

/// Builds the acceptor from PEM files. Every load failure is an error; there
/// is no partially configured acceptor.
pub fn build_acceptor(
    files: &KeyPairFiles<'_>,
    policy: ProtocolPolicy,
) -> Result<TlsAcceptor, TlsError> {
    for name in policy.unavailable() {
        warn!("{name} is enabled in [tls] but cannot be negotiated; serving TLS 1.2/1.3 only");
    }

    let certs = served_chain(files.certificate, files.chain)?;
    let key = load_key(files.key)?;

    let config = ServerConfig::builder_with_protocol_versions(policy.versions())
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TlsError::InvalidKeyPair {
            reason: e.to_string(),
        })?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

// -----------------------------------------------------------------------------
// ----- TLS: Private helpers --------------------------------------------------

fn non_empty(raw: &str) -> Option<&Path> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(Path::new(trimmed))
    }
}

/// Leaf certificate(s) first, then any chain certificates not already present.
pub(crate) fn served_chain(
    certificate: &Path,
    chain: Option<&Path>,
) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut certs = load_certs(certificate)?;

    if let Some(chain) = chain {
        for cert in load_certs(chain)? {
            if !certs.contains(&cert) {
                certs.push(cert);
            }
        }
    }

    Ok(certs)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|e| TlsError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates {
            path: path.to_path_buf(),
        });
    }

    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path).map_err(|e| TlsError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TlsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: path.to_path_buf(),
        })?;

    Ok(key)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("TLS requested but either certificate or key is missing")]
    IncompleteKeyPair,

    #[error("failed to open tls file {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read tls file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no certificates found in {path:?}")]
    NoCertificates { path: PathBuf },

    #[error("no private key found in {path:?}")]
    NoPrivateKey { path: PathBuf },

    #[error("invalid tls key/cert pair: {reason}")]
    InvalidKeyPair { reason: String },
}

// -----------------------------------------------------------------------------
// ----- Test Helpers ----------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) struct GeneratedCert {
        pub(crate) cert: NamedTempFile,
        pub(crate) key: NamedTempFile,
        pub(crate) ca: NamedTempFile,
        pub(crate) cert_pem: String,
    }

    pub(crate) fn write_tmp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    /// A CA plus a `localhost` leaf signed by it.
    pub(crate) fn generate_cert() -> GeneratedCert {
        let mut ca_params = rcgen::CertificateParams::default();
        ca_params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "busgate test CA");
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let ca_key = rcgen::KeyPair::generate().unwrap();
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let leaf_params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf_cert = leaf_params.signed_by(&leaf_key, &ca_cert, &ca_key).unwrap();

        GeneratedCert {
            cert: write_tmp(&leaf_cert.pem()),
            key: write_tmp(&leaf_key.serialize_pem()),
            ca: write_tmp(&ca_cert.pem()),
            cert_pem: leaf_cert.pem(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
