//! TLS support for the pairlink server
//!
//! Certificates come either from PEM files supplied by the operator or from a
//! self-signed pair kept in a certificate directory and reused across restarts.

use axum_server::tls_rustls::RustlsConfig;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use sha2::{Digest, Sha256};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// TLS setup errors
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),
}

pub type TlsResult<T> = Result<T, TlsError>;

/// PEM-encoded certificate, key and fingerprint
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub cert_pem: String,
    pub key_pem: String,
    pub fingerprint: String,
}

impl TlsMaterial {
    /// Read a certificate and key from PEM files
    pub fn from_files(cert_path: &Path, key_path: &Path) -> TlsResult<Self> {
        let cert_pem = std::fs::read_to_string(cert_path)?;
        let key_pem = std::fs::read_to_string(key_path)?;
        let fingerprint = calculate_cert_fingerprint(&cert_pem);
        Ok(Self {
            cert_pem,
            key_pem,
            fingerprint,
        })
    }

    /// Build the rustls acceptor config
    pub async fn rustls_config(&self) -> TlsResult<RustlsConfig> {
        let config = RustlsConfig::from_pem(
            self.cert_pem.as_bytes().to_vec(),
            self.key_pem.as_bytes().to_vec(),
        )
        .await?;
        Ok(config)
    }
}

/// Self-signed certificate kept in a directory
pub struct CertificateStore {
    dir: PathBuf,
}

impl CertificateStore {
    pub fn new(dir: PathBuf) -> TlsResult<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn cert_path(&self) -> PathBuf {
        self.dir.join("server.crt")
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.join("server.key")
    }

    /// Load the stored pair, generating one for `hostnames` if absent
    pub fn load_or_generate(&self, hostnames: &[String]) -> TlsResult<TlsMaterial> {
        let (cert_path, key_path) = (self.cert_path(), self.key_path());

        if cert_path.exists() && key_path.exists() {
            info!("Loading certificate from {:?}", cert_path);
            return TlsMaterial::from_files(&cert_path, &key_path);
        }

        info!("Generating new self-signed certificate...");
        let (cert_pem, key_pem) = generate_self_signed_cert(hostnames)?;
        std::fs::write(&cert_path, &cert_pem)?;
        std::fs::write(&key_path, &key_pem)?;
        info!("Certificate saved to {:?}", cert_path);

        let fingerprint = calculate_cert_fingerprint(&cert_pem);
        Ok(TlsMaterial {
            cert_pem,
            key_pem,
            fingerprint,
        })
    }
}

/// Generate a self-signed certificate for the given hostnames/IPs
pub fn generate_self_signed_cert(hostnames: &[String]) -> TlsResult<(String, String)> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "pairlink");
    params.distinguished_name = dn;

    let mut san_list = vec![
        SanType::DnsName("localhost".try_into()?),
        SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
    ];

    for hostname in hostnames {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            san_list.push(SanType::IpAddress(ip));
        } else if let Ok(dns) = hostname.as_str().try_into() {
            san_list.push(SanType::DnsName(dns));
        }
    }

    params.subject_alt_names = san_list;

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    Ok((cert.pem(), key_pair.serialize_pem()))
}

/// SHA-256 fingerprint of a certificate as colon-separated hex pairs
pub fn calculate_cert_fingerprint(cert_pem: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cert_pem.as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
