use std::sync::Arc;

use thiserror::Error;
use x509_parser::prelude::*;

/// Prefix under which issued certificates are stored, keyed by serial.
pub const CERTS_PREFIX: &str = "certs/";

/// Storage key for an issued certificate.
pub fn cert_key(serial: &str) -> String {
    format!("{CERTS_PREFIX}{serial}")
}

/// Error type for certificate handling.
#[derive(Debug, Error)]
pub enum CertError {
    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),
}

/// A certificate held as raw DER with a little metadata.
///
/// The DER is parsed on demand; `x509-parser` borrows from the input so
/// the parsed form cannot be stored alongside the bytes.
#[derive(Debug, Clone)]
pub struct CertificateEntry {
    pub raw: Arc<Vec<u8>>,
    pub serial_number: String,
    pub subject: String,
}

impl CertificateEntry {
    /// Create a certificate entry from DER-encoded bytes
    pub fn from_der(der: impl AsRef<[u8]>) -> Result<Self, CertError> {
        let der_bytes = der.as_ref();
        let (_, cert) =
            X509Certificate::from_der(der_bytes).map_err(|e| CertError::X509(e.into()))?;

        let serial_number = hex::encode(cert.tbs_certificate.raw_serial());
        let subject = cert.subject().to_string();

        Ok(Self {
            raw: Arc::new(der_bytes.to_vec()),
            serial_number,
            subject,
        })
    }

    /// Parse the certificate from the stored DER bytes
    pub fn parse(&self) -> Result<X509Certificate<'_>, CertError> {
        let (_, cert) =
            X509Certificate::from_der(&self.raw).map_err(|e| CertError::X509(e.into()))?;
        Ok(cert)
    }
}
