use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x509_parser::prelude::*;

use crate::pki::cert::{CertError, CertificateEntry};
use crate::storage::{Storage, StorageError};

/// Prefix under which issuer certificates are stored, keyed by issuer id.
pub const ISSUERS_PREFIX: &str = "issuers/";

/// Identifier of a CA issuer known to this mount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuerId(String);

impl IssuerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssuerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for IssuerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Mapping from issuer id to its certificate, rebuilt once per tidy run.
pub type IssuerMap = HashMap<IssuerId, CertificateEntry>;

/// Error type for issuer resolution.
#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("error reading issuers from storage: {0}")]
    Storage(#[from] StorageError),

    #[error("issuer {id} has an unparseable certificate: {source}")]
    BadCertificate { id: IssuerId, source: CertError },

    #[error("issuer {0} has no stored certificate")]
    Missing(IssuerId),
}

/// Resolves the currently configured issuers to their certificates.
#[async_trait]
pub trait IssuerResolver: Send + Sync {
    async fn issuer_map(&self) -> Result<IssuerMap, IssuerError>;
}

/// Issuer resolver reading DER certificates from `issuers/<id>` keys.
#[derive(Clone)]
pub struct StorageIssuerResolver {
    storage: Arc<dyn Storage>,
}

impl StorageIssuerResolver {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl IssuerResolver for StorageIssuerResolver {
    async fn issuer_map(&self) -> Result<IssuerMap, IssuerError> {
        let mut issuers = IssuerMap::new();
        for id in self.storage.list(ISSUERS_PREFIX).await? {
            let id = IssuerId::new(id);
            let der = self
                .storage
                .get(&format!("{ISSUERS_PREFIX}{id}"))
                .await?
                .ok_or_else(|| IssuerError::Missing(id.clone()))?;
            let entry = CertificateEntry::from_der(der)
                .map_err(|source| IssuerError::BadCertificate {
                    id: id.clone(),
                    source,
                })?;
            issuers.insert(id, entry);
        }
        Ok(issuers)
    }
}

/// Whether an issuer reference points at a currently known issuer.
pub fn issuer_reference_valid(reference: Option<&IssuerId>, issuers: &IssuerMap) -> bool {
    reference.is_some_and(|id| issuers.contains_key(id))
}

/// Look up which known issuer signed the given certificate.
///
/// A candidate matches when its subject equals the certificate's issuer
/// DN and the signature verifies against its public key.
pub fn find_issuer_for(cert: &X509Certificate<'_>, issuers: &IssuerMap) -> Option<IssuerId> {
    let issuer_dn = cert.issuer();
    for (id, entry) in issuers {
        if let Ok(candidate) = entry.parse()
            && candidate.subject() == issuer_dn
            && cert.verify_signature(Some(candidate.public_key())).is_ok()
        {
            return Some(id.clone());
        }
    }
    None
}
