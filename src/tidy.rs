use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::pki::crl::CrlError;
use crate::pki::issuer::IssuerError;
use crate::storage::StorageError;

mod manager;
mod status;

pub use manager::{TidyManager, TidyStart};
pub use status::{TidyState, TidyStatusHandle, TidyStatusSnapshot};

/// Per-run tidy request.
#[derive(Debug, Clone)]
pub struct TidyConfig {
    /// Scan and clean the certificate store.
    pub cert_store: bool,
    /// Remove expired entries from the revocation store.
    pub revoked_certs: bool,
    /// Validate and repair issuer associations on revocation entries.
    pub issuer_assocs: bool,
    /// Grace period past expiry before an entry becomes
    /// deletion-eligible. Must be nonzero.
    pub safety_buffer: Duration,
}

impl TidyConfig {
    /// Whether this config enables any tidier at all.
    pub fn has_targets(&self) -> bool {
        self.cert_store || self.revoked_certs || self.issuer_assocs
    }
}

/// Error type for tidy runs.
#[derive(Debug, Error)]
pub enum TidyError {
    #[error("safety_buffer must be greater than zero")]
    InvalidSafetyBuffer,

    #[error("error {action}: {source}")]
    Storage {
        action: String,
        source: StorageError,
    },

    #[error("unable to parse stored certificate {serial}: {source}")]
    ParseCertificate {
        serial: String,
        source: x509_parser::error::X509Error,
    },

    #[error("error decoding revocation entry {serial}: {source}")]
    DecodeRevocation {
        serial: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Issuers(#[from] IssuerError),

    #[error(transparent)]
    Crl(#[from] CrlError),
}

impl TidyError {
    pub(crate) fn storage(action: impl Into<String>, source: StorageError) -> Self {
        Self::Storage {
            action: action.into(),
            source,
        }
    }
}

/// Single-flight admission control for tidy runs.
///
/// At most one permit exists at a time; a second `try_acquire` while a
/// permit is live returns `None` rather than queueing.
#[derive(Debug, Clone, Default)]
pub struct TidyGuard {
    flag: Arc<AtomicU32>,
}

impl TidyGuard {
    /// Try to admit a run. The returned permit releases the guard when
    /// dropped, on every exit path including panics.
    pub fn try_acquire(&self) -> Option<TidyPermit> {
        self.flag
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| TidyPermit {
                flag: Arc::clone(&self.flag),
            })
    }
}

/// Proof that the holder is the one admitted tidy run.
#[derive(Debug)]
pub struct TidyPermit {
    flag: Arc<AtomicU32>,
}

impl Drop for TidyPermit {
    fn drop(&mut self) {
        self.flag.store(0, Ordering::SeqCst);
    }
}
