use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use crate::pki::cert::CertificateEntry;
use crate::pki::issuer::IssuerId;
use crate::storage::{Result, Storage};

/// Prefix under which revocation records are stored, keyed by serial.
pub const REVOKED_PREFIX: &str = "revoked/";

/// Storage key for a revocation record.
pub fn revoked_key(serial: &str) -> String {
    format!("{REVOKED_PREFIX}{serial}")
}

/// A revocation record, stored as JSON under `revoked/<serial>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationEntry {
    /// DER bytes of the revoked certificate.
    #[serde(with = "der_base64")]
    pub certificate: Vec<u8>,
    pub revocation_time: DateTime<Utc>,
    /// Issuer that signed the revoked certificate. `None` means the
    /// reference was cleared and is pending re-association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<IssuerId>,
}

mod der_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

/// Lock serializing all writers of the `revoked/` keyspace.
///
/// The revocation write path and the revocation tidier both take it for
/// their full duration, so a tidy pass never interleaves with live
/// revocation traffic.
#[derive(Debug, Clone, Default)]
pub struct RevocationLock(Arc<Mutex<()>>);

impl RevocationLock {
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

/// Record a certificate revocation.
///
/// This is the live write path the tidier's lock is shared with.
pub async fn record_revocation(
    storage: &dyn Storage,
    lock: &RevocationLock,
    entry: &CertificateEntry,
    issuer: Option<IssuerId>,
) -> Result<()> {
    let _guard = lock.lock().await;

    let record = RevocationEntry {
        certificate: entry.raw.as_ref().clone(),
        revocation_time: Utc::now(),
        issuer,
    };
    let value = serde_json::to_vec(&record)?;
    storage.put(&revoked_key(&entry.serial_number), &value).await
}
