use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::storage::{Storage, StorageError};

/// Storage key holding the revocation configuration for this mount.
pub const CRL_CONFIG_KEY: &str = "config/crl";

/// Error type for CRL rebuild triggering.
#[derive(Debug, Error)]
pub enum CrlError {
    #[error("error reading CRL configuration: {0}")]
    Storage(#[from] StorageError),

    #[error("CRL rebuild failed: {0}")]
    Rebuild(String),
}

/// Revocation configuration, stored as JSON under `config/crl`.
///
/// When automatic rebuilding is enabled an external mechanism
/// regenerates the CRL on its own schedule and the tidier leaves the
/// rebuild to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrlConfig {
    #[serde(default)]
    pub auto_rebuild: bool,
}

impl CrlConfig {
    /// Load the revocation configuration, falling back to defaults when
    /// none has been written yet.
    pub async fn load(storage: &dyn Storage) -> Result<Self, CrlError> {
        match storage.get(CRL_CONFIG_KEY).await? {
            Some(raw) => Ok(serde_json::from_slice(&raw).map_err(StorageError::from)?),
            None => Ok(Self::default()),
        }
    }
}

/// Trigger contract for regenerating the CRL from current revocation
/// state. The CRL construction itself lives with the issuance service.
#[async_trait]
pub trait CrlBuilder: Send + Sync {
    /// Rebuild the CRL. `forced` bypasses any freshness checks the
    /// builder applies.
    async fn rebuild(&self, forced: bool) -> Result<(), CrlError>;
}

/// Default trigger implementation: records the rebuild request in
/// storage for the CRL construction pipeline to pick up.
#[derive(Clone)]
pub struct CrlRebuildMarker {
    storage: Arc<dyn Storage>,
}

impl CrlRebuildMarker {
    pub const MARKER_KEY: &str = "crl/rebuild_requested";

    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl CrlBuilder for CrlRebuildMarker {
    async fn rebuild(&self, forced: bool) -> Result<(), CrlError> {
        let requested_at = Utc::now().to_rfc3339();
        self.storage
            .put(Self::MARKER_KEY, requested_at.as_bytes())
            .await?;
        info!(forced, %requested_at, "requested CRL rebuild");
        Ok(())
    }
}
