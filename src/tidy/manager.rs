use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use x509_parser::prelude::*;

use crate::pki::cert::{CERTS_PREFIX, cert_key};
use crate::pki::crl::{CrlBuilder, CrlConfig};
use crate::pki::issuer::{self, IssuerResolver};
use crate::pki::revocation::{REVOKED_PREFIX, RevocationEntry, RevocationLock, revoked_key};
use crate::storage::Storage;
use crate::tidy::{TidyConfig, TidyError, TidyGuard, TidyStatusHandle};

/// Outcome of submitting a tidy request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TidyStart {
    /// A run was admitted and is executing in the background.
    Started {
        /// No tidier was enabled; the run completes without doing anything.
        no_targets: bool,
    },
    /// Another run is already active. Not an error; the request is
    /// dropped, not queued.
    InProgress,
}

/// Garbage collector for the certificate and revocation stores.
///
/// Cheap to clone; all clones share the same status record and run
/// guard.
#[derive(Clone)]
pub struct TidyManager {
    storage: Arc<dyn Storage>,
    issuers: Arc<dyn IssuerResolver>,
    crl: Arc<dyn CrlBuilder>,
    revocation_lock: RevocationLock,
    status: TidyStatusHandle,
    pub(crate) guard: TidyGuard,
}

impl TidyManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        issuers: Arc<dyn IssuerResolver>,
        crl: Arc<dyn CrlBuilder>,
        revocation_lock: RevocationLock,
    ) -> Self {
        Self {
            storage,
            issuers,
            crl,
            revocation_lock,
            status: TidyStatusHandle::default(),
            guard: TidyGuard::default(),
        }
    }

    pub fn status(&self) -> &TidyStatusHandle {
        &self.status
    }

    /// Validate and submit a tidy request.
    ///
    /// An admitted run executes on a detached task and survives the
    /// caller going away; its outcome is only observable through the
    /// status record and the logs.
    pub fn start(&self, config: TidyConfig) -> Result<TidyStart, TidyError> {
        if config.safety_buffer.is_zero() {
            return Err(TidyError::InvalidSafetyBuffer);
        }

        let Some(permit) = self.guard.try_acquire() else {
            return Ok(TidyStart::InProgress);
        };

        self.status.start(&config);
        let no_targets = !config.has_targets();

        let manager = self.clone();
        tokio::spawn(async move {
            // Held until the task exits, releasing the guard even if
            // the run panics.
            let _permit = permit;

            let result = manager.run(&config).await;
            match &result {
                Ok(()) => info!("tidy run finished"),
                Err(error) => error!(%error, "tidy run failed"),
            }
            manager.status.stop(result.err().map(|e| e.to_string()));
        });

        Ok(TidyStart::Started { no_targets })
    }

    async fn run(&self, config: &TidyConfig) -> Result<(), TidyError> {
        if config.cert_store {
            self.tidy_cert_store(config).await?;
        }
        if config.revoked_certs || config.issuer_assocs {
            self.tidy_revocation_store(config).await?;
        }
        Ok(())
    }

    async fn tidy_cert_store(&self, config: &TidyConfig) -> Result<(), TidyError> {
        let serials = self
            .storage
            .list(CERTS_PREFIX)
            .await
            .map_err(|e| TidyError::storage("fetching list of certificates", e))?;
        let total = serials.len();
        info!(total, "tidying certificate store");

        for (i, serial) in serials.iter().enumerate() {
            self.status
                .set_message(format!("Tidying certificate store: checking entry {i} of {total}"));

            let entry = self
                .storage
                .get(&cert_key(serial))
                .await
                .map_err(|e| TidyError::storage(format!("fetching certificate {serial}"), e))?;

            let Some(raw) = entry else {
                warn!(%serial, "certificate entry is missing; tidying up");
                self.delete_cert(serial).await?;
                self.status.inc_cert_store_deleted();
                continue;
            };
            if raw.is_empty() {
                warn!(%serial, "certificate entry has no value; tidying up");
                self.delete_cert(serial).await?;
                self.status.inc_cert_store_deleted();
                continue;
            }

            let (_, cert) = X509Certificate::from_der(&raw).map_err(|e| {
                TidyError::ParseCertificate {
                    serial: serial.clone(),
                    source: e.into(),
                }
            })?;

            if past_safety_buffer(&cert, config.safety_buffer) {
                self.delete_cert(serial).await?;
                self.status.inc_cert_store_deleted();
            }
        }

        Ok(())
    }

    async fn delete_cert(&self, serial: &str) -> Result<(), TidyError> {
        self.storage
            .delete(&cert_key(serial))
            .await
            .map_err(|e| TidyError::storage(format!("deleting certificate {serial}"), e))
    }

    async fn tidy_revocation_store(&self, config: &TidyConfig) -> Result<(), TidyError> {
        // The revocation write path takes the same lock: a tidy pass
        // rewrites entries in place and must not interleave with live
        // revocations.
        let _revocation_guard = self.revocation_lock.lock().await;

        let issuers = self.issuers.issuer_map().await?;

        let serials = self
            .storage
            .list(REVOKED_PREFIX)
            .await
            .map_err(|e| TidyError::storage("fetching list of revoked certificates", e))?;
        let total = serials.len();
        info!(total, known_issuers = issuers.len(), "tidying revocation store");

        let mut rebuild_crl = false;
        let mut fixed_issuers = 0usize;

        for (i, serial) in serials.iter().enumerate() {
            self.status.set_message(format!(
                "Tidying revoked certificates: checking certificate {i} of {total}"
            ));

            let entry = self
                .storage
                .get(&revoked_key(serial))
                .await
                .map_err(|e| {
                    TidyError::storage(format!("fetching revoked certificate {serial}"), e)
                })?;

            let Some(raw) = entry else {
                warn!(%serial, "revoked entry is missing; tidying up");
                self.delete_revoked(serial).await?;
                self.status.inc_revoked_deleted();
                rebuild_crl = true;
                continue;
            };
            if raw.is_empty() {
                warn!(%serial, "revoked entry has no value; tidying up");
                self.delete_revoked(serial).await?;
                self.status.inc_revoked_deleted();
                rebuild_crl = true;
                continue;
            }

            let mut record: RevocationEntry =
                serde_json::from_slice(&raw).map_err(|e| TidyError::DecodeRevocation {
                    serial: serial.clone(),
                    source: e,
                })?;

            let (_, revoked_cert) = X509Certificate::from_der(&record.certificate)
                .map_err(|e| TidyError::ParseCertificate {
                    serial: serial.clone(),
                    source: e.into(),
                })?;

            // Issuer repair runs before the expiry check; if the expiry
            // check then removes the entry, the repaired record is
            // discarded instead of persisted.
            let mut rewrite = false;
            if config.issuer_assocs
                && !issuer::issuer_reference_valid(record.issuer.as_ref(), &issuers)
            {
                self.status.inc_missing_issuer();
                record.issuer = None;
                rewrite = true;
                if let Some(id) = issuer::find_issuer_for(&revoked_cert, &issuers) {
                    info!(%serial, issuer = %id, "re-associated revoked certificate");
                    record.issuer = Some(id);
                    fixed_issuers += 1;
                }
            }

            if config.revoked_certs && past_safety_buffer(&revoked_cert, config.safety_buffer) {
                // The revoked/ entry feeds CRL building and the certs/
                // entry serves lookups; both go together.
                self.delete_revoked(serial).await?;
                self.delete_cert(serial).await?;
                self.status.inc_revoked_deleted();
                rebuild_crl = true;
                rewrite = false;
            }

            if rewrite {
                let value = serde_json::to_vec(&record).map_err(|e| {
                    TidyError::storage(format!("encoding revocation entry {serial}"), e.into())
                })?;
                self.storage
                    .put(&revoked_key(serial), &value)
                    .await
                    .map_err(|e| {
                        TidyError::storage(format!("persisting revocation entry {serial}"), e)
                    })?;
            }
        }

        info!(fixed_issuers, "revocation store scan complete");

        if rebuild_crl {
            // Expired entries are no urgent reason to rebuild; when
            // automatic rebuilding is on, the auto-rebuild mechanism
            // picks the change up instead.
            let crl_config = CrlConfig::load(self.storage.as_ref()).await?;
            if !crl_config.auto_rebuild {
                self.crl.rebuild(false).await?;
            }
        }

        Ok(())
    }

    async fn delete_revoked(&self, serial: &str) -> Result<(), TidyError> {
        self.storage
            .delete(&revoked_key(serial))
            .await
            .map_err(|e| TidyError::storage(format!("deleting revoked entry {serial}"), e))
    }
}

/// Deletion eligibility: strictly past `not_after` plus the buffer.
fn past_safety_buffer(cert: &X509Certificate<'_>, safety_buffer: Duration) -> bool {
    past_cutoff(
        cert.validity().not_after.timestamp(),
        safety_buffer,
        Utc::now().timestamp(),
    )
}

fn past_cutoff(not_after: i64, safety_buffer: Duration, now: i64) -> bool {
    now > not_after.saturating_add(safety_buffer.as_secs() as i64)
}
