use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tidy::TidyConfig;

/// Lifecycle state of the current or most recent tidy run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TidyState {
    #[default]
    Inactive,
    Running,
    Finished,
    Error,
}

#[derive(Debug, Default)]
struct TidyStatus {
    state: TidyState,
    safety_buffer_secs: u64,
    tidy_cert_store: bool,
    tidy_revoked_certs: bool,
    tidy_issuer_assocs: bool,
    time_started: Option<DateTime<Utc>>,
    time_finished: Option<DateTime<Utc>>,
    message: Option<String>,
    error: Option<String>,
    cert_store_deleted_count: u64,
    revoked_cert_deleted_count: u64,
    missing_issuer_cert_count: u64,
}

/// Handle to the pollable status record of the tidy subsystem.
///
/// Writers take the lock only for brief field updates, so status reads
/// never wait on the run's storage I/O. A fresh handle (or a process
/// restart) reports `Inactive`.
#[derive(Debug, Clone, Default)]
pub struct TidyStatusHandle {
    inner: Arc<RwLock<TidyStatus>>,
}

impl TidyStatusHandle {
    /// Reset the status for a newly admitted run: echo the config,
    /// stamp the start time and zero all counters.
    pub fn start(&self, config: &TidyConfig) {
        let mut status = self.inner.write().unwrap();
        *status = TidyStatus {
            state: TidyState::Running,
            safety_buffer_secs: config.safety_buffer.as_secs(),
            tidy_cert_store: config.cert_store,
            tidy_revoked_certs: config.revoked_certs,
            tidy_issuer_assocs: config.issuer_assocs,
            time_started: Some(Utc::now()),
            ..TidyStatus::default()
        };
    }

    /// Overwrite the progress message. Called once per scanned entry.
    pub fn set_message(&self, message: impl Into<String>) {
        self.inner.write().unwrap().message = Some(message.into());
    }

    pub fn inc_cert_store_deleted(&self) {
        self.inner.write().unwrap().cert_store_deleted_count += 1;
    }

    pub fn inc_revoked_deleted(&self) {
        self.inner.write().unwrap().revoked_cert_deleted_count += 1;
    }

    pub fn inc_missing_issuer(&self) {
        self.inner.write().unwrap().missing_issuer_cert_count += 1;
    }

    /// Finalize the run. A clean finish clears the progress message; on
    /// error it is kept as a hint about which stage failed.
    pub fn stop(&self, error: Option<String>) {
        let mut status = self.inner.write().unwrap();
        status.time_finished = Some(Utc::now());
        match error {
            None => {
                status.state = TidyState::Finished;
                status.message = None;
            }
            Some(error) => {
                status.state = TidyState::Error;
                status.error = Some(error);
            }
        }
    }

    /// Read-only view for the status endpoint. While `Inactive`, every
    /// field besides `state` reports as absent.
    pub fn snapshot(&self) -> TidyStatusSnapshot {
        let status = self.inner.read().unwrap();
        if status.state == TidyState::Inactive {
            return TidyStatusSnapshot::default();
        }
        TidyStatusSnapshot {
            state: status.state,
            safety_buffer: Some(status.safety_buffer_secs),
            tidy_cert_store: Some(status.tidy_cert_store),
            tidy_revoked_certs: Some(status.tidy_revoked_certs),
            tidy_revoked_cert_issuer_associations: Some(status.tidy_issuer_assocs),
            time_started: status.time_started,
            time_finished: status.time_finished,
            message: status.message.clone(),
            error: status.error.clone(),
            cert_store_deleted_count: Some(status.cert_store_deleted_count),
            revoked_cert_deleted_count: Some(status.revoked_cert_deleted_count),
            missing_issuer_cert_count: Some(status.missing_issuer_cert_count),
        }
    }
}

/// Wire form of the tidy status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidyStatusSnapshot {
    pub state: TidyState,
    pub safety_buffer: Option<u64>,
    pub tidy_cert_store: Option<bool>,
    pub tidy_revoked_certs: Option<bool>,
    pub tidy_revoked_cert_issuer_associations: Option<bool>,
    pub time_started: Option<DateTime<Utc>>,
    pub time_finished: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub cert_store_deleted_count: Option<u64>,
    pub revoked_cert_deleted_count: Option<u64>,
    pub missing_issuer_cert_count: Option<u64>,
}
