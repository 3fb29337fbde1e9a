use std::sync::Arc;

use pki_tidy::{
    config::{ReplicationConfig, ServerConfig},
    pki::{
        cert::CertificateEntry, crl::CrlRebuildMarker, issuer::StorageIssuerResolver,
        revocation::RevocationLock,
    },
    server::{AppState, Server},
    storage::{MemoryStorage, Storage},
    tidy::TidyManager,
};
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, Issuer, KeyPair};
use time::{Duration, OffsetDateTime};

pub struct TestServer {
    pub addr: String,
    pub storage: MemoryStorage,
}

// Helper function to spawn a test server on a random port
pub async fn spawn_server() -> TestServer {
    spawn_server_with(ReplicationConfig::default()).await
}

pub async fn spawn_server_with(replication: ReplicationConfig) -> TestServer {
    let storage = MemoryStorage::default();
    let shared: Arc<dyn Storage> = Arc::new(storage.clone());

    let tidy = TidyManager::new(
        Arc::clone(&shared),
        Arc::new(StorageIssuerResolver::new(Arc::clone(&shared))),
        Arc::new(CrlRebuildMarker::new(Arc::clone(&shared))),
        RevocationLock::default(),
    );
    let state = AppState { tidy, replication };

    let server_config = ServerConfig {
        host: "127.0.0.1".to_string(),
        // Use a random OS port
        port: 0,
    };
    let (port, _handle) = Server::new(state)
        .run_with_port(&server_config)
        .await
        .expect("failed to run server");

    TestServer {
        addr: format!("http://127.0.0.1:{port}"),
        storage,
    }
}

#[allow(dead_code)]
pub fn gen_ca() -> (Issuer<'static, KeyPair>, CertificateEntry) {
    let mut params = CertificateParams::default();
    let key_pair = KeyPair::generate().unwrap();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "Integration Test CA");
    params.distinguished_name = dn;
    params.is_ca = rcgen::IsCa::Ca(BasicConstraints::Unconstrained);

    let cert = params.self_signed(&key_pair).unwrap();
    let entry = CertificateEntry::from_der(cert.der()).unwrap();
    (Issuer::new(params, key_pair), entry)
}

/// Leaf certificate whose `notAfter` sits `not_after_offset_secs` from
/// now; negative values produce an already-expired certificate.
#[allow(dead_code)]
pub fn gen_leaf(ca: &Issuer<'static, KeyPair>, not_after_offset_secs: i64) -> CertificateEntry {
    let mut params = CertificateParams::default();
    let key_pair = KeyPair::generate().unwrap();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "leaf.example.com");
    params.distinguished_name = dn;
    params.not_before = OffsetDateTime::now_utc() - Duration::days(365);
    params.not_after = OffsetDateTime::now_utc() + Duration::seconds(not_after_offset_secs);

    let cert = params.signed_by(&key_pair, ca).unwrap();
    CertificateEntry::from_der(cert.der()).unwrap()
}
