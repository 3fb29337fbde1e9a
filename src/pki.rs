pub mod cert;
pub mod crl;
pub mod issuer;
pub mod revocation;

// Re-export commonly used types
pub use cert::{CertError, CertificateEntry};
pub use crl::{CrlBuilder, CrlConfig, CrlError};
pub use issuer::{IssuerId, IssuerMap, IssuerResolver};
pub use revocation::{RevocationEntry, RevocationLock};
