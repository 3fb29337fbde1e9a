use ::redis::RedisError;
use async_trait::async_trait;
use color_eyre::Report;
use std::error::Error as StdError;
use std::fmt;

mod memory;
mod redis;

pub use memory::MemoryStorage;
pub use self::redis::RedisStorage;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Error type for storage backend operations.
#[derive(Debug)]
pub struct StorageError {
    error: Report,
}

impl StorageError {
    pub fn new<T>(error: T) -> Self
    where
        T: StdError + Send + Sync + 'static,
    {
        Self {
            error: Report::new(error),
        }
    }

    pub fn msg<T>(message: T) -> Self
    where
        T: fmt::Debug + fmt::Display + Send + Sync + 'static,
    {
        Self {
            error: Report::msg(message),
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl From<RedisError> for StorageError {
    fn from(error: RedisError) -> Self {
        Self {
            error: Report::new(error),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self {
            error: Report::new(error),
        }
    }
}

/// Abstract interface over the persistent key-value store backing the CA.
///
/// Keys are flat strings namespaced by prefix (`certs/`, `revoked/`,
/// `issuers/`, ...). Listing returns the key suffixes under a prefix in
/// backend order, which is not contractually sorted.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// List the key suffixes stored under the given prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Fetch the value stored at `key`, or `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` at `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key` from the store. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
