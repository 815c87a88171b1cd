//! Session record storage for the GitHub OAuth relay
//!
//! Every pending or completed handshake owns exactly one record, keyed by the
//! session identifier embedded in the client's signed token. The store is an
//! opaque key/value service; this crate wraps it behind the `SecretStore`
//! trait so the relay never depends on a concrete backend.
//!
//! Record lifecycle:
//! 1. `POST /authorize` creates the record as `SessionRecord::Pending`
//! 2. `GET /callback` overwrites it with `SessionRecord::Authorized`
//! 3. Authenticated endpoints read it on every request
//! 4. Pending records whose state token expired are deleted at callback time

pub mod error;
pub mod memory;
pub mod record;
pub mod secrets_manager;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use record::SessionRecord;
pub use secrets_manager::{SecretsManagerSettings, SecretsManagerStore};

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by `SecretStore` operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Abstraction over the external secret store holding session records.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn SecretStore>`). No operation retries; failures propagate to the
/// request that triggered them.
pub trait SecretStore: Send + Sync {
    /// Backend name for logging and health reporting (e.g. "memory")
    fn backend(&self) -> &str;

    /// Create a new record. Fails with `Unavailable` if the key already
    /// exists or the backend rejects the write.
    fn create<'a>(&'a self, key: &'a str, record: &'a SessionRecord) -> StoreFuture<'a, ()>;

    /// Fetch a record. Fails with `NotFound` if no record exists.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, SessionRecord>;

    /// Overwrite an existing record.
    fn put<'a>(&'a self, key: &'a str, record: &'a SessionRecord) -> StoreFuture<'a, ()>;

    /// Remove a record. Removing a missing key succeeds.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}
