use crate::io::Response;

pub mod expiring;
pub mod filesystem;
pub mod inmemory;

use crate::Result;
pub use expiring::ExpiringCache;
pub use filesystem::FileCache;
pub use inmemory::InMemoryCache;

/// A store of responses addressed by a cache key. Keys are either full
/// request identities or derived labels. Entries are immutable values: `set`
/// always replaces, never merges.
pub trait Cache<K: ?Sized> {
    fn get(&self, key: &K) -> Result<Option<Response>>;
    fn set(&self, key: &K, value: &Response) -> Result<()>;
    fn remove(&self, key: &K) -> Result<()>;
    /// Drops every entry of the store.
    fn invalidate(&self) -> Result<()>;
}
