//! Local durable storage for Azukr

mod connection;
mod memory;
mod migrations;

use std::sync::Arc;

use crate::error::Result;

pub use connection::SqliteStore;
pub use memory::MemoryStore;

/// Synchronous key/value storage of string values, scoped to one device.
pub trait KeyValueStore {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`; durable once this returns
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}
