// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod memory;
pub mod parity_db;
pub mod parity_db_config;

pub use memory::MemoryDB;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod setting_keys {
    /// Prefix of every payment channel record.
    pub const PAYCH_CHANNEL_PREFIX: &str = "/paych/channel/";
    /// Prefix of every stored voucher.
    pub const PAYCH_VOUCHER_PREFIX: &str = "/paych/voucher/";
    /// Prefix of every tracked channel message.
    pub const PAYCH_MSG_PREFIX: &str = "/paych/msg/";
}

/// Interface used to store and retrieve payment channel records from the database.
pub trait SettingsStore {
    /// Reads binary field from the Settings store. This should be used for
    /// non-serializable data. For serializable data, use [`SettingsStoreExt::read_obj`].
    fn read_bin(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Writes binary field to the Settings store. This should be used for
    /// non-serializable data. For serializable data, use [`SettingsStoreExt::write_obj`].
    fn write_bin(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;

    /// Returns `Ok(true)` if key exists in store.
    fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Returns all setting keys.
    fn setting_keys(&self) -> anyhow::Result<Vec<String>>;

    /// Returns the keys starting with `prefix`, in ascending order.
    fn prefixed_keys(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let mut keys = self
            .setting_keys()?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect::<Vec<_>>();
        keys.sort();
        Ok(keys)
    }

    /// Applies all writes (`Some`) and deletions (`None`) in a single atomic
    /// transaction. Either every change is visible afterwards or none is.
    fn commit_bin(&self, changes: &[(String, Option<Vec<u8>>)]) -> anyhow::Result<()>;

    /// Removes a key, if present.
    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.commit_bin(&[(key.to_owned(), None)])
    }
}

/// Extension trait for the [`SettingsStore`] trait. It is implemented for all types that implement
/// [`SettingsStore`].
/// It provides methods for writing and reading any serializable object from the store.
/// Objects are encoded as `DAG-CBOR`, which keeps them readable across restarts and releases.
pub trait SettingsStoreExt {
    fn read_obj<V: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<V>>;
    fn write_obj<V: Serialize>(&self, key: &str, value: &V) -> anyhow::Result<()>;

    /// Same as [`SettingsStoreExt::read_obj`], but returns an error if the key does not exist.
    fn require_obj<V: DeserializeOwned>(&self, key: &str) -> anyhow::Result<V>;

    /// Returns every `(key, object)` pair whose key starts with `prefix`.
    fn read_prefixed<V: DeserializeOwned>(&self, prefix: &str) -> anyhow::Result<Vec<(String, V)>>;
}

impl<T: ?Sized + SettingsStore> SettingsStoreExt for T {
    fn read_obj<V: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<V>> {
        match self.read_bin(key)? {
            Some(bytes) => Ok(Some(fvm_ipld_encoding::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_obj<V: Serialize>(&self, key: &str, value: &V) -> anyhow::Result<()> {
        self.write_bin(key, &fvm_ipld_encoding::to_vec(value)?)
    }

    fn require_obj<V: DeserializeOwned>(&self, key: &str) -> anyhow::Result<V> {
        self.read_bin(key)?
            .ok_or_else(|| anyhow::anyhow!("Key {key} not found"))
            .and_then(|bytes| fvm_ipld_encoding::from_slice(&bytes).map_err(Into::into))
    }

    fn read_prefixed<V: DeserializeOwned>(&self, prefix: &str) -> anyhow::Result<Vec<(String, V)>> {
        let keys = self.prefixed_keys(prefix)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            // A concurrent delete between listing and reading is not an error.
            if let Some(value) = self.read_obj(&key)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }
}

/// Traits for collecting DB stats
pub trait DBStatistics {
    fn get_statistics(&self) -> Option<String> {
        None
    }
}

impl<DB: DBStatistics> DBStatistics for std::sync::Arc<DB> {
    fn get_statistics(&self) -> Option<String> {
        self.as_ref().get_statistics()
    }
}

impl<DB: SettingsStore + ?Sized> SettingsStore for std::sync::Arc<DB> {
    fn read_bin(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        SettingsStore::read_bin(self.as_ref(), key)
    }

    fn write_bin(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        SettingsStore::write_bin(self.as_ref(), key, value)
    }

    fn exists(&self, key: &str) -> anyhow::Result<bool> {
        SettingsStore::exists(self.as_ref(), key)
    }

    fn setting_keys(&self) -> anyhow::Result<Vec<String>> {
        SettingsStore::setting_keys(self.as_ref())
    }

    fn commit_bin(&self, changes: &[(String, Option<Vec<u8>>)]) -> anyhow::Result<()> {
        SettingsStore::commit_bin(self.as_ref(), changes)
    }
}

pub mod db_engine {
    use std::path::{Path, PathBuf};

    pub type Db = crate::db::parity_db::ParityDb;
    pub type DbConfig = crate::db::parity_db_config::ParityDbConfig;
    const DIR_NAME: &str = "paritydb";

    pub fn db_root(data_root: &Path) -> PathBuf {
        data_root.join(DIR_NAME)
    }

    pub fn open_db(path: &Path, config: &DbConfig) -> anyhow::Result<Db> {
        Db::open(path, config)
    }
}
