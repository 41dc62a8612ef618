// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{DBStatistics, SettingsStore};
use ahash::HashMap;
use itertools::Itertools;
use parking_lot::RwLock;

/// In-memory settings store. Nothing survives the process; use
/// [`crate::db::parity_db::ParityDb`] when channel state must outlive a restart.
#[derive(Debug, Default)]
pub struct MemoryDB {
    settings_db: RwLock<HashMap<String, Vec<u8>>>,
}

impl SettingsStore for MemoryDB {
    fn read_bin(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.settings_db.read().get(key).cloned())
    }

    fn write_bin(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.settings_db
            .write()
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.settings_db.read().contains_key(key))
    }

    fn setting_keys(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.settings_db.read().keys().cloned().collect_vec())
    }

    fn prefixed_keys(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .settings_db
            .read()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .sorted()
            .collect_vec())
    }

    fn commit_bin(&self, changes: &[(String, Option<Vec<u8>>)]) -> anyhow::Result<()> {
        let mut db = self.settings_db.write();
        for (key, value) in changes {
            match value {
                Some(value) => {
                    db.insert(key.clone(), value.clone());
                }
                None => {
                    db.remove(key);
                }
            }
        }
        Ok(())
    }
}

impl DBStatistics for MemoryDB {
    fn get_statistics(&self) -> Option<String> {
        Some(format!("{} settings entries", self.settings_db.read().len()))
    }
}
