// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{db_utils::parity::TempParityDB, subtests};
use crate::db::{SettingsStore, SettingsStoreExt};

#[test]
fn db_write() {
    let db = TempParityDB::new();
    subtests::write_bin(&*db);
}

#[test]
fn db_read() {
    let db = TempParityDB::new();
    subtests::read_bin(&*db);
}

#[test]
fn db_obj() {
    let db = TempParityDB::new();
    subtests::write_read_obj(&*db);
}

#[test]
fn db_exists() {
    let db = TempParityDB::new();
    subtests::exists(&*db);
}

#[test]
fn db_does_not_exist() {
    let db = TempParityDB::new();
    subtests::does_not_exist(&*db);
}

#[test]
fn db_commit() {
    let db = TempParityDB::new();
    subtests::commit_moves_key(&*db);
}

#[test]
fn db_delete() {
    let db = TempParityDB::new();
    subtests::delete(&*db);
}

#[test]
fn db_read_prefixed() {
    let db = TempParityDB::new();
    subtests::read_prefixed(&*db);
}

#[test]
fn db_survives_reopen() {
    let mut db = TempParityDB::new();
    db.write_obj("/paych/channel/f01234", &99u64).unwrap();
    db.reopen();
    assert_eq!(db.read_obj::<u64>("/paych/channel/f01234").unwrap(), Some(99));
    assert_eq!(db.setting_keys().unwrap(), vec!["/paych/channel/f01234".to_owned()]);
}

#[test]
fn db_prefixed_keys() {
    let db = TempParityDB::new();
    subtests::prefixed_keys_stop_at_prefix_end(&*db);
}
