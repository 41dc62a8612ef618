// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::db::{SettingsStore, SettingsStoreExt};

pub fn write_bin<DB>(db: &DB)
where
    DB: SettingsStore,
{
    let key = "1";
    let value = [1];
    db.write_bin(key, &value).unwrap();
}

pub fn read_bin<DB>(db: &DB)
where
    DB: SettingsStore,
{
    let key = "0";
    let value = [1];
    db.write_bin(key, &value).unwrap();
    let res = db.read_bin(key).unwrap().unwrap();
    assert_eq!(value.as_ref(), res.as_slice());
}

pub fn write_read_obj<DB>(db: &DB)
where
    DB: SettingsStore,
{
    let key = "Cthulhu";
    let value = 42;
    db.write_obj(key, &value).unwrap();
    let res: i32 = db.read_obj(key).unwrap().unwrap();
    assert_eq!(value, res);

    // channel records are rewritten in place on every mutation, so the
    // settings column must allow overwrites.
    let value = 1337;
    db.write_obj(key, &value).unwrap();
    let res: i32 = db.read_obj(key).unwrap().unwrap();
    assert_eq!(value, res);
}

pub fn exists<DB>(db: &DB)
where
    DB: SettingsStore,
{
    let key = "0";
    let value = [1];
    db.write_bin(key, &value).unwrap();
    let res = db.exists(key).unwrap();
    assert!(res);
}

pub fn does_not_exist<DB>(db: &DB)
where
    DB: SettingsStore,
{
    let key = "Azathoth";

    assert!(!db.exists(key).unwrap());
    assert!(db.read_obj::<i32>(key).unwrap().is_none());
    assert!(db.require_obj::<i32>(key).is_err());
}

pub fn commit_moves_key<DB>(db: &DB)
where
    DB: SettingsStore,
{
    db.write_obj("/pending/a", &7u64).unwrap();
    db.commit_bin(&[
        (
            "/resolved/a".to_owned(),
            Some(fvm_ipld_encoding::to_vec(&7u64).unwrap()),
        ),
        ("/pending/a".to_owned(), None),
    ])
    .unwrap();

    assert!(!db.exists("/pending/a").unwrap());
    assert_eq!(db.read_obj::<u64>("/resolved/a").unwrap(), Some(7));
}

pub fn delete<DB>(db: &DB)
where
    DB: SettingsStore,
{
    db.write_bin("Nyarlathotep", &[3]).unwrap();
    db.delete("Nyarlathotep").unwrap();
    assert!(!db.exists("Nyarlathotep").unwrap());
    // deleting a missing key is not an error
    db.delete("Nyarlathotep").unwrap();
}

pub fn read_prefixed<DB>(db: &DB)
where
    DB: SettingsStore,
{
    db.write_obj("/b/2", &2u64).unwrap();
    db.write_obj("/a/1", &10u64).unwrap();
    db.write_obj("/b/1", &1u64).unwrap();

    let values = db.read_prefixed::<u64>("/b/").unwrap();
    assert_eq!(
        values,
        vec![("/b/1".to_owned(), 1), ("/b/2".to_owned(), 2)]
    );
}

pub fn prefixed_keys_stop_at_prefix_end<DB>(db: &DB)
where
    DB: SettingsStore,
{
    for key in ["/paych/msg/b", "/paych/channel/z", "/paych/msg/a", "/paych/msgs", "/paych/mr"] {
        db.write_bin(key, &[0]).unwrap();
    }
    assert_eq!(
        db.prefixed_keys("/paych/msg/").unwrap(),
        vec!["/paych/msg/a".to_owned(), "/paych/msg/b".to_owned()]
    );
    assert!(db.prefixed_keys("/paych/voucher/").unwrap().is_empty());
    assert!(db.prefixed_keys("/zzz").unwrap().is_empty());
}
