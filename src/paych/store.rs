// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use super::locks::SyncKeyedLocks;
use super::{ChannelInfo, Direction, Error, MAX_LANE, MsgInfo, VoucherInfo};
use crate::db::{
    SettingsStore, SettingsStoreExt,
    setting_keys::{PAYCH_CHANNEL_PREFIX, PAYCH_MSG_PREFIX, PAYCH_VOUCHER_PREFIX},
};
use crate::shim::address::Address;
use cid::Cid;
use serde::Serialize;
use tracing::debug;

use super::types::channel_key_for_addr;

type Change = (String, Option<Vec<u8>>);

fn channel_db_key(key: &str) -> String {
    format!("{PAYCH_CHANNEL_PREFIX}{key}")
}

fn msg_db_key(cid: &Cid) -> String {
    format!("{PAYCH_MSG_PREFIX}{cid}")
}

fn voucher_lane_prefix(ch: &Address, lane: u64) -> String {
    format!("{PAYCH_VOUCHER_PREFIX}{ch}/{lane:020}/")
}

fn voucher_db_key(ch: &Address, lane: u64, nonce: u64) -> String {
    format!("{}{nonce:020}", voucher_lane_prefix(ch, lane))
}

fn put<V: Serialize>(key: String, value: &V) -> Result<Change, Error> {
    Ok((key, Some(fvm_ipld_encoding::to_vec(value)?)))
}

/// Durable store of channel records, vouchers and tracked messages.
///
/// Every mutation of a channel record is a read-modify-write under a lock
/// scoped to that record's key, committed in a single database transaction.
/// Records with different keys never contend.
pub struct PaychStore<DB> {
    db: Arc<DB>,
    key_locks: SyncKeyedLocks,
}

impl<DB> PaychStore<DB>
where
    DB: SettingsStore,
{
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            key_locks: Default::default(),
        }
    }

    fn read_channel(&self, key: &str) -> Result<Option<ChannelInfo>, Error> {
        Ok(self.db.read_obj(&channel_db_key(key))?)
    }

    fn require_channel(&self, key: &str) -> Result<ChannelInfo, Error> {
        self.read_channel(key)?
            .ok_or_else(|| Error::ChannelNotFound(key.to_owned()))
    }

    /// Persists a new outbound channel together with the record of its create
    /// message.
    pub fn create_channel(&self, ci: &ChannelInfo, msg: &MsgInfo) -> Result<(), Error> {
        let key = ci.key();
        self.key_locks.with(&key, || {
            self.db.commit_bin(&[
                put(channel_db_key(&key), ci)?,
                put(msg_db_key(&msg.msg_cid), msg)?,
            ])?;
            debug!("stored channel {key} ({} -> {})", ci.control, ci.target);
            Ok(())
        })
    }

    /// Starts tracking a channel created by someone else. Returns the stored
    /// record, which is the existing one if the channel is already tracked.
    pub fn track_channel(&self, ci: ChannelInfo) -> Result<ChannelInfo, Error> {
        let key = ci.key();
        self.key_locks.with(&key, || {
            if let Some(existing) = self.read_channel(&key)? {
                return Ok(existing);
            }
            self.db.write_obj(&channel_db_key(&key), &ci)?;
            debug!("tracking {} channel {key}", ci.direction);
            Ok(ci)
        })
    }

    pub fn by_key(&self, key: &str) -> Result<Option<ChannelInfo>, Error> {
        self.read_channel(key)
    }

    pub fn by_address(&self, ch: &Address) -> Result<ChannelInfo, Error> {
        self.require_channel(&channel_key_for_addr(ch))
    }

    /// The channel a tracked message belongs to, following its rekeying.
    pub fn by_message_cid(&self, mcid: &Cid) -> Result<Option<ChannelInfo>, Error> {
        match self.get_message(mcid)? {
            Some(msg) => self.read_channel(&msg.channel_key),
            None => Ok(None),
        }
    }

    /// The open, outbound channel between `from` and `to`, if any.
    pub fn outbound_active_by_from_to(
        &self,
        from: &Address,
        to: &Address,
    ) -> Result<Option<ChannelInfo>, Error> {
        Ok(self.list_channel_infos()?.into_iter().find(|ci| {
            ci.direction == Direction::Outbound
                && !ci.settling
                && &ci.control == from
                && &ci.target == to
        }))
    }

    pub fn list_channel_infos(&self) -> Result<Vec<ChannelInfo>, Error> {
        Ok(self
            .db
            .read_prefixed::<ChannelInfo>(PAYCH_CHANNEL_PREFIX)?
            .into_iter()
            .map(|(_, ci)| ci)
            .collect())
    }

    /// Addresses of every channel that exists on chain.
    pub fn list_channels(&self) -> Result<Vec<Address>, Error> {
        Ok(self
            .list_channel_infos()?
            .into_iter()
            .filter_map(|ci| ci.channel)
            .collect())
    }

    /// Tracked messages that have not executed yet.
    pub fn with_pending_messages(&self) -> Result<Vec<MsgInfo>, Error> {
        Ok(self
            .db
            .read_prefixed::<MsgInfo>(PAYCH_MSG_PREFIX)?
            .into_iter()
            .map(|(_, msg)| msg)
            .filter(|msg| !msg.received)
            .collect())
    }

    /// Applies `f` to the record stored under `key` and persists the result.
    /// Nothing is written when `f` fails.
    pub fn mutate_channel<F, R>(&self, key: &str, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut ChannelInfo) -> Result<R, Error>,
    {
        self.key_locks.with(key, || {
            let mut ci = self.require_channel(key)?;
            let out = f(&mut ci)?;
            self.db.write_obj(&channel_db_key(key), &ci)?;
            Ok(out)
        })
    }

    /// Records the successful execution of a create message: the channel moves
    /// from its pending key to its address, and its pending funds are
    /// confirmed.
    pub fn resolve_channel(&self, mcid: &Cid, ch: Address) -> Result<ChannelInfo, Error> {
        let mut msg = self
            .get_message(mcid)?
            .ok_or(Error::MessageNotTracked(*mcid))?;
        let old_key = msg.channel_key.clone();
        self.key_locks.with(&old_key, || {
            let mut ci = self.require_channel(&old_key)?;
            if ci.channel.is_some() {
                return Ok(ci);
            }
            ci.channel = Some(ch);
            ci.amount = &ci.amount + &std::mem::take(&mut ci.pending_amount);
            ci.pending_create_msg = None;
            let new_key = ci.key();

            msg.channel_key = new_key.clone();
            msg.received = true;
            msg.err = None;

            let mut changes = vec![put(channel_db_key(&new_key), &ci)?];
            if new_key != old_key {
                changes.push((channel_db_key(&old_key), None));
            }
            changes.push(put(msg_db_key(mcid), &msg)?);
            self.db.commit_bin(&changes)?;
            debug!("channel {old_key} resolved to {new_key}");
            Ok(ci)
        })
    }

    /// Drops the record of a channel whose create message failed and records
    /// the failure on the message. Afterwards the failure can only be looked
    /// up through [`PaychStore::get_message`]; [`PaychStore::by_message_cid`]
    /// and the channel listings no longer see the channel.
    pub fn remove_channel(&self, mcid: &Cid, err: String) -> Result<(), Error> {
        let mut msg = self
            .get_message(mcid)?
            .ok_or(Error::MessageNotTracked(*mcid))?;
        let key = msg.channel_key.clone();
        self.key_locks.with(&key, || {
            msg.received = true;
            msg.err = Some(err);
            self.db
                .commit_bin(&[(channel_db_key(&key), None), put(msg_db_key(mcid), &msg)?])?;
            Ok(())
        })
    }

    /// Records the outcome of an add-funds message. On success the pending
    /// amount becomes confirmed; on failure it is dropped.
    pub fn finish_add_funds(&self, mcid: &Cid, err: Option<String>) -> Result<ChannelInfo, Error> {
        let mut msg = self
            .get_message(mcid)?
            .ok_or(Error::MessageNotTracked(*mcid))?;
        let key = msg.channel_key.clone();
        self.key_locks.with(&key, || {
            let mut ci = self.require_channel(&key)?;
            if ci.pending_create_msg == Some(*mcid) {
                let pending = std::mem::take(&mut ci.pending_amount);
                if err.is_none() {
                    ci.amount = &ci.amount + &pending;
                }
                ci.pending_create_msg = None;
            }
            msg.received = true;
            msg.err = err;
            self.db.commit_bin(&[
                put(channel_db_key(&key), &ci)?,
                put(msg_db_key(mcid), &msg)?,
            ])?;
            Ok(ci)
        })
    }

    /// Hands out the next lane of the channel.
    pub fn allocate_lane(&self, ch: &Address) -> Result<u64, Error> {
        self.mutate_channel(&channel_key_for_addr(ch), |ci| {
            let lane = ci.next_lane;
            if lane > MAX_LANE {
                return Err(Error::VoucherInvalid(format!("lanes of {ch} are exhausted")));
            }
            ci.next_lane = lane + 1;
            Ok(lane)
        })
    }

    /// Stores a voucher and folds it into the channel's lane bookkeeping in
    /// one transaction.
    pub fn put_voucher(&self, info: &VoucherInfo) -> Result<(), Error> {
        let sv = &info.voucher;
        let key = channel_key_for_addr(&sv.channel_addr);
        self.key_locks.with(&key, || {
            let mut ci = self.require_channel(&key)?;
            ci.record_voucher(sv);
            self.db.commit_bin(&[
                put(voucher_db_key(&sv.channel_addr, sv.lane, sv.nonce), info)?,
                put(channel_db_key(&key), &ci)?,
            ])?;
            Ok(())
        })
    }

    pub fn get_voucher(
        &self,
        ch: &Address,
        lane: u64,
        nonce: u64,
    ) -> Result<Option<VoucherInfo>, Error> {
        Ok(self.db.read_obj(&voucher_db_key(ch, lane, nonce))?)
    }

    /// Every voucher of the channel, ordered by lane then nonce.
    pub fn vouchers_for_paych(&self, ch: &Address) -> Result<Vec<VoucherInfo>, Error> {
        Ok(self
            .db
            .read_prefixed::<VoucherInfo>(&format!("{PAYCH_VOUCHER_PREFIX}{ch}/"))?
            .into_iter()
            .map(|(_, info)| info)
            .collect())
    }

    /// Marks the voucher at `nonce` and every older voucher on its lane as
    /// submitted: redeeming a voucher supersedes the ones before it. Returns
    /// `false` if the voucher itself is not stored.
    pub fn mark_voucher_submitted(
        &self,
        ch: &Address,
        lane: u64,
        nonce: u64,
    ) -> Result<bool, Error> {
        self.key_locks.with(&channel_key_for_addr(ch), || {
            let on_lane = self
                .db
                .read_prefixed::<VoucherInfo>(&voucher_lane_prefix(ch, lane))?;
            let found = on_lane.iter().any(|(_, info)| info.voucher.nonce == nonce);
            let mut changes = vec![];
            for (key, mut info) in on_lane {
                if info.voucher.nonce <= nonce && !info.submitted {
                    info.submitted = true;
                    changes.push(put(key, &info)?);
                }
            }
            if !changes.is_empty() {
                self.db.commit_bin(&changes)?;
            }
            Ok(found)
        })
    }

    pub fn get_message(&self, mcid: &Cid) -> Result<Option<MsgInfo>, Error> {
        Ok(self.db.read_obj(&msg_db_key(mcid))?)
    }

    /// Marks a tracked message as executed, with its failure if any.
    pub fn save_msg_result(&self, mcid: &Cid, err: Option<String>) -> Result<MsgInfo, Error> {
        self.key_locks.with(&msg_db_key(mcid), || {
            let mut msg = self
                .get_message(mcid)?
                .ok_or(Error::MessageNotTracked(*mcid))?;
            msg.received = true;
            msg.err = err;
            self.db.write_obj(&msg_db_key(mcid), &msg)?;
            Ok(msg)
        })
    }

    /// Applies `f` to the channel a new message acts on and starts tracking
    /// the message, in one transaction.
    pub fn attach_message<F>(&self, msg: &MsgInfo, f: F) -> Result<ChannelInfo, Error>
    where
        F: FnOnce(&mut ChannelInfo),
    {
        let key = &msg.channel_key;
        self.key_locks.with(key, || {
            let mut ci = self.require_channel(key)?;
            f(&mut ci);
            self.db.commit_bin(&[
                put(channel_db_key(key), &ci)?,
                put(msg_db_key(&msg.msg_cid), msg)?,
            ])?;
            Ok(ci)
        })
    }
}
