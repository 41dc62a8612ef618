// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::Error;
use crate::shim::address::Address;
use ahash::HashMap;
use cid::Cid;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Outcome of a channel message: the channel it acted on, or why it failed.
pub type MsgCompleteEvt = Result<Address, Error>;

/// Completion cells for in-flight channel messages.
///
/// Each tracked message owns a single-value broadcast cell. Any number of
/// tasks may wait on it, and all of them observe the same result, including
/// tasks that subscribe after it was fired but before they dropped their
/// subscription. The cell is removed once fired; by then the outcome is in the
/// channel store, which is where late callers look first.
#[derive(Default)]
pub struct MsgListeners {
    pending: Mutex<HashMap<Cid, watch::Sender<Option<MsgCompleteEvt>>>>,
}

impl MsgListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a completion cell for `mcid`. Returns `false` if one was already
    /// armed, in which case the caller must not start a second waiter.
    pub fn track(&self, mcid: Cid) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains_key(&mcid) {
            return false;
        }
        let (tx, _) = watch::channel(None);
        pending.insert(mcid, tx);
        true
    }

    /// Subscribes to the completion of `mcid`, if it is being tracked.
    pub fn subscribe(&self, mcid: &Cid) -> Option<MsgSubscriber> {
        self.pending
            .lock()
            .get(mcid)
            .map(|tx| MsgSubscriber(tx.subscribe()))
    }

    /// Releases every waiter of `mcid` with `res`. Callers persist the outcome
    /// before firing.
    pub fn fire_msg_complete(&self, mcid: &Cid, res: MsgCompleteEvt) {
        if let Some(tx) = self.pending.lock().remove(mcid) {
            tx.send_replace(Some(res));
        }
    }

    /// Drops the cell for `mcid` without a result. Waiters see `None`.
    pub fn abandon(&self, mcid: &Cid) {
        self.pending.lock().remove(mcid);
    }
}

pub struct MsgSubscriber(watch::Receiver<Option<MsgCompleteEvt>>);

impl MsgSubscriber {
    /// Waits for the message to complete. `None` means the tracker dropped the
    /// message without an outcome; the channel store is then authoritative.
    pub async fn wait(mut self) -> Option<MsgCompleteEvt> {
        match self.0.wait_for(Option::is_some).await {
            Ok(res) => res.clone(),
            Err(_) => None,
        }
    }
}
