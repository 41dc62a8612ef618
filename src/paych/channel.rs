// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::{Arc, Weak};

use super::locks::KeyedLocks;
use super::msg_listener::{MsgCompleteEvt, MsgListeners, MsgSubscriber};
use super::provider::{PaychMessage, PaychProvider};
use super::store::PaychStore;
use super::types::channel_key_for_addr;
use super::{
    ChannelAvailableFunds, ChannelInfo, ChannelResponse, ChannelStatus, ConstructorParams, Error,
    ExecParams, ExecReturn, INIT_EXEC_METHOD, MsgInfo, PaychConfig, PaychMethod, PendingOp,
};
use crate::db::SettingsStore;
use crate::shim::{
    address::{Address, INIT_ACTOR_ADDR},
    clock::ChainEpoch,
    econ::TokenAmount,
    message::METHOD_SEND,
};
use cid::Cid;
use fvm_ipld_encoding::RawBytes;
use num_traits::Zero as _;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Background waiters of in-flight messages. Owned by the manager handle so
/// that dropping the handle stops them.
pub(super) type TaskSet = parking_lot::Mutex<JoinSet<()>>;

/// Shared state behind a [`crate::paych::Manager`]: the channel store, the
/// chain provider, the pending message tracker and the locks serializing work
/// per `(from, to)` pair and per channel.
pub struct ChannelAccessor<DB, P> {
    pub(super) store: PaychStore<DB>,
    pub(super) provider: Arc<P>,
    pub(super) listeners: MsgListeners,
    pub(super) config: PaychConfig,
    pair_locks: KeyedLocks<(Address, Address)>,
    /// Serializes voucher issuance and state changes of one channel.
    pub(super) channel_locks: KeyedLocks<Address>,
    tasks: Weak<TaskSet>,
}

impl<DB, P> ChannelAccessor<DB, P>
where
    DB: SettingsStore + Send + Sync + 'static,
    P: PaychProvider,
{
    pub(super) fn new(
        store: PaychStore<DB>,
        provider: Arc<P>,
        config: PaychConfig,
        tasks: Weak<TaskSet>,
    ) -> Self {
        Self {
            store,
            provider,
            listeners: MsgListeners::new(),
            config,
            pair_locks: Default::default(),
            channel_locks: Default::default(),
            tasks,
        }
    }

    /// Returns a channel from `from` to `to` holding at least `amt`, sending a
    /// create or add-funds message when the existing funding falls short.
    pub async fn get_paych(
        self: &Arc<Self>,
        from: Address,
        to: Address,
        amt: TokenAmount,
    ) -> Result<ChannelResponse, Error> {
        let _guard = self.pair_locks.lock((from, to)).await;

        loop {
            let Some(ci) = self.store.outbound_active_by_from_to(&from, &to)? else {
                return self.create_paych(from, to, amt).await;
            };

            if ci.total_funding() >= amt {
                return Ok(ChannelResponse {
                    channel: ci.channel,
                    wait_sentinel: ci.pending_create_msg,
                });
            }

            let Some(mcid) = ci.pending_create_msg else {
                let shortfall = &amt - &ci.amount;
                return self.add_funds(&ci, shortfall).await;
            };

            // The in-flight message does not cover the request. Let it land,
            // then look again.
            debug!("waiting for funding message {mcid} before topping up {from} -> {to}");
            if let Err(e) = self.get_paych_wait_ready(mcid).await {
                let still_pending = self
                    .store
                    .by_message_cid(&mcid)?
                    .is_some_and(|ci| ci.pending_create_msg == Some(mcid));
                if still_pending {
                    return Err(e);
                }
            }
        }
    }

    async fn create_paych(
        self: &Arc<Self>,
        from: Address,
        to: Address,
        amt: TokenAmount,
    ) -> Result<ChannelResponse, Error> {
        let params = ExecParams {
            code_cid: self.provider.paych_actor_code_cid(),
            constructor_params: RawBytes::serialize(ConstructorParams { from, to })?,
        };
        let mcid = self
            .provider
            .send_message(PaychMessage {
                from,
                to: INIT_ACTOR_ADDR,
                method_num: INIT_EXEC_METHOD,
                value: amt.clone(),
                params: RawBytes::serialize(params)?,
            })
            .await?;

        let ci = ChannelInfo::new_pending(from, to, mcid, amt.clone());
        let msg = MsgInfo::new(mcid, ci.key(), PendingOp::Create);
        self.store.create_channel(&ci, &msg)?;
        info!("sent create message {mcid} for channel {from} -> {to} with {amt}");
        self.arm(msg);

        Ok(ChannelResponse {
            channel: None,
            wait_sentinel: Some(mcid),
        })
    }

    async fn add_funds(
        self: &Arc<Self>,
        ci: &ChannelInfo,
        amt: TokenAmount,
    ) -> Result<ChannelResponse, Error> {
        let ch = ci.channel.ok_or_else(|| Error::ChannelNotFound(ci.key()))?;
        let mcid = self
            .provider
            .send_message(PaychMessage {
                from: ci.control,
                to: ch,
                method_num: METHOD_SEND,
                value: amt.clone(),
                params: RawBytes::default(),
            })
            .await?;

        let msg = MsgInfo::new(mcid, ci.key(), PendingOp::AddFunds);
        self.store.attach_message(&msg, |ci| {
            ci.pending_create_msg = Some(mcid);
            ci.pending_amount = amt.clone();
        })?;
        info!("sent add funds message {mcid} to channel {ch} with {amt}");
        self.arm(msg);

        Ok(ChannelResponse {
            channel: Some(ch),
            wait_sentinel: Some(mcid),
        })
    }

    /// Waits until the message `mcid` has executed and returns the channel it
    /// funded. Messages that already executed answer from the store.
    pub async fn get_paych_wait_ready(self: &Arc<Self>, mcid: Cid) -> Result<Address, Error> {
        // Subscribe before reading the store: a waiter always persists before
        // it fires, so one of the two sees the outcome.
        let sub = self.listeners.subscribe(&mcid);
        let msg = self
            .store
            .get_message(&mcid)?
            .ok_or(Error::MessageNotTracked(mcid))?;
        if msg.received {
            return self.stored_outcome(&msg);
        }

        let sub = match sub {
            Some(sub) => sub,
            None => match self.arm(msg) {
                Some(sub) => sub,
                None => {
                    let msg = self
                        .store
                        .get_message(&mcid)?
                        .ok_or(Error::MessageNotTracked(mcid))?;
                    return self.stored_outcome(&msg);
                }
            },
        };

        match sub.wait().await {
            Some(res) => res,
            None => Err(Error::Other(format!("stopped tracking message {mcid}"))),
        }
    }

    fn stored_outcome(&self, msg: &MsgInfo) -> Result<Address, Error> {
        if !msg.received {
            return Err(Error::Other(format!(
                "message {} has not executed yet",
                msg.msg_cid
            )));
        }
        if let Some(err) = &msg.err {
            return Err(match msg.op {
                PendingOp::Create | PendingOp::AddFunds => Error::CreateFailed(err.clone()),
                PendingOp::Settle | PendingOp::Collect => Error::Other(err.clone()),
            });
        }
        self.store
            .by_key(&msg.channel_key)?
            .and_then(|ci| ci.channel)
            .ok_or_else(|| Error::ChannelNotFound(msg.channel_key.clone()))
    }

    /// Starts a background waiter for `msg` unless one is already running, and
    /// subscribes to its completion.
    pub(super) fn arm(self: &Arc<Self>, msg: MsgInfo) -> Option<MsgSubscriber> {
        let mcid = msg.msg_cid;
        let newly_armed = self.listeners.track(mcid);
        let sub = self.listeners.subscribe(&mcid);
        if newly_armed {
            match self.tasks.upgrade() {
                Some(tasks) => {
                    let this = Arc::clone(self);
                    let mut tasks = tasks.lock();
                    while tasks.try_join_next().is_some() {}
                    tasks.spawn(async move { this.wait_for_msg(msg).await });
                }
                None => self.listeners.abandon(&mcid),
            }
        }
        sub
    }

    async fn wait_for_msg(self: Arc<Self>, msg: MsgInfo) {
        let mcid = msg.msg_cid;
        let receipt = match self
            .provider
            .wait_for_message(mcid, self.config.message_confidence)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                // Not terminal: the message is re-armed by the next wait or
                // restart.
                warn!("failed to wait for message {mcid}: {e:#}");
                self.listeners
                    .fire_msg_complete(&mcid, Err(Error::Other(format!("{e:#}"))));
                return;
            }
        };

        let failure = (!receipt.exit_code.is_success()).then(|| {
            format!(
                "{} message {mcid} failed with exit code {}",
                msg.op,
                receipt.exit_code.value()
            )
        });
        let res = self
            .record_outcome(&msg, &receipt.return_data, failure)
            .await;
        if let Err(e) = &res {
            warn!("{} message {mcid}: {e}", msg.op);
        }
        self.listeners.fire_msg_complete(&mcid, res);
    }

    /// Persists the outcome of an executed message.
    async fn record_outcome(
        &self,
        msg: &MsgInfo,
        return_data: &RawBytes,
        failure: Option<String>,
    ) -> MsgCompleteEvt {
        let mcid = &msg.msg_cid;
        match msg.op {
            PendingOp::Create => {
                let decoded = match failure {
                    Some(err) => Err(err),
                    None => fvm_ipld_encoding::from_slice::<ExecReturn>(return_data.bytes())
                        .map_err(|e| format!("decoding create return of {mcid}: {e}")),
                };
                match decoded {
                    Ok(ret) => {
                        let ci = self.store.resolve_channel(mcid, ret.robust_address)?;
                        info!(
                            "channel {} -> {} created at {}",
                            ci.control, ci.target, ret.robust_address
                        );
                        Ok(ret.robust_address)
                    }
                    Err(err) => {
                        self.store.remove_channel(mcid, err.clone())?;
                        Err(Error::CreateFailed(err))
                    }
                }
            }
            PendingOp::AddFunds => {
                let ci = self.store.finish_add_funds(mcid, failure.clone())?;
                if let Some(err) = failure {
                    return Err(Error::CreateFailed(err));
                }
                let ch = ci.channel.ok_or_else(|| Error::ChannelNotFound(ci.key()))?;
                info!("funds added to channel {ch}, now {}", ci.amount);
                Ok(ch)
            }
            PendingOp::Settle | PendingOp::Collect => {
                let ci = self
                    .store
                    .by_key(&msg.channel_key)?
                    .ok_or_else(|| Error::ChannelNotFound(msg.channel_key.clone()))?;
                let ch = ci.channel.ok_or_else(|| Error::ChannelNotFound(ci.key()))?;
                if failure.is_none() && msg.op == PendingOp::Settle {
                    self.refresh_settling_at(ch).await;
                }
                self.store.save_msg_result(mcid, failure.clone())?;
                match failure {
                    Some(err) => {
                        error!("{err}");
                        Err(Error::Other(err))
                    }
                    None => {
                        info!("{} of channel {ch} executed", msg.op);
                        Ok(ch)
                    }
                }
            }
        }
    }

    /// Replaces the locally estimated settlement epoch with the one on chain.
    async fn refresh_settling_at(&self, ch: Address) {
        let state = match self.provider.load_paych_state(&ch).await {
            Ok(state) => state,
            Err(e) => {
                warn!("failed to load state of settled channel {ch}: {e:#}");
                return;
            }
        };
        if state.settling_at > 0 {
            let res = self.store.mutate_channel(&channel_key_for_addr(&ch), |ci| {
                ci.settling_at = Some(state.settling_at);
                Ok(())
            });
            if let Err(e) = res {
                warn!("failed to record settlement epoch of {ch}: {e}");
            }
        }
    }

    /// Re-arms every message that had not executed when the store was last
    /// used.
    pub(super) fn restart_pending(self: &Arc<Self>) -> Result<usize, Error> {
        let pending = self.store.with_pending_messages()?;
        let count = pending.len();
        for msg in pending {
            debug!("re-arming {} message {}", msg.op, msg.msg_cid);
            self.arm(msg);
        }
        if count > 0 {
            info!("resumed tracking of {count} payment channel messages");
        }
        Ok(count)
    }

    /// Sends the settle message and marks the channel as settling right away,
    /// so that it is no longer handed out for new payments.
    pub async fn settle(self: &Arc<Self>, ch: Address) -> Result<Cid, Error> {
        let _guard = self.channel_locks.lock(ch).await;

        let ci = self.store.by_address(&ch)?;
        // Nothing may fail between sending and recording the message.
        let settling_at = self.provider.current_epoch().await? + self.config.settle_delay;
        let mcid = self
            .provider
            .send_message(PaychMessage {
                from: ci.control,
                to: ch,
                method_num: PaychMethod::Settle.into(),
                value: TokenAmount::zero(),
                params: RawBytes::default(),
            })
            .await?;

        let msg = MsgInfo::new(mcid, ci.key(), PendingOp::Settle);
        self.store.attach_message(&msg, |ci| {
            ci.settling = true;
            ci.settling_at = Some(settling_at);
            ci.settle_msg = Some(mcid);
        })?;
        info!("sent settle message {mcid} for channel {ch}, collectable from epoch {settling_at}");
        self.arm(msg);
        Ok(mcid)
    }

    /// Sends the collect message once the settlement delay has elapsed.
    pub async fn collect(self: &Arc<Self>, ch: Address) -> Result<Cid, Error> {
        let _guard = self.channel_locks.lock(ch).await;

        let ci = self.store.by_address(&ch)?;
        let current = self.provider.current_epoch().await?;
        if !is_collectable(&ci, current) {
            return Err(Error::SettlementNotReady {
                current,
                ready_at: ci.settling_at,
            });
        }

        let mcid = self
            .provider
            .send_message(PaychMessage {
                from: ci.control,
                to: ch,
                method_num: PaychMethod::Collect.into(),
                value: TokenAmount::zero(),
                params: RawBytes::default(),
            })
            .await?;
        let msg = MsgInfo::new(mcid, ci.key(), PendingOp::Collect);
        self.store.attach_message(&msg, |ci| ci.collect_msg = Some(mcid))?;
        info!("sent collect message {mcid} for channel {ch}");
        self.arm(msg);
        Ok(mcid)
    }

    pub async fn channel_status(&self, ch: Address) -> Result<ChannelStatus, Error> {
        let ci = self.store.by_address(&ch)?;
        let current = self.provider.current_epoch().await?;
        Ok(ChannelStatus {
            channel: ch,
            control: ci.control,
            target: ci.target,
            direction: ci.direction,
            settling: ci.settling,
            settling_at: ci.settling_at,
            collectable: is_collectable(&ci, current),
        })
    }
}

pub(super) fn available_funds(
    ci: Option<&ChannelInfo>,
    from: Address,
    to: Address,
) -> ChannelAvailableFunds {
    let Some(ci) = ci else {
        return ChannelAvailableFunds {
            channel: None,
            from,
            to,
            confirmed_amt: TokenAmount::zero(),
            pending_amt: TokenAmount::zero(),
            pending_wait_sentinel: None,
            voucher_redeemed_amt: TokenAmount::zero(),
            spendable_amt: TokenAmount::zero(),
        };
    };
    let redeemed = ci.total_lane_value();
    let spendable = if ci.amount > redeemed {
        &ci.amount - &redeemed
    } else {
        TokenAmount::zero()
    };
    ChannelAvailableFunds {
        channel: ci.channel,
        from: ci.from(),
        to: ci.to(),
        confirmed_amt: ci.amount.clone(),
        pending_amt: ci.pending_amount.clone(),
        pending_wait_sentinel: ci.pending_create_msg,
        voucher_redeemed_amt: redeemed,
        spendable_amt: spendable,
    }
}

fn is_collectable(ci: &ChannelInfo, current: ChainEpoch) -> bool {
    ci.settling && ci.settling_at.is_some_and(|at| current >= at)
}
