// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use super::channel::{ChannelAccessor, TaskSet, available_funds};
use super::provider::PaychProvider;
use super::store::PaychStore;
use super::types::channel_key_for_addr;
use super::{
    ChannelAvailableFunds, ChannelInfo, ChannelResponse, ChannelStatus, Error, ModVerifyParams,
    PaychConfig, SignedVoucher, VoucherCreateResult, VoucherInfo, VoucherSpec,
};
use crate::db::SettingsStore;
use crate::shim::{address::Address, econ::TokenAmount};
use cid::Cid;
use tokio::task::JoinSet;
use tracing::info;

/// Thread safe payment channel management.
///
/// Dropping the manager stops every background message waiter. Outcomes that
/// were not observed yet are picked up again by [`Manager::start`] on the
/// next manager opened over the same store.
pub struct Manager<DB, P> {
    inner: Arc<ChannelAccessor<DB, P>>,
    _tasks: Arc<TaskSet>,
}

impl<DB, P> Manager<DB, P>
where
    DB: SettingsStore + Send + Sync + 'static,
    P: PaychProvider,
{
    pub fn new(db: Arc<DB>, provider: Arc<P>, config: PaychConfig) -> Self {
        let tasks = Arc::new(parking_lot::Mutex::new(JoinSet::new()));
        let inner = Arc::new(ChannelAccessor::new(
            PaychStore::new(db),
            provider,
            config,
            Arc::downgrade(&tasks),
        ));
        Self {
            inner,
            _tasks: tasks,
        }
    }

    /// Restarts tracking of messages that were sent but had not executed when
    /// the store was last used. Returns how many were re-armed.
    pub async fn start(&self) -> Result<usize, Error> {
        self.inner.restart_pending()
    }

    pub fn config(&self) -> &PaychConfig {
        &self.inner.config
    }

    /// Gets a channel from `from` to `to` funded with at least `amt`, creating
    /// or topping it up as needed. Wait on the returned sentinel before
    /// relying on the funds.
    pub async fn get_paych(
        &self,
        from: Address,
        to: Address,
        amt: TokenAmount,
    ) -> Result<ChannelResponse, Error> {
        self.inner.get_paych(from, to, amt).await
    }

    pub async fn get_paych_wait_ready(&self, mcid: Cid) -> Result<Address, Error> {
        self.inner.get_paych_wait_ready(mcid).await
    }

    pub async fn available_funds(&self, ch: Address) -> Result<ChannelAvailableFunds, Error> {
        let ci = self.inner.store.by_address(&ch)?;
        Ok(available_funds(Some(&ci), ci.from(), ci.to()))
    }

    pub async fn available_funds_by_from_to(
        &self,
        from: Address,
        to: Address,
    ) -> Result<ChannelAvailableFunds, Error> {
        let ci = self.inner.store.outbound_active_by_from_to(&from, &to)?;
        Ok(available_funds(ci.as_ref(), from, to))
    }

    pub async fn allocate_lane(&self, ch: Address) -> Result<u64, Error> {
        self.inner.store.allocate_lane(&ch)
    }

    pub async fn create_voucher(
        &self,
        ch: Address,
        amount: TokenAmount,
        lane: u64,
        extra: Option<ModVerifyParams>,
    ) -> Result<VoucherCreateResult, Error> {
        self.create_voucher_from_spec(
            ch,
            VoucherSpec {
                amount,
                lane,
                extra,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn create_voucher_from_spec(
        &self,
        ch: Address,
        spec: VoucherSpec,
    ) -> Result<VoucherCreateResult, Error> {
        self.inner.create_voucher(ch, spec).await
    }

    pub async fn list_vouchers(&self, ch: Address) -> Result<Vec<VoucherInfo>, Error> {
        self.inner.store.by_address(&ch)?;
        self.inner.store.vouchers_for_paych(&ch)
    }

    /// Adds a voucher received from the payer. The channel is tracked first
    /// if this node has not seen it yet.
    pub async fn add_voucher_inbound(
        &self,
        ch: Address,
        sv: SignedVoucher,
        proof: Vec<u8>,
        min_delta: TokenAmount,
    ) -> Result<TokenAmount, Error> {
        self.track_inbound_channel(ch).await?;
        self.inner.add_voucher(ch, sv, proof, min_delta).await
    }

    /// Adds a voucher to a channel this node pays into.
    pub async fn add_voucher_outbound(
        &self,
        ch: Address,
        sv: SignedVoucher,
        proof: Vec<u8>,
        min_delta: TokenAmount,
    ) -> Result<TokenAmount, Error> {
        self.inner.add_voucher(ch, sv, proof, min_delta).await
    }

    pub async fn check_voucher_valid(&self, ch: Address, sv: &SignedVoucher) -> Result<(), Error> {
        let ci = self.track_inbound_channel(ch).await?;
        self.inner.check_voucher_valid(&ci, sv).await.map(|_| ())
    }

    pub async fn check_voucher_spendable(
        &self,
        ch: Address,
        sv: &SignedVoucher,
        secret: &[u8],
        proof: &[u8],
    ) -> Result<bool, Error> {
        self.inner.store.by_address(&ch)?;
        self.inner
            .check_voucher_spendable(ch, sv, secret, proof)
            .await
    }

    pub async fn submit_voucher(
        &self,
        ch: Address,
        sv: SignedVoucher,
        secret: Vec<u8>,
        proof: Vec<u8>,
    ) -> Result<Cid, Error> {
        self.inner.submit_voucher(ch, sv, secret, proof).await
    }

    pub async fn best_spendable_by_lane(
        &self,
        ch: Address,
    ) -> Result<BTreeMap<u64, SignedVoucher>, Error> {
        self.inner.store.by_address(&ch)?;
        self.inner.best_spendable_by_lane(ch).await
    }

    pub async fn settle(&self, ch: Address) -> Result<Cid, Error> {
        self.inner.settle(ch).await
    }

    pub async fn collect(&self, ch: Address) -> Result<Cid, Error> {
        self.inner.collect(ch).await
    }

    pub async fn list_channels(&self) -> Result<Vec<Address>, Error> {
        self.inner.store.list_channels()
    }

    pub async fn get_channel_info(&self, ch: Address) -> Result<ChannelInfo, Error> {
        self.inner.store.by_address(&ch)
    }

    pub async fn channel_status(&self, ch: Address) -> Result<ChannelStatus, Error> {
        self.inner.channel_status(ch).await
    }

    pub async fn next_sequence_for_lane(&self, ch: Address, lane: u64) -> Result<u64, Error> {
        self.inner.next_sequence_for_lane(ch, lane)
    }

    async fn track_inbound_channel(&self, ch: Address) -> Result<ChannelInfo, Error> {
        if let Some(ci) = self.inner.store.by_key(&channel_key_for_addr(&ch))? {
            return Ok(ci);
        }
        let provider = &self.inner.provider;
        let state = provider.load_paych_state(&ch).await?;
        if !provider.wallet_has(&state.to).await? {
            return Err(Error::VoucherInvalid(format!(
                "cannot track channel {ch}: the wallet does not hold recipient {}",
                state.to
            )));
        }
        let ci = self.inner.store.track_channel(ChannelInfo::new_inbound(
            ch,
            state.to,
            state.from,
            state.balance,
        ))?;
        info!("tracking inbound channel {ch} from {}", ci.target);
        Ok(ci)
    }
}
