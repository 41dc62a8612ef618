// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use crate::shim::{
    address::Address,
    clock::ChainEpoch,
    crypto::Signature,
    econ::TokenAmount,
    error::ExitCode,
    message::MethodNum,
};
use async_trait::async_trait;
use cid::Cid;
use fvm_ipld_encoding::RawBytes;

/// An unsigned message the manager wants on chain. The message pool fills in
/// sequence and gas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaychMessage {
    pub from: Address,
    pub to: Address,
    pub method_num: MethodNum,
    pub value: TokenAmount,
    pub params: RawBytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub exit_code: ExitCode,
    pub return_data: RawBytes,
}

/// On-chain state of one lane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneState {
    pub redeemed: TokenAmount,
    pub nonce: u64,
}

/// The parts of payment channel actor state the manager reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaychActorState {
    /// Key address of the payer.
    pub from: Address,
    /// Key address of the payee.
    pub to: Address,
    /// Actor balance.
    pub balance: TokenAmount,
    /// Amount already owed to `to` by redeemed vouchers.
    pub to_send: TokenAmount,
    /// Zero while the channel is not settling.
    pub settling_at: ChainEpoch,
    pub min_settle_height: ChainEpoch,
    pub lane_states: BTreeMap<u64, LaneState>,
}

/// Chain, message pool and wallet access needed by the payment channel
/// manager.
///
/// Implementations are expected to be cheap to call concurrently; the manager
/// never caches their answers.
#[async_trait]
pub trait PaychProvider: Send + Sync + 'static {
    /// Signs the message with the `from` key and pushes it to the message
    /// pool. Success means the message was accepted, not executed.
    async fn send_message(&self, msg: PaychMessage) -> anyhow::Result<Cid>;

    /// Blocks until the message has been executed and buried under
    /// `confidence` epochs.
    async fn wait_for_message(&self, msg_cid: Cid, confidence: i64) -> anyhow::Result<Receipt>;

    /// Signs arbitrary bytes with the wallet key of `addr`.
    async fn sign(&self, addr: &Address, data: &[u8]) -> anyhow::Result<Signature>;

    /// Verifies `sig` over `data` against `addr`, resolving `addr` to its key
    /// address when needed.
    async fn verify_signature(
        &self,
        sig: &Signature,
        addr: &Address,
        data: &[u8],
    ) -> anyhow::Result<()>;

    /// Applies the message on top of the current head without committing any
    /// state.
    async fn simulate_channel_method(&self, msg: PaychMessage) -> anyhow::Result<Receipt>;

    async fn load_paych_state(&self, ch: &Address) -> anyhow::Result<PaychActorState>;

    /// Whether the local wallet holds the key for `addr`.
    async fn wallet_has(&self, addr: &Address) -> anyhow::Result<bool>;

    async fn current_epoch(&self) -> anyhow::Result<ChainEpoch>;

    /// Code CID of the payment channel actor at the current network version.
    fn paych_actor_code_cid(&self) -> Cid;
}
