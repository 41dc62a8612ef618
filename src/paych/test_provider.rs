// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Scriptable chain, message pool and wallet for payment channel tests.
//!
//! Messages only execute when a test says so, through [`TestProvider::execute`]
//! or its shorthands.

use std::collections::BTreeMap;

use super::provider::{PaychActorState, PaychMessage, PaychProvider, Receipt};
use super::{
    ConstructorParams, ExecParams, ExecReturn, INIT_EXEC_METHOD, PaychMethod, SignedVoucher,
    UpdateChannelStateParams,
};
use crate::shim::{
    address::{Address, INIT_ACTOR_ADDR},
    clock::ChainEpoch,
    crypto::{Signature, SignatureType},
    econ::TokenAmount,
    error::ExitCode,
    message::METHOD_SEND,
};
use crate::utils::cid::{CidCborExt as _, test_cid};
use ahash::{HashMap, HashSet};
use anyhow::{Context as _, bail};
use async_trait::async_trait;
use cid::Cid;
use fvm_ipld_encoding::RawBytes;
use num_traits::Zero as _;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Epochs between a settle message executing and the channel becoming
/// collectable on chain.
pub const CHAIN_SETTLE_DELAY: ChainEpoch = 10;

#[derive(Default)]
struct ChainState {
    sent: Vec<(Cid, PaychMessage)>,
    epoch: ChainEpoch,
    actors: HashMap<Address, PaychActorState>,
    wallet: HashSet<Address>,
    unspendable: HashSet<TokenAmount>,
    next_actor_id: u64,
    wait_calls: usize,
    head_unavailable: bool,
}

#[derive(Default)]
pub struct TestProvider {
    state: Mutex<ChainState>,
    receipts: Mutex<HashMap<Cid, watch::Sender<Option<Receipt>>>>,
}

impl TestProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        provider.state.lock().next_actor_id = 1000;
        provider
    }

    pub fn add_wallet_key(&self, addr: Address) {
        self.state.lock().wallet.insert(addr);
    }

    pub fn set_epoch(&self, epoch: ChainEpoch) {
        self.state.lock().epoch = epoch;
    }

    /// Makes every chain head query fail until reset.
    pub fn set_head_unavailable(&self, unavailable: bool) {
        self.state.lock().head_unavailable = unavailable;
    }

    /// Makes the chain reject redemption of any voucher for `amount`.
    pub fn set_unspendable(&self, amount: TokenAmount) {
        self.state.lock().unspendable.insert(amount);
    }

    pub fn add_actor(&self, ch: Address, state: PaychActorState) {
        self.state.lock().actors.insert(ch, state);
    }

    pub fn actor(&self, ch: &Address) -> Option<PaychActorState> {
        self.state.lock().actors.get(ch).cloned()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    pub fn last_sent(&self) -> (Cid, PaychMessage) {
        self.state.lock().sent.last().cloned().unwrap()
    }

    pub fn wait_calls(&self) -> usize {
        self.state.lock().wait_calls
    }

    /// Signs as the wallet would, for any address.
    pub fn signed(&self, mut sv: SignedVoucher, signer: &Address) -> SignedVoucher {
        sv.signature = Some(fake_signature(signer, &sv.signing_bytes().unwrap()));
        sv
    }

    fn subscribe_receipt(&self, mcid: Cid) -> watch::Receiver<Option<Receipt>> {
        self.receipts
            .lock()
            .entry(mcid)
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    /// Fails every wait currently in progress on `mcid`. Later waits start
    /// over.
    pub fn interrupt_waits(&self, mcid: Cid) {
        self.receipts.lock().remove(&mcid);
    }

    fn publish_receipt(&self, mcid: Cid, receipt: Receipt) {
        self.receipts
            .lock()
            .entry(mcid)
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(receipt));
    }

    /// Executes a sent message with `exit_code`, applying its effects to the
    /// chain when it succeeds. Returns the created channel for create messages.
    pub fn execute(&self, mcid: Cid, exit_code: ExitCode) -> Option<Address> {
        let mut state = self.state.lock();
        let msg = state
            .sent
            .iter()
            .find(|(cid, _)| *cid == mcid)
            .map(|(_, msg)| msg.clone())
            .unwrap();

        let mut created = None;
        let mut return_data = RawBytes::default();
        if exit_code.is_success() {
            if msg.to == INIT_ACTOR_ADDR && msg.method_num == INIT_EXEC_METHOD {
                let exec: ExecParams = msg.params.deserialize().unwrap();
                let params: ConstructorParams = exec.constructor_params.deserialize().unwrap();
                let id_address = Address::new_id(state.next_actor_id);
                state.next_actor_id += 1;
                let robust_address = Address::new_actor(&mcid.to_bytes());
                state.actors.insert(
                    robust_address,
                    PaychActorState {
                        from: params.from,
                        to: params.to,
                        balance: msg.value.clone(),
                        to_send: TokenAmount::zero(),
                        settling_at: 0,
                        min_settle_height: 0,
                        lane_states: BTreeMap::new(),
                    },
                );
                return_data = RawBytes::serialize(ExecReturn {
                    id_address,
                    robust_address,
                })
                .unwrap();
                created = Some(robust_address);
            } else if msg.method_num == METHOD_SEND {
                if let Some(actor) = state.actors.get_mut(&msg.to) {
                    actor.balance = &actor.balance + &msg.value;
                }
            } else if msg.method_num == u64::from(PaychMethod::Settle) {
                let epoch = state.epoch;
                if let Some(actor) = state.actors.get_mut(&msg.to) {
                    actor.settling_at = epoch + CHAIN_SETTLE_DELAY;
                }
            }
        }
        drop(state);

        self.publish_receipt(
            mcid,
            Receipt {
                exit_code,
                return_data,
            },
        );
        created
    }

    /// Executes a create message successfully and returns the new channel.
    pub fn create_ok(&self, mcid: Cid) -> Address {
        self.execute(mcid, ExitCode::OK).unwrap()
    }

    pub fn succeed(&self, mcid: Cid) {
        self.execute(mcid, ExitCode::OK);
    }

    pub fn fail(&self, mcid: Cid) {
        self.execute(mcid, ExitCode::USR_ILLEGAL_STATE);
    }
}

fn fake_signature(addr: &Address, data: &[u8]) -> Signature {
    Signature {
        sig_type: SignatureType::Secp256k1,
        bytes: [addr.to_bytes().as_slice(), data].concat(),
    }
}

#[async_trait]
impl PaychProvider for TestProvider {
    async fn send_message(&self, msg: PaychMessage) -> anyhow::Result<Cid> {
        let mut state = self.state.lock();
        let seq = state.sent.len() as u64;
        let mcid = Cid::from_cbor_blake2b256(&(
            msg.from,
            msg.to,
            msg.method_num,
            &msg.value,
            &msg.params,
            seq,
        ))?;
        state.sent.push((mcid, msg));
        Ok(mcid)
    }

    async fn wait_for_message(&self, msg_cid: Cid, _confidence: i64) -> anyhow::Result<Receipt> {
        self.state.lock().wait_calls += 1;
        let mut rx = self.subscribe_receipt(msg_cid);
        let receipt = rx.wait_for(Option::is_some).await?;
        receipt.clone().context("receipt missing")
    }

    async fn sign(&self, addr: &Address, data: &[u8]) -> anyhow::Result<Signature> {
        if !self.state.lock().wallet.contains(addr) {
            bail!("key not found for {addr}");
        }
        Ok(fake_signature(addr, data))
    }

    async fn verify_signature(
        &self,
        sig: &Signature,
        addr: &Address,
        data: &[u8],
    ) -> anyhow::Result<()> {
        if *sig != fake_signature(addr, data) {
            bail!("signature does not match {addr}");
        }
        Ok(())
    }

    async fn simulate_channel_method(&self, msg: PaychMessage) -> anyhow::Result<Receipt> {
        let params: UpdateChannelStateParams = msg.params.deserialize()?;
        let exit_code = if self.state.lock().unspendable.contains(&params.sv.amount) {
            ExitCode::USR_ILLEGAL_ARGUMENT
        } else {
            ExitCode::OK
        };
        Ok(Receipt {
            exit_code,
            return_data: RawBytes::default(),
        })
    }

    async fn load_paych_state(&self, ch: &Address) -> anyhow::Result<PaychActorState> {
        self.state
            .lock()
            .actors
            .get(ch)
            .cloned()
            .with_context(|| format!("actor {ch} not found"))
    }

    async fn wallet_has(&self, addr: &Address) -> anyhow::Result<bool> {
        Ok(self.state.lock().wallet.contains(addr))
    }

    async fn current_epoch(&self) -> anyhow::Result<ChainEpoch> {
        let state = self.state.lock();
        if state.head_unavailable {
            bail!("chain head unavailable");
        }
        Ok(state.epoch)
    }

    fn paych_actor_code_cid(&self) -> Cid {
        test_cid(b"paych-actor")
    }
}
