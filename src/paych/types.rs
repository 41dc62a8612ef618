// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::shim::{
    address::Address,
    clock::ChainEpoch,
    crypto::Signature,
    econ::TokenAmount,
    message::MethodNum,
};
use cid::Cid;
use fvm_ipld_encoding::{RawBytes, strict_bytes, tuple::*};
use num_traits::Zero as _;
use serde::{Deserialize, Serialize};

/// Payment channel actor methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum PaychMethod {
    Constructor = 1,
    UpdateChannelState = 2,
    Settle = 3,
    Collect = 4,
}

impl From<PaychMethod> for MethodNum {
    fn from(method: PaychMethod) -> Self {
        method as MethodNum
    }
}

/// Init actor `Exec` method number.
pub const INIT_EXEC_METHOD: MethodNum = 2;

/// Highest lane id the payment channel actor accepts.
pub const MAX_LANE: u64 = i64::MAX as u64;

/// Which side of the channel the local node is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Direction {
    /// The local party receives vouchers.
    Inbound,
    /// The local party pays.
    Outbound,
}

/// Bookkeeping for one lane of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneInfo {
    pub id: u64,
    /// Highest cumulative voucher amount seen on this lane.
    pub highest: TokenAmount,
    /// Nonce of the voucher carrying `highest`.
    pub nonce: u64,
}

/// The state of a payment channel as tracked by this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Robust address of the channel actor, unknown until the create message executes.
    pub channel: Option<Address>,
    /// The party this node represents.
    pub control: Address,
    /// The counterparty.
    pub target: Address,
    pub direction: Direction,
    /// Outstanding create or add-funds message.
    pub pending_create_msg: Option<Cid>,
    /// Funds confirmed on chain.
    pub amount: TokenAmount,
    /// Funds carried by `pending_create_msg`.
    pub pending_amount: TokenAmount,
    pub next_lane: u64,
    #[serde(default)]
    pub lanes: Vec<LaneInfo>,
    #[serde(default)]
    pub settling: bool,
    /// First epoch at which the channel may be collected.
    #[serde(default)]
    pub settling_at: Option<ChainEpoch>,
    #[serde(default)]
    pub settle_msg: Option<Cid>,
    #[serde(default)]
    pub collect_msg: Option<Cid>,
}

impl ChannelInfo {
    /// A freshly requested outbound channel, addressed by its create message.
    pub fn new_pending(from: Address, to: Address, create_msg: Cid, amount: TokenAmount) -> Self {
        Self {
            channel: None,
            control: from,
            target: to,
            direction: Direction::Outbound,
            pending_create_msg: Some(create_msg),
            amount: TokenAmount::zero(),
            pending_amount: amount,
            next_lane: 0,
            lanes: vec![],
            settling: false,
            settling_at: None,
            settle_msg: None,
            collect_msg: None,
        }
    }

    /// A channel someone else opened towards a local wallet address.
    pub fn new_inbound(
        ch: Address,
        control: Address,
        target: Address,
        amount: TokenAmount,
    ) -> Self {
        Self {
            channel: Some(ch),
            control,
            target,
            direction: Direction::Inbound,
            pending_create_msg: None,
            amount,
            pending_amount: TokenAmount::zero(),
            next_lane: 0,
            lanes: vec![],
            settling: false,
            settling_at: None,
            settle_msg: None,
            collect_msg: None,
        }
    }

    /// Store key: the resolved address, or the pending create message.
    pub fn key(&self) -> String {
        match (&self.channel, &self.pending_create_msg) {
            (Some(addr), _) => channel_key_for_addr(addr),
            (None, Some(cid)) => channel_key_for_msg(cid),
            // unreachable for records written by the store
            (None, None) => format!("{}->{}", self.control, self.target),
        }
    }

    /// The paying party.
    pub fn from(&self) -> Address {
        match self.direction {
            Direction::Outbound => self.control,
            Direction::Inbound => self.target,
        }
    }

    /// The receiving party.
    pub fn to(&self) -> Address {
        match self.direction {
            Direction::Outbound => self.target,
            Direction::Inbound => self.control,
        }
    }

    pub fn lane(&self, id: u64) -> Option<&LaneInfo> {
        self.lanes.iter().find(|lane| lane.id == id)
    }

    pub fn lane_highest(&self, id: u64) -> TokenAmount {
        self.lane(id)
            .map(|lane| lane.highest.clone())
            .unwrap_or_default()
    }

    /// Confirmed funds plus funds on their way.
    pub fn total_funding(&self) -> TokenAmount {
        &self.amount + &self.pending_amount
    }

    /// Sum of the highest voucher over every lane.
    pub fn total_lane_value(&self) -> TokenAmount {
        self.lanes
            .iter()
            .fold(TokenAmount::zero(), |acc, lane| acc + &lane.highest)
    }

    /// Records a voucher on its lane. Lower amounts never replace higher ones.
    pub fn record_voucher(&mut self, sv: &SignedVoucher) {
        match self.lanes.iter_mut().find(|lane| lane.id == sv.lane) {
            Some(lane) => {
                if sv.amount >= lane.highest {
                    lane.highest = sv.amount.clone();
                    lane.nonce = lane.nonce.max(sv.nonce);
                }
            }
            None => self.lanes.push(LaneInfo {
                id: sv.lane,
                highest: sv.amount.clone(),
                nonce: sv.nonce,
            }),
        }
        if self.next_lane <= sv.lane {
            self.next_lane = sv.lane.saturating_add(1);
        }
    }
}

pub fn channel_key_for_addr(addr: &Address) -> String {
    addr.to_string()
}

pub fn channel_key_for_msg(cid: &Cid) -> String {
    format!("msg:{cid}")
}

/// Extra verification a voucher asks the channel actor to perform on redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ModVerifyParams {
    pub actor: Address,
    pub method: MethodNum,
    pub data: RawBytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Merge {
    pub lane: u64,
    pub nonce: u64,
}

/// A signed, cumulative claim on one lane of a payment channel.
#[derive(Debug, Clone, PartialEq, Serialize_tuple, Deserialize_tuple)]
pub struct SignedVoucher {
    pub channel_addr: Address,
    pub time_lock_min: ChainEpoch,
    /// Zero means no upper bound.
    pub time_lock_max: ChainEpoch,
    #[serde(with = "strict_bytes")]
    pub secret_pre_image: Vec<u8>,
    pub extra: Option<ModVerifyParams>,
    pub lane: u64,
    pub nonce: u64,
    pub amount: TokenAmount,
    pub min_settle_height: ChainEpoch,
    pub merges: Vec<Merge>,
    pub signature: Option<Signature>,
}

impl SignedVoucher {
    /// Bytes covered by the voucher signature: the voucher without its signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, fvm_ipld_encoding::Error> {
        let unsigned = SignedVoucher {
            signature: None,
            ..self.clone()
        };
        fvm_ipld_encoding::to_vec(&unsigned)
    }
}

/// What the caller wants in a new outbound voucher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoucherSpec {
    pub amount: TokenAmount,
    pub lane: u64,
    pub time_lock_min: ChainEpoch,
    pub time_lock_max: ChainEpoch,
    pub min_settle_height: ChainEpoch,
    pub secret_pre_image: Vec<u8>,
    pub extra: Option<ModVerifyParams>,
}

/// A voucher plus the manager's metadata about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherInfo {
    pub voucher: SignedVoucher,
    #[serde(with = "strict_bytes")]
    pub proof: Vec<u8>,
    pub submitted: bool,
}

/// Outcome of [`crate::paych::Manager::create_voucher`]. Exactly one of
/// `voucher` and a non-zero `shortfall` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherCreateResult {
    pub voucher: Option<SignedVoucher>,
    /// Funds missing from the channel to cover the voucher.
    pub shortfall: TokenAmount,
}

/// Kind of on-chain operation behind a tracked message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum PendingOp {
    Create,
    AddFunds,
    Settle,
    Collect,
}

/// Persisted outcome of a tracked channel message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgInfo {
    pub msg_cid: Cid,
    /// Store key of the channel the message belongs to.
    pub channel_key: String,
    pub op: PendingOp,
    pub received: bool,
    pub err: Option<String>,
}

impl MsgInfo {
    pub fn new(msg_cid: Cid, channel_key: String, op: PendingOp) -> Self {
        Self {
            msg_cid,
            channel_key,
            op,
            received: false,
            err: None,
        }
    }
}

/// Answer to a get-or-create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelResponse {
    /// Address of the channel, if it already exists on chain.
    pub channel: Option<Address>,
    /// Message to wait on (see [`crate::paych::Manager::get_paych_wait_ready`])
    /// before the requested funds are usable.
    pub wait_sentinel: Option<Cid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAvailableFunds {
    pub channel: Option<Address>,
    pub from: Address,
    pub to: Address,
    /// Funds confirmed on chain.
    pub confirmed_amt: TokenAmount,
    /// Funds waiting for `pending_wait_sentinel` to execute.
    pub pending_amt: TokenAmount,
    pub pending_wait_sentinel: Option<Cid>,
    /// Funds claimed by vouchers, summed over each lane's highest voucher.
    pub voucher_redeemed_amt: TokenAmount,
    /// Confirmed funds not yet claimed by any voucher.
    pub spendable_amt: TokenAmount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub channel: Address,
    pub control: Address,
    pub target: Address,
    pub direction: Direction,
    pub settling: bool,
    pub settling_at: Option<ChainEpoch>,
    pub collectable: bool,
}

/// Payment channel actor constructor parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ConstructorParams {
    pub from: Address,
    pub to: Address,
}

/// Init actor `Exec` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ExecParams {
    pub code_cid: Cid,
    pub constructor_params: RawBytes,
}

/// Init actor `Exec` return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ExecReturn {
    pub id_address: Address,
    pub robust_address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize_tuple, Deserialize_tuple)]
pub struct UpdateChannelStateParams {
    pub sv: SignedVoucher,
    #[serde(with = "strict_bytes")]
    pub secret: Vec<u8>,
    #[serde(with = "strict_bytes")]
    pub proof: Vec<u8>,
}
