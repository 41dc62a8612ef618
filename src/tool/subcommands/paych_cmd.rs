// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use crate::cli_shared::cli::Config;
use crate::db::db_engine::open_db;
use crate::db::{DBStatistics as _, SettingsStore};
use crate::paych::{ChannelInfo, MsgInfo, PaychStore, VoucherInfo};
use crate::shim::{address::Address, econ::TokenAmount};
use anyhow::Context as _;
use clap::Subcommand;
use itertools::Itertools as _;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum PaychCommands {
    /// List every tracked channel, including ones still being created
    List,
    /// Show a single channel by address or store key
    Info {
        /// Channel address, or `msg:<cid>` for a channel awaiting creation
        key: String,
    },
    /// List the vouchers stored for a channel
    Vouchers {
        #[arg(value_parser = parse_address)]
        channel: Address,
    },
    /// List messages whose outcome has not been recorded yet
    Pending,
    /// Print database statistics, if enabled in the configuration
    Stats,
}

fn parse_address(s: &str) -> anyhow::Result<Address> {
    s.parse().with_context(|| format!("invalid address {s}"))
}

impl PaychCommands {
    pub async fn run(self, config: &Config) -> anyhow::Result<()> {
        let path = config.db_path();
        info!("opening payment channel store at {}", path.display());
        let db = Arc::new(open_db(&path, &config.paych.db)?);
        if let Self::Stats = self {
            match db.get_statistics() {
                Some(stats) => println!("{stats}"),
                None => println!("statistics are disabled, set `paych.db.enable_statistics`"),
            }
            return Ok(());
        }
        let store = PaychStore::new(db);
        println!("{}", serde_json::to_string_pretty(&self.render(&store)?)?);
        Ok(())
    }

    fn render<DB: SettingsStore>(
        &self,
        store: &PaychStore<DB>,
    ) -> anyhow::Result<serde_json::Value> {
        let value = match self {
            Self::List => serde_json::to_value(
                store
                    .list_channel_infos()?
                    .iter()
                    .map(ChannelView::from)
                    .collect_vec(),
            )?,
            Self::Info { key } => {
                let ci = store
                    .by_key(key)?
                    .with_context(|| format!("no channel with key {key}"))?;
                serde_json::to_value(ChannelView::from(&ci))?
            }
            Self::Vouchers { channel } => serde_json::to_value(
                store
                    .vouchers_for_paych(channel)?
                    .iter()
                    .map(VoucherView::from)
                    .collect_vec(),
            )?,
            Self::Pending => serde_json::to_value(
                store
                    .with_pending_messages()?
                    .iter()
                    .map(MsgView::from)
                    .collect_vec(),
            )?,
            Self::Stats => serde_json::Value::Null,
        };
        Ok(value)
    }
}

fn atto(amount: &TokenAmount) -> String {
    amount.atto().to_string()
}

#[derive(Debug, Serialize)]
struct LaneView {
    id: u64,
    highest: String,
    nonce: u64,
}

#[derive(Debug, Serialize)]
struct ChannelView {
    key: String,
    channel: Option<String>,
    direction: String,
    control: String,
    target: String,
    amount: String,
    pending_amount: String,
    pending_create_msg: Option<String>,
    next_lane: u64,
    lanes: Vec<LaneView>,
    settling: bool,
    settling_at: Option<i64>,
    settle_msg: Option<String>,
    collect_msg: Option<String>,
}

impl From<&ChannelInfo> for ChannelView {
    fn from(ci: &ChannelInfo) -> Self {
        Self {
            key: ci.key(),
            channel: ci.channel.map(|ch| ch.to_string()),
            direction: ci.direction.to_string(),
            control: ci.control.to_string(),
            target: ci.target.to_string(),
            amount: atto(&ci.amount),
            pending_amount: atto(&ci.pending_amount),
            pending_create_msg: ci.pending_create_msg.map(|c| c.to_string()),
            next_lane: ci.next_lane,
            lanes: ci
                .lanes
                .iter()
                .map(|lane| LaneView {
                    id: lane.id,
                    highest: atto(&lane.highest),
                    nonce: lane.nonce,
                })
                .collect(),
            settling: ci.settling,
            settling_at: ci.settling_at,
            settle_msg: ci.settle_msg.map(|c| c.to_string()),
            collect_msg: ci.collect_msg.map(|c| c.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct VoucherView {
    lane: u64,
    nonce: u64,
    amount: String,
    time_lock_min: i64,
    time_lock_max: i64,
    min_settle_height: i64,
    has_extra: bool,
    signed: bool,
    has_proof: bool,
    submitted: bool,
}

impl From<&VoucherInfo> for VoucherView {
    fn from(info: &VoucherInfo) -> Self {
        let sv = &info.voucher;
        Self {
            lane: sv.lane,
            nonce: sv.nonce,
            amount: atto(&sv.amount),
            time_lock_min: sv.time_lock_min,
            time_lock_max: sv.time_lock_max,
            min_settle_height: sv.min_settle_height,
            has_extra: sv.extra.is_some(),
            signed: sv.signature.is_some(),
            has_proof: !info.proof.is_empty(),
            submitted: info.submitted,
        }
    }
}

#[derive(Debug, Serialize)]
struct MsgView {
    cid: String,
    channel_key: String,
    op: String,
    received: bool,
    err: Option<String>,
}

impl From<&MsgInfo> for MsgView {
    fn from(msg: &MsgInfo) -> Self {
        Self {
            cid: msg.msg_cid.to_string(),
            channel_key: msg.channel_key.clone(),
            op: msg.op.to_string(),
            received: msg.received,
            err: msg.err.clone(),
        }
    }
}
