// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use super::channel::ChannelAccessor;
use super::provider::{LaneState, PaychActorState, PaychMessage, PaychProvider};
use super::{
    ChannelInfo, Error, MAX_LANE, PaychMethod, SignedVoucher, UpdateChannelStateParams,
};
use crate::db::SettingsStore;
use crate::shim::{address::Address, econ::TokenAmount};
use fvm_ipld_encoding::RawBytes;
use num_traits::Zero as _;

fn invalid(msg: impl Into<String>) -> Error {
    Error::VoucherInvalid(msg.into())
}

impl<DB, P> ChannelAccessor<DB, P>
where
    DB: SettingsStore + Send + Sync + 'static,
    P: PaychProvider,
{
    /// Checks a voucher against the channel's chain state and the vouchers
    /// already stored for it. Returns the merged state of the voucher's lane
    /// before the voucher is applied.
    pub async fn check_voucher_valid(
        &self,
        ci: &ChannelInfo,
        sv: &SignedVoucher,
    ) -> Result<LaneState, Error> {
        let ch = ci
            .channel
            .ok_or_else(|| Error::ChannelNotFound(ci.key()))?;
        if sv.channel_addr != ch {
            return Err(invalid(format!(
                "voucher channel {} does not match channel {ch}",
                sv.channel_addr
            )));
        }
        if !sv.merges.is_empty() {
            return Err(invalid("voucher merges are not supported"));
        }
        if sv.lane > MAX_LANE {
            return Err(invalid(format!(
                "lane {} is above the maximum {MAX_LANE}",
                sv.lane
            )));
        }

        let state = self.provider.load_paych_state(&ch).await?;

        let sig = sv
            .signature
            .as_ref()
            .ok_or_else(|| invalid("voucher has no signature"))?;
        self.provider
            .verify_signature(sig, &state.from, &sv.signing_bytes()?)
            .await
            .map_err(|e| invalid(format!("signature verification failed: {e:#}")))?;

        let lane_states = self.lane_states(&state, &ch)?;
        let lane = lane_states.get(&sv.lane);
        if let Some(lane) = lane {
            if lane.nonce >= sv.nonce {
                return Err(invalid(format!(
                    "nonce {} on lane {} is not above {}",
                    sv.nonce, sv.lane, lane.nonce
                )));
            }
            if lane.redeemed > sv.amount {
                return Err(invalid(format!(
                    "amount {} is lower than the {} already claimed on lane {}",
                    sv.amount, lane.redeemed, sv.lane
                )));
            }
        }

        let total = total_redeemed_with_voucher(&lane_states, sv);
        if &total + &state.to_send > state.balance {
            return Err(invalid(format!(
                "channel balance {} cannot cover {total} redeemed plus {} owed",
                state.balance, state.to_send
            )));
        }

        Ok(lane.cloned().unwrap_or_default())
    }

    /// Lane states on chain, overlaid with stored vouchers that have not been
    /// submitted yet.
    pub(super) fn lane_states(
        &self,
        state: &PaychActorState,
        ch: &Address,
    ) -> Result<BTreeMap<u64, LaneState>, Error> {
        let mut lanes = state.lane_states.clone();
        for info in self.store.vouchers_for_paych(ch)? {
            if info.submitted {
                continue;
            }
            let sv = info.voucher;
            match lanes.get_mut(&sv.lane) {
                Some(lane) if sv.nonce < lane.nonce => {}
                Some(lane) => {
                    lane.nonce = sv.nonce;
                    lane.redeemed = sv.amount;
                }
                None => {
                    lanes.insert(
                        sv.lane,
                        LaneState {
                            redeemed: sv.amount,
                            nonce: sv.nonce,
                        },
                    );
                }
            }
        }
        Ok(lanes)
    }

    /// Simulates redeeming the voucher from the channel recipient. `false`
    /// means the chain would reject it right now, or it has already been
    /// submitted.
    pub async fn check_voucher_spendable(
        &self,
        ch: Address,
        sv: &SignedVoucher,
        secret: &[u8],
        proof: &[u8],
    ) -> Result<bool, Error> {
        let mut proof = proof.to_vec();
        if let Some(stored) = self.store.get_voucher(&ch, sv.lane, sv.nonce)? {
            if stored.voucher == *sv {
                if stored.submitted {
                    return Ok(false);
                }
                if proof.is_empty() && sv.extra.is_some() {
                    proof = stored.proof;
                }
            }
        }

        let recipient = self.provider.load_paych_state(&ch).await?.to;
        let params = UpdateChannelStateParams {
            sv: sv.clone(),
            secret: secret.to_vec(),
            proof,
        };
        let receipt = self
            .provider
            .simulate_channel_method(PaychMessage {
                from: recipient,
                to: ch,
                method_num: PaychMethod::UpdateChannelState.into(),
                value: TokenAmount::zero(),
                params: RawBytes::serialize(params)?,
            })
            .await?;
        Ok(receipt.exit_code.is_success())
    }
}

/// Total claimed over all lanes once `sv` replaces its lane's current claim.
fn total_redeemed_with_voucher(
    lanes: &BTreeMap<u64, LaneState>,
    sv: &SignedVoucher,
) -> TokenAmount {
    lanes
        .iter()
        .filter(|(id, _)| **id != sv.lane)
        .fold(sv.amount.clone(), |acc, (_, lane)| acc + &lane.redeemed)
}
