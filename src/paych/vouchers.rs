// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::channel::ChannelAccessor;
use super::provider::{PaychMessage, PaychProvider};
use super::{
    Direction, Error, MAX_LANE, PaychMethod, SignedVoucher, UpdateChannelStateParams,
    VoucherCreateResult, VoucherInfo, VoucherSpec,
};
use crate::db::SettingsStore;
use crate::shim::{address::Address, econ::TokenAmount};
use cid::Cid;
use fvm_ipld_encoding::RawBytes;
use num_traits::Zero as _;
use tracing::{debug, info};

impl<DB, P> ChannelAccessor<DB, P>
where
    DB: SettingsStore + Send + Sync + 'static,
    P: PaychProvider,
{
    /// Issues a voucher raising `spec.lane` to `spec.amount`.
    ///
    /// The lane's cumulative amount never goes down, and the sum of the highest
    /// voucher over all lanes never exceeds the confirmed channel funds. When
    /// the funds do not cover the increment, nothing is issued and the missing
    /// amount is reported as a shortfall.
    pub async fn create_voucher(
        &self,
        ch: Address,
        spec: VoucherSpec,
    ) -> Result<VoucherCreateResult, Error> {
        let _guard = self.channel_locks.lock(ch).await;

        let ci = self.store.by_address(&ch)?;
        if ci.direction != Direction::Outbound {
            return Err(Error::VoucherInvalid(format!(
                "cannot issue vouchers on inbound channel {ch}"
            )));
        }

        if spec.lane > MAX_LANE {
            return Err(Error::VoucherInvalid(format!(
                "lane {} is above the maximum {MAX_LANE}",
                spec.lane
            )));
        }

        let highest = ci.lane_highest(spec.lane);
        if spec.amount < highest {
            return Err(Error::VoucherInvalid(format!(
                "amount {} is lower than the {highest} already issued on lane {}",
                spec.amount, spec.lane
            )));
        }
        let increment = &spec.amount - &highest;
        let claimed = ci.total_lane_value();
        let available = if ci.amount > claimed {
            &ci.amount - &claimed
        } else {
            TokenAmount::zero()
        };
        if increment > available {
            let shortfall = &increment - &available;
            debug!("voucher on {ch} lane {} short by {shortfall}", spec.lane);
            return Ok(VoucherCreateResult {
                voucher: None,
                shortfall,
            });
        }

        let nonce = self.next_sequence_for_lane(ch, spec.lane)?;
        let mut sv = SignedVoucher {
            channel_addr: ch,
            time_lock_min: spec.time_lock_min,
            time_lock_max: spec.time_lock_max,
            secret_pre_image: spec.secret_pre_image,
            extra: spec.extra,
            lane: spec.lane,
            nonce,
            amount: spec.amount,
            min_settle_height: spec.min_settle_height,
            merges: vec![],
            signature: None,
        };
        let sig = self.provider.sign(&ci.control, &sv.signing_bytes()?).await?;
        sv.signature = Some(sig);

        self.store.put_voucher(&VoucherInfo {
            voucher: sv.clone(),
            proof: vec![],
            submitted: false,
        })?;
        info!(
            "issued voucher on {ch} lane {} nonce {} for {}",
            sv.lane, sv.nonce, sv.amount
        );

        Ok(VoucherCreateResult {
            voucher: Some(sv),
            shortfall: TokenAmount::zero(),
        })
    }

    /// Nonce the next voucher on `lane` must carry.
    pub fn next_sequence_for_lane(&self, ch: Address, lane: u64) -> Result<u64, Error> {
        let ci = self.store.by_address(&ch)?;
        let stored = self
            .store
            .vouchers_for_paych(&ch)?
            .into_iter()
            .filter(|info| info.voucher.lane == lane)
            .map(|info| info.voucher.nonce)
            .max()
            .unwrap_or(0);
        let recorded = ci.lane(lane).map(|lane| lane.nonce).unwrap_or(0);
        stored.max(recorded).checked_add(1).ok_or_else(|| {
            Error::VoucherInvalid(format!("nonces of lane {lane} on {ch} are exhausted"))
        })
    }

    /// Validates and stores a voucher received for (or issued on) a tracked
    /// channel. Returns how much the voucher adds over the lane's previous
    /// claim; a voucher already stored adds nothing.
    pub async fn add_voucher(
        &self,
        ch: Address,
        sv: SignedVoucher,
        proof: Vec<u8>,
        min_delta: TokenAmount,
    ) -> Result<TokenAmount, Error> {
        let _guard = self.channel_locks.lock(ch).await;

        let ci = self.store.by_address(&ch)?;

        if let Some(stored) = self.store.get_voucher(&ch, sv.lane, sv.nonce)? {
            if stored.voucher != sv {
                return Err(Error::VoucherInvalid(format!(
                    "a different voucher is stored for lane {} nonce {}",
                    sv.lane, sv.nonce
                )));
            }
            if !proof.is_empty() && stored.proof != proof {
                debug!("updating proof of voucher on {ch} lane {} nonce {}", sv.lane, sv.nonce);
                self.store.put_voucher(&VoucherInfo { proof, ..stored })?;
            }
            return Ok(TokenAmount::zero());
        }

        let lane = self.check_voucher_valid(&ci, &sv).await?;
        let previous = if lane.redeemed > ci.lane_highest(sv.lane) {
            lane.redeemed
        } else {
            ci.lane_highest(sv.lane)
        };
        let delta = &sv.amount - &previous;
        if delta < min_delta {
            return Err(Error::VoucherInvalid(format!(
                "voucher adds {delta}, less than the required {min_delta}"
            )));
        }

        self.store.put_voucher(&VoucherInfo {
            voucher: sv,
            proof,
            submitted: false,
        })?;
        Ok(delta)
    }

    /// Sends the voucher to the channel actor for redemption and marks it, and
    /// every older voucher on its lane, as submitted.
    pub async fn submit_voucher(
        &self,
        ch: Address,
        sv: SignedVoucher,
        secret: Vec<u8>,
        proof: Vec<u8>,
    ) -> Result<Cid, Error> {
        let _guard = self.channel_locks.lock(ch).await;

        let ci = self.store.by_address(&ch)?;
        let mut proof = proof;
        match self.store.get_voucher(&ch, sv.lane, sv.nonce)? {
            Some(stored) if stored.voucher == sv => {
                if stored.submitted {
                    return Err(Error::VoucherInvalid(format!(
                        "voucher on lane {} nonce {} was already submitted",
                        sv.lane, sv.nonce
                    )));
                }
                if proof.is_empty() {
                    proof = stored.proof;
                }
            }
            Some(_) => {
                return Err(Error::VoucherInvalid(format!(
                    "a different voucher is stored for lane {} nonce {}",
                    sv.lane, sv.nonce
                )));
            }
            None => {
                self.check_voucher_valid(&ci, &sv).await?;
                self.store.put_voucher(&VoucherInfo {
                    voucher: sv.clone(),
                    proof: proof.clone(),
                    submitted: false,
                })?;
            }
        }

        let (lane, nonce) = (sv.lane, sv.nonce);
        let params = UpdateChannelStateParams { sv, secret, proof };
        let mcid = self
            .provider
            .send_message(PaychMessage {
                from: ci.control,
                to: ch,
                method_num: PaychMethod::UpdateChannelState.into(),
                value: TokenAmount::zero(),
                params: RawBytes::serialize(params)?,
            })
            .await?;
        self.store.mark_voucher_submitted(&ch, lane, nonce)?;
        info!("submitted voucher on {ch} lane {lane} nonce {nonce} in {mcid}");
        Ok(mcid)
    }
}
