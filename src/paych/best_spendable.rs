// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use super::channel::ChannelAccessor;
use super::provider::PaychProvider;
use super::{Error, SignedVoucher};
use crate::db::SettingsStore;
use crate::shim::address::Address;

impl<DB, P> ChannelAccessor<DB, P>
where
    DB: SettingsStore + Send + Sync + 'static,
    P: PaychProvider,
{
    /// The highest spendable voucher of every lane. Vouchers the chain would
    /// reject are skipped, however large.
    pub async fn best_spendable_by_lane(
        &self,
        ch: Address,
    ) -> Result<BTreeMap<u64, SignedVoucher>, Error> {
        let mut best = BTreeMap::new();
        for info in self.store.vouchers_for_paych(&ch)? {
            let sv = info.voucher;
            if !self.check_voucher_spendable(ch, &sv, &[], &[]).await? {
                continue;
            }
            match best.entry(sv.lane) {
                Entry::Vacant(entry) => {
                    entry.insert(sv);
                }
                Entry::Occupied(mut entry) => {
                    if sv.amount > entry.get().amount {
                        entry.insert(sv);
                    }
                }
            }
        }
        Ok(best)
    }
}
