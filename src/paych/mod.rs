// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Off-chain payment channel management.
//!
//! The [`Manager`] opens and funds channels on chain, issues and accepts
//! vouchers against them, and drives settlement. Chain, message pool and
//! wallet access go through a [`PaychProvider`]; channel records and vouchers
//! live in a [`PaychStore`] over any [`crate::db::SettingsStore`].

mod best_spendable;
mod channel;
mod errors;
mod locks;
mod manager;
mod msg_listener;
mod provider;
mod store;
mod types;
mod validator;
mod vouchers;

#[cfg(test)]
mod test_provider;

pub use self::errors::Error;
pub use self::manager::Manager;
pub use self::msg_listener::{MsgCompleteEvt, MsgListeners, MsgSubscriber};
pub use self::provider::{LaneState, PaychActorState, PaychMessage, PaychProvider, Receipt};
pub use self::store::PaychStore;
pub use self::types::*;

use crate::db::db_engine::DbConfig;
use crate::shim::clock::ChainEpoch;
use serde::{Deserialize, Serialize};

/// Payment channel manager settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PaychConfig {
    /// Epochs a message must be buried under before its outcome is acted on.
    pub message_confidence: i64,
    /// Epochs between sending a settle message and the channel becoming
    /// collectable.
    pub settle_delay: ChainEpoch,
    pub db: DbConfig,
}

impl Default for PaychConfig {
    fn default() -> Self {
        Self {
            message_confidence: 5,
            // 12 hours of 30 second epochs
            settle_delay: 1440,
            db: DbConfig::default(),
        }
    }
}
