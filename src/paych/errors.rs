// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::shim::clock::ChainEpoch;
use cid::Cid;
use thiserror::Error;

/// Payment channel manager error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A create or add-funds message executed with a non-zero exit code, or
    /// could not be observed on chain. Terminal for that message.
    #[error("channel funding message failed: {0}")]
    CreateFailed(String),
    /// Amount regression, bad signature, lane or nonce violation.
    #[error("invalid voucher: {0}")]
    VoucherInvalid(String),
    #[error("settlement delay has not elapsed (current epoch {current}, collectable at {ready_at:?})")]
    SettlementNotReady {
        current: ChainEpoch,
        ready_at: Option<ChainEpoch>,
    },
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    #[error("message {0} is not tracked by the payment channel manager")]
    MessageNotTracked(Cid),
    #[error("{0}")]
    Encoding(String),
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(format!("{e:#}"))
    }
}

impl From<fvm_ipld_encoding::Error> for Error {
    fn from(e: fvm_ipld_encoding::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}
