// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Re-exports of the `fvm_shared` types the payment channel manager speaks in.
//! Everything is pinned to the latest FVM version so the rest of the crate never
//! names a versioned crate directly.

pub mod address {
    pub use super::fvm_shared_latest::address::{Address, Protocol};

    /// The init actor, which constructs new payment channel actors.
    pub const INIT_ACTOR_ADDR: Address = Address::new_id(1);
}

pub mod clock {
    pub use super::fvm_shared_latest::clock::ChainEpoch;
}

pub mod crypto {
    pub use super::fvm_shared_latest::crypto::signature::{Signature, SignatureType};
}

pub mod econ {
    pub use super::fvm_shared_latest::econ::TokenAmount;
}

pub mod error {
    pub use super::fvm_shared_latest::error::ExitCode;
}

pub mod message {
    pub type MethodNum = u64;

    /// Method number of a plain value transfer.
    pub const METHOD_SEND: MethodNum = 0;
}

mod fvm_shared_latest {
    pub use fvm_shared4::*;
}
