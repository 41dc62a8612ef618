// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod cli_shared;
pub mod db;
pub mod paych;
pub mod shim;
mod tool;
mod utils;

pub use cli_shared::cli::Config;
pub use paych::{Manager, PaychConfig, PaychProvider, PaychStore};
pub use tool::main::main as forest_paych_tool_main;
