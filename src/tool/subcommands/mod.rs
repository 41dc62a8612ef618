// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod paych_cmd;

use std::path::PathBuf;

use clap::Parser;

/// Command-line options for the `forest-paych-tool` binary
#[derive(Parser)]
#[command(name = "forest-paych-tool", version, about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Optional TOML file containing payment channel configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides the data directory of the configuration file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Subcommand,
}

/// forest-paych-tool sub-commands
#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Inspect the payment channel store
    #[command(subcommand)]
    Paych(paych_cmd::PaychCommands),

    /// Print the effective configuration
    Config,
}
