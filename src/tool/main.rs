// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::ffi::OsString;

use super::subcommands::{Cli, Subcommand};
use crate::cli_shared::{logger::setup_logger, read_config};
use clap::Parser as _;

pub fn main<ArgT>(args: impl IntoIterator<Item = ArgT>) -> anyhow::Result<()>
where
    ArgT: Into<OsString> + Clone,
{
    // Capture Cli inputs
    let Cli {
        config,
        data_dir,
        cmd,
    } = Cli::parse_from(args);
    let (_, config) = read_config(config.as_ref(), data_dir)?;
    setup_logger(&config.log, config.client.log_dir.as_deref());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            match cmd {
                Subcommand::Paych(cmd) => cmd.run(&config).await,
                Subcommand::Config => {
                    println!("{}", toml::to_string_pretty(&config)?);
                    Ok(())
                }
            }
        })
}
