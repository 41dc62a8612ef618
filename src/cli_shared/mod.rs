// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cli;
pub mod logger;

use crate::cli_shared::cli::{Config, ConfigPath, find_config_path};
use crate::utils::io::{read_file_to_string, read_toml};
use std::path::PathBuf;

pub fn read_config(
    config_path_opt: Option<&PathBuf>,
    data_dir_opt: Option<PathBuf>,
) -> anyhow::Result<(Option<ConfigPath>, Config)> {
    let (path, mut config) = match find_config_path(config_path_opt) {
        Some(path) => {
            let toml = read_file_to_string(path.to_path_buf())?;
            (Some(path), read_toml(&toml)?)
        }
        None => (None, Config::default()),
    };
    if let Some(data_dir) = data_dir_opt {
        config.client.data_dir = data_dir;
    }
    Ok((path, config))
}
