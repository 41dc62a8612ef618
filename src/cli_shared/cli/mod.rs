// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod config;

use std::path::PathBuf;

pub use self::config::*;

/// Environment variable naming a configuration file when `--config` is not
/// given.
pub const CONFIG_PATH_ENV: &str = "FOREST_PAYCH_CONFIG_PATH";

/// Where a configuration file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    Cli(PathBuf),
    Env(PathBuf),
}

impl ConfigPath {
    pub fn to_path_buf(&self) -> &PathBuf {
        match self {
            ConfigPath::Cli(path) | ConfigPath::Env(path) => path,
        }
    }
}

pub fn find_config_path(config: Option<&PathBuf>) -> Option<ConfigPath> {
    if let Some(s) = config {
        return Some(ConfigPath::Cli(s.to_owned()));
    }
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| path.exists())
        .map(ConfigPath::Env)
}
