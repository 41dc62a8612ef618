// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::paych::PaychConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};
use std::{fmt, path::PathBuf, str::FromStr};
use tracing_subscriber::filter::LevelFilter;

static LOG_LEVEL_NAMES: [&str; 6] = ["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"];

#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub struct LogLevelFilter(pub LevelFilter);

impl fmt::Display for LogLevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string().to_lowercase())
    }
}

impl Serialize for LogLevelFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string().to_uppercase())
    }
}

impl<'de> Deserialize<'de> for LogLevelFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // Case insensitive.
        LevelFilter::from_str(&s)
            .map(LogLevelFilter)
            .map_err(|_| Error::unknown_variant(&s, &LOG_LEVEL_NAMES))
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LogConfig {
    pub filters: Vec<LogValue>,
}

impl LogConfig {
    pub(in crate::cli_shared) fn to_filter_string(&self) -> String {
        self.filters
            .iter()
            .map(|f| format!("{}={}", f.module, f.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filters: vec![
                LogValue::new("parity_db", LogLevelFilter(LevelFilter::WARN)),
                LogValue::new("forest_paych::db", LogLevelFilter(LevelFilter::WARN)),
            ],
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Debug, Clone)]
pub struct LogValue {
    pub module: String,
    pub level: LogLevelFilter,
}

impl LogValue {
    pub fn new(module: &str, level: LogLevelFilter) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(default)]
pub struct Client {
    pub data_dir: PathBuf,
    /// Directory for rolling log files. Console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("forest-paych"),
            log_dir: None,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub client: Client,
    pub paych: PaychConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        crate::db::db_engine::db_root(&self.client.data_dir)
    }
}
