// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};

/// `ParityDb` configuration exposed in the payment channel configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParityDbConfig {
    pub enable_statistics: bool,
    /// One of `none`, `lz4` or `snappy`.
    pub compression_type: String,
}

impl Default for ParityDbConfig {
    fn default() -> Self {
        Self {
            enable_statistics: false,
            compression_type: "lz4".into(),
        }
    }
}

impl ParityDbConfig {
    pub fn compression(&self) -> anyhow::Result<parity_db::CompressionType> {
        match self.compression_type.to_lowercase().as_str() {
            "none" => Ok(parity_db::CompressionType::NoCompression),
            "lz4" => Ok(parity_db::CompressionType::Lz4),
            "snappy" => Ok(parity_db::CompressionType::Snappy),
            other => anyhow::bail!("unsupported compression type: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_types() {
        let mut config = ParityDbConfig::default();
        assert!(config.compression().is_ok());
        config.compression_type = "Snappy".into();
        assert!(config.compression().is_ok());
        config.compression_type = "zstd".into();
        assert!(config.compression().is_err());
    }
}
