// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io::IsTerminal as _;
use std::path::Path;

use tracing_subscriber::{EnvFilter, Registry, prelude::*};

use crate::cli_shared::cli::LogConfig;

/// Installs the global subscriber: a console layer on stderr and, when
/// `log_dir` is set, an hourly rolling file under it.
pub fn setup_logger(log: &LogConfig, log_dir: Option<&Path>) {
    let mut layers: Vec<Box<dyn tracing_subscriber::layer::Layer<Registry> + Send + Sync>> =
        // console logger
        vec![Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(env_filter_from_config(log))),
        )];

    // file logger
    if let Some(log_dir) = log_dir {
        let file_appender = tracing_appender::rolling::hourly(log_dir, "forest-paych.log");
        layers.push(Box::new(
            tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(file_appender)
                .with_filter(get_env_filter(env_filter_from_config(log))),
        ));
    }

    tracing_subscriber::registry().with(layers).init();
}

/// Returns an [`EnvFilter`] according to the `RUST_LOG` environment variable, or a default
/// - see [`default_env_filter`]
///
/// Note that [`tracing_subscriber::filter::Builder`] only allows a single default directive,
/// whereas we want to provide multiple.
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

/// The default directives with the configured per-module filters appended.
/// Configured filters that fail to parse are dropped with a warning on
/// stderr, as no subscriber exists yet.
fn env_filter_from_config(log: &LogConfig) -> EnvFilter {
    let configured = log.to_filter_string();
    if configured.is_empty() {
        return default_env_filter();
    }
    match EnvFilter::try_new(format!("{},{configured}", default_directives().join(","))) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("ignoring invalid log filters {configured:?}: {e}");
            default_env_filter()
        }
    }
}

fn default_directives() -> [&'static str; 3] {
    ["info", "parity_db=warn", "tokio=warn"]
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::new(default_directives().join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli_shared::cli::{LogLevelFilter, LogValue};
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_default_env_filter() {
        let _did_not_panic = default_env_filter();
    }

    #[test]
    fn configured_filters_are_appended() {
        let log = LogConfig {
            filters: vec![LogValue::new(
                "forest_paych::paych",
                LogLevelFilter(LevelFilter::TRACE),
            )],
        };
        let filter = env_filter_from_config(&log).to_string().to_lowercase();
        assert!(filter.contains("forest_paych::paych=trace"), "{filter}");
    }
}
