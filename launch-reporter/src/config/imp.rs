// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    cache::DEFAULT_CAPACITY,
    errors::{ConfigParseError, ConfigParseErrorKind},
    reconcile::{CallStackHeuristic, ReconciliationEngine},
};
use camino::Utf8Path;
use chrono::Utc;
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use launch_metadata::{ItemAttribute, StartLaunchRequest};
use serde::Deserialize;
use std::{collections::BTreeSet, num::NonZeroUsize};
use tracing::warn;

/// The prefix of environment variables that override config keys.
///
/// `LAUNCH_REPORTER__REPORTING__RETAIN_TREE=true` sets `reporting.retain-tree`. Only scalar
/// keys can be set this way.
pub const ENV_PREFIX: &str = "LAUNCH_REPORTER__";

/// Overall configuration for the launch reporter.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReporterConfig {
    /// Settings for the launch itself.
    pub launch: LaunchConfig,

    /// Settings controlling how items are reported.
    pub reporting: ReportingConfig,

    /// Settings for retry detection.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Settings for the launch.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LaunchConfig {
    /// The launch name.
    pub name: String,

    /// A description of the launch.
    #[serde(default)]
    pub description: Option<String>,

    /// Attributes attached to the launch.
    #[serde(default)]
    pub attributes: Vec<ItemAttribute>,

    /// Whether this launch reruns an earlier one.
    #[serde(default)]
    pub rerun: bool,
}

/// Settings controlling how items are reported.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportingConfig {
    /// Keep finished scopes in the item tree until the run ends.
    pub retain_tree: bool,

    /// Report one aggregated item per class under the suite.
    pub group_by_class: bool,

    /// Whether skipped items count as issues.
    pub skipped_is_issue: bool,

    /// The number of instances whose retry and skip state is remembered.
    pub tracking_cache_capacity: usize,
}

/// Settings for retry detection.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Stack frame substrings identifying the runner's retry-dispatch path.
    #[serde(default)]
    pub call_stack_markers: Vec<String>,
}

impl ReporterConfig {
    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the config from the defaults, an optional config file, and the process
    /// environment, in increasing order of precedence.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_env(config_file, std::env::vars())
    }

    /// Like [`Self::from_sources`], but reads overrides from `env` instead of the process
    /// environment.
    pub fn from_sources_with_env(
        config_file: Option<&Utf8Path>,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigParseError> {
        let mut builder = Self::make_default_config();
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
        }
        for (key, value) in env_overrides(env) {
            builder = builder.set_override(key, value).map_err(|error| {
                ConfigParseError::new(
                    config_file.map(ToOwned::to_owned),
                    ConfigParseErrorKind::BuildError(Box::new(error)),
                )
            })?;
        }

        let (config, ignored) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file.map(ToOwned::to_owned), kind))?;
        for path in &ignored {
            warn!(
                config_file = config_file.map(Utf8Path::as_str),
                "ignoring unknown configuration key `{path}`"
            );
        }

        config
            .validate()
            .map_err(|kind| ConfigParseError::new(config_file.map(ToOwned::to_owned), kind))?;
        Ok(config)
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        let config = Self::make_default_config().build_cloned();
        // The embedded config is checked by tests, so this only falls back if it's been
        // broken by hand.
        config
            .ok()
            .and_then(|config| config.try_deserialize().ok())
            .unwrap_or_else(Self::fallback)
    }

    fn fallback() -> Self {
        Self {
            launch: LaunchConfig {
                name: "Launch".to_owned(),
                description: None,
                attributes: Vec::new(),
                rerun: false,
            },
            reporting: ReportingConfig {
                retain_tree: false,
                group_by_class: false,
                skipped_is_issue: true,
                tracking_cache_capacity: DEFAULT_CAPACITY.get(),
            },
            retry: RetryConfig::default(),
        }
    }

    /// Returns the tracking cache capacity.
    pub fn tracking_cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.reporting.tracking_cache_capacity)
            .unwrap_or(DEFAULT_CAPACITY)
    }

    /// Builds a start request for the launch described by this config.
    pub fn start_launch_request(&self) -> StartLaunchRequest {
        StartLaunchRequest {
            name: self.launch.name.clone(),
            start_time: Utc::now(),
            description: self.launch.description.clone(),
            attributes: self.launch.attributes.clone(),
            rerun: self.launch.rerun,
        }
    }

    /// Builds the reconciliation engine described by this config.
    pub fn reconciliation_engine(&self) -> ReconciliationEngine {
        let engine = ReconciliationEngine::new(self.tracking_cache_capacity())
            .with_skipped_is_issue(self.reporting.skipped_is_issue);
        if self.retry.call_stack_markers.is_empty() {
            engine
        } else {
            engine.with_heuristic(CallStackHeuristic::new(
                self.retry.call_stack_markers.iter().cloned(),
            ))
        }
    }

    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        if self.reporting.tracking_cache_capacity == 0 {
            return Err(ConfigParseErrorKind::InvalidValue {
                key: "reporting.tracking-cache-capacity",
                message: "must be greater than 0".to_owned(),
            });
        }
        if self.launch.name.trim().is_empty() {
            return Err(ConfigParseErrorKind::InvalidValue {
                key: "launch.name",
                message: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(Self, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let config: Self = serde_ignored::deserialize(config, |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        })
        .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        Ok((config, ignored))
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Maps `LAUNCH_REPORTER__SECTION__SOME_KEY` to `section.some-key`.
fn env_overrides(
    env: impl IntoIterator<Item = (String, String)>,
) -> impl Iterator<Item = (String, String)> {
    env.into_iter().filter_map(|(name, value)| {
        let rest = name.strip_prefix(ENV_PREFIX)?;
        if rest.is_empty() {
            return None;
        }
        let key = rest
            .split("__")
            .map(|part| part.to_ascii_lowercase().replace('_', "-"))
            .collect::<Vec<_>>()
            .join(".");
        Some((key, value))
    })
}
