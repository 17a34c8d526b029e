// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for mortem.
//!
//! The config is layered: the embedded default config comes first, then either an explicitly
//! provided file or `.config/mortem.toml` in the testing directory, if it exists.

use crate::errors::ConfigParseError;
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// The mortem configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MortemConfig {
    sanitizer: SanitizerConfig,
    tests: TestsConfig,
}

impl MortemConfig {
    /// The default location of the config within the testing directory: `.config/mortem.toml`.
    pub const CONFIG_PATH: &'static str = ".config/mortem.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/mortem.toml` in
    /// the testing directory.
    ///
    /// Unknown keys are logged as warnings.
    pub fn from_sources(
        testing_directory: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(testing_directory, config_file, |config_file, unknown| {
            let mut unknown_str = String::new();
            for ignored_key in unknown {
                unknown_str.push_str("\n  - ");
                unknown_str.push_str(ignored_key);
            }
            warn!("ignoring unknown configuration keys in config file {config_file}:{unknown_str}");
        })
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        Self::from_builder(Self::make_default_config(), &mut |_| {})
            .expect("default config is always valid")
    }

    /// The external sanitizer's configuration.
    pub fn sanitizer(&self) -> &SanitizerConfig {
        &self.sanitizer
    }

    /// Configuration describing how tests are laid out.
    pub fn tests(&self) -> &TestsConfig {
        &self.tests
    }

    // A custom unknown_callback can be passed in while testing.
    fn from_sources_impl(
        testing_directory: &Utf8Path,
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = testing_directory.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };
        debug!("reading mortem config from {config_file}");

        let builder = Self::make_default_config().add_source(source);
        let mut unknown = BTreeSet::new();
        let config = Self::from_builder(builder, &mut |path| {
            unknown.insert(path);
        })
        .map_err(|err| ConfigParseError::new(&config_file, err))?;

        if !unknown.is_empty() {
            unknown_callback(&config_file, &unknown);
        }
        Ok(config)
    }

    fn from_builder(
        builder: ConfigBuilder<DefaultState>,
        unknown: &mut impl FnMut(String),
    ) -> Result<Self, config::ConfigError> {
        let config = builder.build()?;
        serde_ignored::deserialize(config, |path: serde_ignored::Path| {
            unknown(path.to_string());
        })
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

/// Configuration for the external sanitizer.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SanitizerConfig {
    program: Utf8PathBuf,
}

impl SanitizerConfig {
    /// The sanitizer program. A relative path is resolved against the testing directory.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }
}

/// Configuration describing how tests are laid out on disk.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestsConfig {
    directory: String,
    output_directory: String,
    host_scripts: Vec<String>,
}

impl TestsConfig {
    /// The directory, relative to the testing directory, holding one directory per test.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// The name of each test's output directory.
    pub fn output_directory(&self) -> &str {
        &self.output_directory
    }

    /// Script name suffixes used to discover hosts.
    pub fn host_scripts(&self) -> &[String] {
        &self.host_scripts
    }
}
