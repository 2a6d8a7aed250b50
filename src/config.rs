//! Configuration for golden assertions.
//!
//! `defaults/golden.default.toml` is embedded into the crate so that docs and
//! runtime behavior stay in sync. Projects layer a `golden.toml` next to their
//! Cargo.toml and `GOLDEN_*` environment variables on top of those defaults
//! via [`Loader`] before deserializing into [`GoldenConfig`].
//!
//! The accept toggle itself (`ACCEPT=1` by default) is read separately by
//! [`GoldenConfig::mode_from_env`], because it is a plain on/off switch rather
//! than a configuration key.

use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../defaults/golden.default.toml");

/// Name of the optional project file looked up next to Cargo.toml
pub const PROJECT_FILE: &str = "golden.toml";

/// Prefix of the environment overrides, e.g. `GOLDEN_REWRITE__FLUSH=deferred`
pub const ENV_PREFIX: &str = "GOLDEN";

/// Whether a mismatch fails the test or rewrites the expected literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Verify,
    Accept,
}

/// Top-level configuration consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoldenConfig {
    pub accept: AcceptConfig,
    pub locator: LocatorConfig,
    pub matcher: MatcherConfig,
    pub rewrite: RewriteConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AcceptConfig {
    pub enabled: bool,
    pub env: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocatorConfig {
    pub strategy: LocatorStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatcherConfig {
    pub disambiguation: Disambiguation,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RewriteConfig {
    pub flush: FlushPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocatorStrategy {
    /// `#[track_caller]` location of the assertion call
    Caller,
    /// Third frame of a captured backtrace
    Backtrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disambiguation {
    /// Only the call at or after the reported column
    Column,
    /// Every call on the reported line
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    Immediate,
    Deferred,
}

impl GoldenConfig {
    /// Resolve the mode from the value of the accept toggle variable.
    pub fn mode_from(&self, toggle: Option<&str>) -> Mode {
        if self.accept.enabled || toggle == Some("1") {
            Mode::Accept
        } else {
            Mode::Verify
        }
    }

    /// Resolve the mode from the process environment.
    pub fn mode_from_env(&self) -> Mode {
        let toggle = std::env::var(&self.accept.env).ok();
        self.mode_from(toggle.as_deref())
    }
}

impl Default for GoldenConfig {
    fn default() -> Self {
        Self {
            accept: AcceptConfig {
                enabled: false,
                env: "ACCEPT".to_string(),
            },
            locator: LocatorConfig {
                strategy: LocatorStrategy::Caller,
            },
            matcher: MatcherConfig {
                disambiguation: Disambiguation::Column,
            },
            rewrite: RewriteConfig {
                flush: FlushPolicy::Immediate,
            },
        }
    }
}

/// Helper for layering project overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer `GOLDEN_<SECTION>__<KEY>` environment variables.
    pub fn with_environment(self) -> Self {
        self.with_environment_prefix(ENV_PREFIX)
    }

    /// Layer `<PREFIX>_<SECTION>__<KEY>` environment variables.
    pub fn with_environment_prefix(mut self, prefix: &str) -> Self {
        let source = Environment::with_prefix(prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<GoldenConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<GoldenConfig, ConfigError> {
    Loader::new().build()
}

/// Path of the project file for the crate under test, if cargo told us where it is
pub fn project_file() -> Option<PathBuf> {
    std::env::var_os("CARGO_MANIFEST_DIR").map(|dir| Path::new(&dir).join(PROJECT_FILE))
}

/// Defaults, then the optional project file, then the environment.
pub fn load_project() -> Result<GoldenConfig, ConfigError> {
    load_project_from(project_file().as_deref())
}

/// Like [`load_project`], with an explicit project file
pub fn load_project_from(project: Option<&Path>) -> Result<GoldenConfig, ConfigError> {
    let mut loader = Loader::new();
    if let Some(path) = project {
        loader = loader.with_optional_file(path);
    }
    loader.with_environment().build()
}
