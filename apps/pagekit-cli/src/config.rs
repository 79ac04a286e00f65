//! Configuration file support
//!
//! Settings come from, in increasing priority: built-in defaults, a TOML
//! file, then command-line flags.
//!
//! ```toml
//! [quality]
//! start = 90
//! floor = 20
//! step = 5
//!
//! [split]
//! stem = "chapter"
//! ```

use std::fs;
use std::path::Path;

use anyhow::Context;
use pagekit_core::QualitySearch;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "pagekit.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Quality search used by both compression commands
    pub quality: QualitySearch,
    pub split: SplitConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    /// File name stem for split parts; the input file's stem when unset
    pub stem: Option<String>,
}

impl Config {
    /// Load `path`, or `pagekit.toml` if it exists, or fall back to defaults.
    ///
    /// An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.quality.check()?;
        Ok(config)
    }

    /// Apply command-line overrides to the quality search.
    pub fn quality_with(
        &self,
        start: Option<u8>,
        floor: Option<u8>,
        step: Option<u8>,
    ) -> anyhow::Result<QualitySearch> {
        let search = QualitySearch {
            start: start.unwrap_or(self.quality.start),
            floor: floor.unwrap_or(self.quality.floor),
            step: step.unwrap_or(self.quality.step),
        };
        search.check()?;
        Ok(search)
    }
}
