use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::FilterKind;

/// How often internal consistency checks run. Checks re-derive a result
/// through an independent path and panic on a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    Always,
    Never,
    /// Run each check with the given probability.
    Sampled(f64),
}

impl Default for VerificationLevel {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            VerificationLevel::Always
        } else {
            VerificationLevel::Never
        }
    }
}

impl VerificationLevel {
    /// Decide whether the next check runs.
    #[must_use]
    pub fn should_verify(self) -> bool {
        match self {
            VerificationLevel::Always => true,
            VerificationLevel::Never => false,
            VerificationLevel::Sampled(rate) => fastrand::f64() < rate,
        }
    }
}

/// Settings of a stabilizer chain session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    /// How many pieces each chain step fixes.
    pub pieces_per_step: usize,
    pub filter: FilterKind,
    /// Products and inverses up to this many moves are kept as explicit move
    /// lists.
    pub eager_threshold: usize,
    /// Materialized maps of actions up to this many moves are checked against
    /// a replay of their moves.
    pub replay_check_limit: usize,
    /// The depth of the short word table used by `SimplifyLevel::ShortWords`.
    /// Zero disables it.
    pub short_word_depth: usize,
    pub verification: VerificationLevel,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            pieces_per_step: 1,
            filter: FilterKind::default(),
            eager_threshold: 32,
            replay_check_limit: 256,
            short_word_depth: 0,
            verification: VerificationLevel::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read the configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse the configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("`pieces_per_step` must be at least 1")]
    EmptyStep,
    #[error("The verification sampling rate must lie in 0..=1, got {0}")]
    SamplingRateOutOfRange(f64),
}

impl ChainConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// If the text is not valid TOML, names unknown keys, or holds an
    /// unusable value.
    pub fn from_toml(text: &str) -> Result<ChainConfig, ConfigError> {
        let config = toml::from_str::<ChainConfig>(text)?;
        if config.pieces_per_step == 0 {
            return Err(ConfigError::EmptyStep);
        }
        if let VerificationLevel::Sampled(rate) = config.verification
            && !(0.0..=1.0).contains(&rate)
        {
            return Err(ConfigError::SamplingRateOutOfRange(rate));
        }
        Ok(config)
    }

    /// Read a TOML configuration file.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<ChainConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        ChainConfig::from_toml(&text)
    }
}
