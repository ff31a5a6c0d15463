//! Converter configuration loaded from TOML.
//!
//! ```toml
//! limit_size = true      # 2 MiB budget unless `budget` is set
//! budget = "1.5M"        # or a plain byte count: budget = 1572864
//! footer = "notice.png"  # relative to the config file
//! footer_enabled = true
//!
//! [policy]
//! scale_floor = 0.4
//! over_budget = "best-effort"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::convert::ConvertOptions;
use crate::encode::{PolicyError, SearchPolicy};

/// Budget applied when the size limit is switched on without an explicit value.
pub const DEFAULT_BUDGET_BYTES: u64 = 2 * 1024 * 1024;

/// Errors loading or interpreting a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid budget '{0}': expected a positive byte count like 2097152, 512K or 2M")]
    InvalidBudget(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A budget written either as a byte count or as a size string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BudgetSetting {
    Bytes(u64),
    Text(String),
}

impl BudgetSetting {
    pub fn to_bytes(&self) -> Result<u64, ConfigError> {
        match self {
            BudgetSetting::Bytes(0) => Err(ConfigError::InvalidBudget("0".to_string())),
            BudgetSetting::Bytes(bytes) => Ok(*bytes),
            BudgetSetting::Text(text) => parse_byte_size(text),
        }
    }
}

/// Settings for a conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Enforce a size budget on every image.
    pub limit_size: bool,
    /// Explicit budget; implies `limit_size`.
    pub budget: Option<BudgetSetting>,
    /// Footer image path.
    pub footer: Option<PathBuf>,
    /// Append the footer to every image.
    pub footer_enabled: bool,
    /// Convert images in parallel.
    pub parallel: bool,
    /// Search parameters.
    pub policy: SearchPolicy,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            limit_size: false,
            budget: None,
            footer: None,
            footer_enabled: false,
            parallel: true,
            policy: SearchPolicy::default(),
        }
    }
}

impl ConverterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a config file. A relative `footer` path is resolved against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;

        if let (Some(footer), Some(dir)) = (config.footer.as_ref(), path.parent()) {
            if footer.is_relative() {
                config.footer = Some(dir.join(footer));
            }
        }
        Ok(config)
    }

    /// The effective budget in bytes, if any.
    pub fn budget_bytes(&self) -> Result<Option<u64>, ConfigError> {
        match &self.budget {
            Some(setting) => setting.to_bytes().map(Some),
            None if self.limit_size => Ok(Some(DEFAULT_BUDGET_BYTES)),
            None => Ok(None),
        }
    }

    /// Validate and convert into batch options.
    pub fn to_options(&self) -> Result<ConvertOptions, ConfigError> {
        self.policy.validate()?;
        Ok(ConvertOptions {
            budget_bytes: self.budget_bytes()?,
            footer_enabled: self.footer_enabled,
            policy: self.policy.clone(),
            parallel: self.parallel,
        })
    }
}

/// Parse `2097152`, `512K`, `2M`, `1.5MB` (binary multiples) into bytes.
pub fn parse_byte_size(text: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidBudget(text.to_string());
    let trimmed = text.trim();
    let upper = trimmed.to_ascii_uppercase();
    let number = upper.strip_suffix('B').unwrap_or(&upper);

    let (digits, multiplier) = match number.chars().last() {
        Some('K') => (&number[..number.len() - 1], 1024.0),
        Some('M') => (&number[..number.len() - 1], 1024.0 * 1024.0),
        Some('G') => (&number[..number.len() - 1], 1024.0 * 1024.0 * 1024.0),
        _ => (number, 1.0),
    };

    let value: f64 = digits.trim().parse().map_err(|_| invalid())?;
    let bytes = (value * multiplier).round();
    if !bytes.is_finite() || bytes < 1.0 || bytes > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(bytes as u64)
}
