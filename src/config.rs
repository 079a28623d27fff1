//! Driver configuration loaded from TOML
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock `/dev/convertdrv` node with mode `0666`.
//!
//! ```
//! use convertdrv::config::DriverConfig;
//!
//! let config = DriverConfig::from_toml_str(r#"
//!     [device]
//!     name = "thermo"
//!     mode = 0o660
//! "#).unwrap();
//! assert_eq!(config.device.name, "thermo");
//! assert_eq!(config.device.mode, 0o660);
//! assert_eq!(config.context.placeholder, "None");
//! ```

use crate::context::DEFAULT_PLACEHOLDER;
use crate::miscdev::{MiscDeviceOptions, MAX_FIXED_MINOR};
use crate::token::{ResultText, MAX_RESULT_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default node name
pub const DEFAULT_DEVICE_NAME: &str = "convertdrv";

/// Default node permissions: any caller may read and write
pub const DEFAULT_MODE: u32 = 0o666;

/// Errors raised while loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Node settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Name under `/dev`
    pub name: String,
    /// Permission bits
    pub mode: u32,
    /// Fixed minor number (0..=254); dynamic when absent
    pub minor: Option<u8>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            mode: DEFAULT_MODE,
            minor: None,
        }
    }
}

/// Initial state of the shared context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Text reads return before the first write
    pub placeholder: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

/// Complete driver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub device: DeviceConfig,
    pub context: ContextConfig,
}

impl DriverConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.device.name;
        if name.is_empty() || name.contains('/') || name.contains('\0') {
            return Err(ConfigError::Invalid(format!(
                "device name {name:?} must be non-empty and contain no '/'"
            )));
        }
        if self.device.mode > 0o777 {
            return Err(ConfigError::Invalid(format!(
                "device mode {:#o} has bits outside 0o777",
                self.device.mode
            )));
        }
        if let Some(minor) = self.device.minor {
            if minor > MAX_FIXED_MINOR {
                return Err(ConfigError::Invalid(format!(
                    "minor {minor} is reserved for dynamic allocation"
                )));
            }
        }
        let placeholder = self.context.placeholder.len();
        if placeholder == 0 || placeholder > MAX_RESULT_LEN {
            return Err(ConfigError::Invalid(format!(
                "placeholder must be 1..={MAX_RESULT_LEN} bytes, got {placeholder}"
            )));
        }
        Ok(())
    }

    /// Registration request for the node
    pub fn misc_options(&self) -> MiscDeviceOptions {
        MiscDeviceOptions {
            name: self.device.name.clone(),
            mode: self.device.mode,
            minor: self.device.minor,
        }
    }

    /// Initial result text, `None` if the placeholder does not fit
    pub fn placeholder(&self) -> Option<ResultText> {
        ResultText::new(self.context.placeholder.as_bytes())
    }
}
