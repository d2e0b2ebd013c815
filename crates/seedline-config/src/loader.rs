//! JSON configuration file loading.

use std::path::Path;

use tokio::fs;

use crate::error::{ConfigError, ConfigResult};
use crate::model::SeedlineConfig;

impl SeedlineConfig {
    /// Decode and validate a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields and
    /// [`ConfigError::InvalidField`] for values that fail validation.
    pub fn from_json(document: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(document).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, decode and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// the errors of [`SeedlineConfig::from_json`].
    pub async fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let document = fs::read_to_string(path.as_ref())
            .await
            .map_err(|source| ConfigError::Io {
                operation: "config.read",
                source,
            })?;
        Self::from_json(&document)
    }
}
