//! Manager settings and file/environment loading.

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod validation;

pub use validation::{ConfigLoadError, ConfigValidationError};

/// Prefix for environment overrides, e.g. `THEME__DEFAULT_THEME=blue`.
pub const ENV_PREFIX: &str = "THEME";

/// Settings for [`ThemeCoordinationManager`](crate::ThemeCoordinationManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeManagerConfig {
    /// Theme used when neither the context nor its tenant has one
    pub default_theme: String,
    pub default_dark_mode: bool,
    pub enable_system_detection: bool,
    pub detection_interval_ms: u64,
    pub enable_multi_tenant: bool,
    /// Key in `ThemeOptions::context` holding the tenant id
    pub tenant_context_field: String,
    pub enable_theme_events: bool,
    /// Themes accepted by `set_active_theme`; empty accepts any non-empty id
    pub registered_themes: Vec<String>,
    pub active_theme_ttl_secs: Option<u64>,
    pub max_active_themes: Option<usize>,
    /// Listeners running at once per manager
    pub listener_concurrency: usize,
}

impl Default for ThemeManagerConfig {
    fn default() -> Self {
        Self {
            default_theme: "default".to_string(),
            default_dark_mode: false,
            enable_system_detection: true,
            detection_interval_ms: 5_000,
            enable_multi_tenant: true,
            tenant_context_field: "tenant".to_string(),
            enable_theme_events: true,
            registered_themes: Vec::new(),
            active_theme_ttl_secs: None,
            max_active_themes: None,
            listener_concurrency: 8,
        }
    }
}

impl ThemeManagerConfig {
    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn active_theme_ttl(&self) -> Option<Duration> {
        self.active_theme_ttl_secs.map(Duration::from_secs)
    }

    /// Validate every setting, returning all problems at once.
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if self.default_theme.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyDefaultTheme);
        }

        if self.enable_system_detection && self.detection_interval_ms == 0 {
            errors.push(ConfigValidationError::DetectionInterval {
                configured: self.detection_interval_ms,
            });
        }

        if self.listener_concurrency == 0 {
            errors.push(ConfigValidationError::ListenerConcurrency {
                configured: self.listener_concurrency,
            });
        }

        if let Some(0) = self.max_active_themes {
            errors.push(ConfigValidationError::MaxActiveThemes { configured: 0 });
        }

        if let Some(0) = self.active_theme_ttl_secs {
            errors.push(ConfigValidationError::ActiveThemeTtl { configured: 0 });
        }

        if self.enable_multi_tenant && self.tenant_context_field.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyTenantContextField);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Load, then validate, manager settings from `path` and the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        load_from_path(path)
    }
}

/// Build settings of any shape from a config file plus `THEME__*` variables.
///
/// Variables from a `.env` file are loaded first. Environment entries
/// override file values.
pub fn load_settings<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigLoadError> {
    dotenv::dotenv().ok();
    let path = path.as_ref();
    log::debug!("Loading configuration from {}", path.display());

    let env_source = Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true);

    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(env_source)
        .build()
        .map_err(ConfigLoadError::Load)?;

    config
        .try_deserialize::<T>()
        .map_err(ConfigLoadError::Deserialize)
}

/// Load and validate a [`ThemeManagerConfig`] stored at the top level of `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ThemeManagerConfig, ConfigLoadError> {
    let config: ThemeManagerConfig = load_settings(path)?;
    config.validate().map_err(ConfigLoadError::Invalid)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ThemeManagerConfig::default();
        assert_eq!(config.default_theme, "default");
        assert_eq!(config.detection_interval(), Duration::from_secs(5));
        assert_eq!(config.tenant_context_field, "tenant");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_every_error() {
        let config = ThemeManagerConfig {
            default_theme: " ".to_string(),
            detection_interval_ms: 0,
            listener_concurrency: 0,
            max_active_themes: Some(0),
            active_theme_ttl_secs: Some(0),
            ..ThemeManagerConfig::default()
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ConfigValidationError::EmptyDefaultTheme));
    }

    #[test]
    fn test_zero_interval_allowed_without_detection() {
        let config = ThemeManagerConfig {
            enable_system_detection: false,
            detection_interval_ms: 0,
            ..ThemeManagerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttl_duration() {
        let config = ThemeManagerConfig {
            active_theme_ttl_secs: Some(30),
            ..ThemeManagerConfig::default()
        };
        assert_eq!(config.active_theme_ttl(), Some(Duration::from_secs(30)));
    }
}
