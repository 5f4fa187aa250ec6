use coordination::config::{ConfigLoadError, ConfigValidationError, load_settings};
use coordination::tokens::TokenMap;
use coordination::{TenantThemeConfig, ThemeCoordinationManager, ThemeManagerConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory and the user config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main application configuration
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    manager: ThemeManagerConfig,
    #[serde(default)]
    logging: LoggingConfig,
    /// Tenant id to tenant theme configuration
    #[serde(default)]
    tenants: BTreeMap<String, TenantThemeConfig>,
    /// Theme id to token overrides
    #[serde(default)]
    themes: BTreeMap<String, TokenMap>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    level: Option<String>,
    file: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("warn")
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("No {CONFIG_FILE_NAME} found in the working directory or {0}")]
    NotFound(String),
    #[error(transparent)]
    Load(#[from] ConfigLoadError),
}

impl AppConfig {
    pub fn manager(&self) -> &ThemeManagerConfig {
        &self.manager
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub fn tenants(&self) -> &BTreeMap<String, TenantThemeConfig> {
        &self.tenants
    }

    pub fn themes(&self) -> &BTreeMap<String, TokenMap> {
        &self.themes
    }

    /// Validate the manager settings
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        self.manager.validate()
    }

    /// Tenants whose default theme is neither configured nor the manager default
    pub fn dangling_tenant_themes(&self) -> Vec<(&str, &str)> {
        self.tenants
            .iter()
            .filter(|(_, tenant)| {
                !tenant.default_theme.is_empty()
                    && tenant.default_theme != self.manager.default_theme
                    && !self.themes.contains_key(&tenant.default_theme)
            })
            .map(|(id, tenant)| (id.as_str(), tenant.default_theme.as_str()))
            .collect()
    }

    /// Build a manager and register every configured tenant and theme
    pub fn build_manager(&self) -> Result<ThemeCoordinationManager, ConfigLoadError> {
        let manager = ThemeCoordinationManager::with_config(self.manager.clone())?;

        for (theme_id, overrides) in &self.themes {
            manager
                .token_resolver()
                .register_theme_overrides(theme_id.clone(), overrides.clone());
        }
        for (tenant_id, tenant) in &self.tenants {
            manager.register_tenant(tenant_id, tenant.clone());
        }

        log::debug!(
            "Manager ready with {} themes and {} tenants",
            self.themes.len(),
            self.tenants.len()
        );
        Ok(manager)
    }
}

/// Locate the config file: explicit path, then the working directory, then
/// the user config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, AppConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    let user_dir = dirs::config_dir().map(|dir| dir.join("themectl"));
    match user_dir {
        Some(dir) if dir.join(CONFIG_FILE_NAME).exists() => Ok(dir.join(CONFIG_FILE_NAME)),
        Some(dir) => Err(AppConfigError::NotFound(dir.display().to_string())),
        None => Err(AppConfigError::NotFound(
            "the user config directory".to_string(),
        )),
    }
}

/// Load the application configuration, or defaults when no file exists and
/// none was requested explicitly.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, AppConfigError> {
    let path = match resolve_config_path(explicit) {
        Ok(path) => path,
        Err(AppConfigError::NotFound(searched)) => {
            log::debug!("No {CONFIG_FILE_NAME} found in {searched}, using defaults");
            return Ok(AppConfig::default());
        }
        Err(e) => return Err(e),
    };

    let config: AppConfig = load_settings(&path)?;
    Ok(config)
}
