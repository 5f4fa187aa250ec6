use crate::common::sync::RwLockExt;
use crate::tokens::TokenMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Theme configuration supplied for a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantThemeConfig {
    /// Theme used by the tenant's contexts unless one is set explicitly
    pub default_theme: String,
    /// Dark mode preference for the tenant
    pub default_dark_mode: bool,
    /// Tokens overriding the theme's own tokens
    pub token_overrides: TokenMap,
    /// Themes the tenant may use; empty means unrestricted
    pub allowed_themes: Vec<String>,
}

impl TenantThemeConfig {
    pub fn new(default_theme: impl Into<String>) -> Self {
        Self {
            default_theme: default_theme.into(),
            ..Self::default()
        }
    }

    pub fn with_overrides(mut self, overrides: TokenMap) -> Self {
        self.token_overrides = overrides;
        self
    }

    pub fn with_dark_mode(mut self, dark_mode: bool) -> Self {
        self.default_dark_mode = dark_mode;
        self
    }

    pub fn with_allowed_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_themes = themes.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the tenant may use `theme_id`.
    pub fn allows(&self, theme_id: &str) -> bool {
        self.allowed_themes.is_empty() || self.allowed_themes.iter().any(|t| t == theme_id)
    }
}

/// Maps tenants to their default theme and token overrides.
#[derive(Debug)]
pub struct TenantResolver {
    tenants: RwLock<HashMap<String, TenantThemeConfig>>,
    default_theme: String,
}

impl TenantResolver {
    pub fn new(default_theme: impl Into<String>) -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
            default_theme: default_theme.into(),
        }
    }

    /// Upsert a tenant. The whole configuration is replaced in one step.
    pub fn register_tenant(&self, tenant_id: impl Into<String>, config: TenantThemeConfig) {
        let tenant_id = tenant_id.into();
        log::info!(
            "Registering tenant '{tenant_id}' with default theme '{}'",
            config.default_theme
        );
        self.tenants.write_recover().insert(tenant_id, config);
    }

    pub fn is_registered(&self, tenant_id: &str) -> bool {
        self.tenants.read_recover().contains_key(tenant_id)
    }

    /// Tenant's configured theme, or the resolver default for unknown tenants.
    pub fn get_theme_for_tenant(&self, tenant_id: &str) -> String {
        self.tenants
            .read_recover()
            .get(tenant_id)
            .map(|config| config.default_theme.clone())
            .unwrap_or_else(|| self.default_theme.clone())
    }

    /// Tenant's token overrides; an empty map when none exist.
    pub fn get_tenant_token_overrides(&self, tenant_id: &str) -> TokenMap {
        self.tenants
            .read_recover()
            .get(tenant_id)
            .map(|config| config.token_overrides.clone())
            .unwrap_or_default()
    }

    /// Registered configuration for a tenant.
    pub fn tenant_config(&self, tenant_id: &str) -> Option<TenantThemeConfig> {
        self.tenants.read_recover().get(tenant_id).cloned()
    }

    /// Tenant whose overrides apply when a theme is resolved without a tenant.
    ///
    /// Only tenants with overrides qualify. A tenant registered under the
    /// theme's own id wins; otherwise the lexicographically smallest tenant
    /// whose default theme is `theme_id`.
    pub fn tenant_for_theme(&self, theme_id: &str) -> Option<String> {
        let tenants = self.tenants.read_recover();
        let has_overrides = |config: &TenantThemeConfig| !config.token_overrides.is_empty();

        if tenants.get(theme_id).is_some_and(has_overrides) {
            return Some(theme_id.to_string());
        }

        tenants
            .iter()
            .filter(|(_, config)| config.default_theme == theme_id && has_overrides(config))
            .map(|(tenant_id, _)| tenant_id)
            .min()
            .cloned()
    }

    /// Default theme of every registered tenant.
    pub fn tenant_themes(&self) -> Vec<String> {
        self.tenants
            .read_recover()
            .values()
            .map(|config| config.default_theme.clone())
            .filter(|theme| !theme.is_empty())
            .collect()
    }
}
