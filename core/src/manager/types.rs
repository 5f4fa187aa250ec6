use crate::tokens::TokenMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Theme state applied to one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTheme {
    /// Theme identifier
    pub id: String,
    /// Tenant the context belongs to; empty when none was given
    pub tenant: String,
    pub dark_mode: bool,
    /// Tokens for the idle validation state, dark overlay included
    pub resolved_tokens: TokenMap,
    pub last_updated: DateTime<Utc>,
    /// Caller-supplied data carried along with the theme
    pub context: BTreeMap<String, Value>,
}

/// Options for [`set_active_theme`](super::ThemeCoordinationManager::set_active_theme).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeOptions {
    pub dark_mode: bool,
    pub tenant: String,
    pub context: BTreeMap<String, Value>,
}

impl ThemeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dark_mode(mut self, dark_mode: bool) -> Self {
        self.dark_mode = dark_mode;
        self
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Direct callback notified with `(theme_id, dark_mode)` after every change.
pub type ThemeChangeListener = Arc<dyn Fn(&str, bool) + Send + Sync>;
