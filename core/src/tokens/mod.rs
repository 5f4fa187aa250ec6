//! Design token types and the built-in validation palette.
//!
//! Tokens are flat `name -> literal` pairs (`"border" -> "#16a34a"`) that a
//! renderer can inject directly as CSS custom properties or inline styles.
//! Layers are merged key by key, the later layer winning.

pub mod resolver;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use resolver::TokenResolver;

/// Flat token map. Ordered so that identical inputs serialize identically.
pub type TokenMap = BTreeMap<String, String>;

/// Overlay `layer` on top of `target`; keys present in both take the layer's value.
pub fn overlay(target: &mut TokenMap, layer: &TokenMap) {
    for (key, value) in layer {
        target.insert(key.clone(), value.clone());
    }
}

/// UI validation state selecting a base palette.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    #[default]
    Idle,
    Validating,
    Valid,
    Invalid,
    Warning,
}

impl ValidationState {
    pub const ALL: [ValidationState; 5] = [
        ValidationState::Idle,
        ValidationState::Validating,
        ValidationState::Valid,
        ValidationState::Invalid,
        ValidationState::Warning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationState::Idle => "idle",
            ValidationState::Validating => "validating",
            ValidationState::Valid => "valid",
            ValidationState::Invalid => "invalid",
            ValidationState::Warning => "warning",
        }
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a validation state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown validation state: {0}")]
pub struct UnknownValidationState(pub String);

impl FromStr for ValidationState {
    type Err = UnknownValidationState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(ValidationState::Idle),
            "validating" => Ok(ValidationState::Validating),
            "valid" => Ok(ValidationState::Valid),
            "invalid" => Ok(ValidationState::Invalid),
            "warning" => Ok(ValidationState::Warning),
            other => Err(UnknownValidationState(other.to_string())),
        }
    }
}

/// Token maps for every validation state in one color scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePalette {
    states: BTreeMap<ValidationState, TokenMap>,
}

impl StatePalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: ValidationState, tokens: TokenMap) -> Self {
        self.insert(state, tokens);
        self
    }

    pub fn insert(&mut self, state: ValidationState, tokens: TokenMap) {
        self.states.insert(state, tokens);
    }

    /// Copy of the tokens for `state`; empty when the palette does not define it.
    pub fn tokens_for(&self, state: ValidationState) -> TokenMap {
        self.states.get(&state).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Validation baseline: a light and a dark palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationTokens {
    pub light: StatePalette,
    pub dark: StatePalette,
}

impl ValidationTokens {
    pub fn new(light: StatePalette, dark: StatePalette) -> Self {
        Self { light, dark }
    }

    pub fn palette(&self, dark_mode: bool) -> &StatePalette {
        if dark_mode { &self.dark } else { &self.light }
    }

    pub fn tokens_for(&self, state: ValidationState, dark_mode: bool) -> TokenMap {
        self.palette(dark_mode).tokens_for(state)
    }
}

impl Default for ValidationTokens {
    fn default() -> Self {
        DEFAULT_VALIDATION_TOKENS.clone()
    }
}

/// Built-in palette used until a caller loads its own.
pub static DEFAULT_VALIDATION_TOKENS: Lazy<ValidationTokens> = Lazy::new(|| {
    let light_base = token_map(&[
        ("background", "#ffffff"),
        ("border", "#e5e7eb"),
        ("text", "#111827"),
    ]);
    let dark_base = token_map(&[
        ("background", "#111827"),
        ("border", "#374151"),
        ("text", "#f9fafb"),
    ]);

    let light_states: [(ValidationState, &[(&str, &str)]); 4] = [
        (
            ValidationState::Validating,
            &[("border", "#f59e0b"), ("icon", "⟳")],
        ),
        (ValidationState::Valid, &[("border", "#16a34a"), ("icon", "✓")]),
        (
            ValidationState::Invalid,
            &[("border", "#dc2626"), ("icon", "✗")],
        ),
        (
            ValidationState::Warning,
            &[("border", "#d97706"), ("icon", "⚠")],
        ),
    ];
    let dark_states: [(ValidationState, &[(&str, &str)]); 4] = [
        (ValidationState::Validating, &[("border", "#fbbf24")]),
        (ValidationState::Valid, &[("border", "#22c55e")]),
        (ValidationState::Invalid, &[("border", "#ef4444")]),
        (ValidationState::Warning, &[("border", "#f59e0b")]),
    ];

    let mut light = StatePalette::new().with_state(ValidationState::Idle, light_base.clone());
    for (state, layer) in light_states {
        let mut tokens = light_base.clone();
        overlay(&mut tokens, &token_map(layer));
        light.insert(state, tokens);
    }

    let mut dark = StatePalette::new().with_state(ValidationState::Idle, dark_base.clone());
    for (state, layer) in dark_states {
        let mut tokens = dark_base.clone();
        overlay(&mut tokens, &token_map(layer));
        dark.insert(state, tokens);
    }

    ValidationTokens::new(light, dark)
});

/// Build a [`TokenMap`] from string pairs.
pub fn token_map(pairs: &[(&str, &str)]) -> TokenMap {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
