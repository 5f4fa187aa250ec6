use super::{TokenMap, ValidationTokens, overlay};
use crate::common::sync::RwLockExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct ResolverState {
    validation_tokens: Arc<ValidationTokens>,
    override_cache: HashMap<String, TokenMap>,
    validation_overrides: HashMap<(String, bool), Arc<ValidationTokens>>,
}

/// Holds the validation baseline and per-theme token overrides.
///
/// Resolution is a merge of the caller's base map with the cached overrides
/// for the theme, so the cost is proportional to the size of the base map.
/// All state sits behind one reader/writer lock owned by the resolver.
#[derive(Debug, Default)]
pub struct TokenResolver {
    state: RwLock<ResolverState>,
}

impl TokenResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver seeded with a custom validation baseline.
    pub fn with_validation_tokens(tokens: ValidationTokens) -> Self {
        let resolver = Self::new();
        resolver.load_validation_tokens(tokens);
        resolver
    }

    /// Replace the validation baseline.
    ///
    /// Only later resolutions observe the new baseline; snapshots already
    /// handed out keep the tokens they were built from.
    pub fn load_validation_tokens(&self, tokens: ValidationTokens) {
        let mut state = self.state.write_recover();
        state.validation_tokens = Arc::new(tokens);
        log::debug!("Validation token baseline replaced");
    }

    /// Current validation baseline.
    pub fn validation_baseline(&self) -> Arc<ValidationTokens> {
        Arc::clone(&self.state.read_recover().validation_tokens)
    }

    /// Register token overrides for a theme, replacing any earlier set.
    pub fn register_theme_overrides(&self, theme_id: impl Into<String>, overrides: TokenMap) {
        let theme_id = theme_id.into();
        log::debug!(
            "Registering {} token overrides for theme '{theme_id}'",
            overrides.len()
        );
        self.state
            .write_recover()
            .override_cache
            .insert(theme_id, overrides);
    }

    /// Register a theme-specific validation palette for one color scheme.
    ///
    /// Pairs without an entry keep resolving to the loaded baseline.
    pub fn register_validation_tokens(
        &self,
        theme_id: impl Into<String>,
        dark_mode: bool,
        tokens: ValidationTokens,
    ) {
        self.state
            .write_recover()
            .validation_overrides
            .insert((theme_id.into(), dark_mode), Arc::new(tokens));
    }

    /// Ids of every theme that has overrides or a validation palette registered.
    pub fn known_themes(&self) -> HashSet<String> {
        let state = self.state.read_recover();
        state
            .override_cache
            .keys()
            .cloned()
            .chain(state.validation_overrides.keys().map(|(id, _)| id.clone()))
            .collect()
    }

    /// Copy `base_tokens` and overlay the cached overrides for `theme_id`.
    ///
    /// Always returns a fresh map, even when the theme has no overrides.
    pub fn resolve_theme_tokens(&self, theme_id: &str, base_tokens: &TokenMap) -> TokenMap {
        let mut resolved = base_tokens.clone();

        let state = self.state.read_recover();
        if let Some(overrides) = state.override_cache.get(theme_id) {
            overlay(&mut resolved, overrides);
        }

        resolved
    }

    /// Validation palette for a theme and color scheme.
    ///
    /// Looks up the `(theme_id, dark_mode)` table first and falls back to the
    /// baseline, so an unregistered pair behaves exactly like the baseline.
    pub fn get_validation_tokens(&self, theme_id: &str, dark_mode: bool) -> Arc<ValidationTokens> {
        let state = self.state.read_recover();
        state
            .validation_overrides
            .get(&(theme_id.to_string(), dark_mode))
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&state.validation_tokens))
    }
}
