//! Per-context theme coordination.
//!
//! [`ThemeCoordinationManager`] ties the token, dark mode, and tenant
//! resolvers together, keeps one [`ActiveTheme`] per context in a
//! [`ThemeStore`], and notifies listeners after each change.

use crate::common::sync::{MutexExt, RwLockExt};
use crate::common::{ThemeError, ThemeResult};
use crate::config::{ConfigLoadError, ThemeManagerConfig};
use crate::dark_mode::{DarkModeManager, DetectionHandle, SYSTEM_CONTEXT, SystemPreference};
use crate::dispatch::{Dispatch, ListenerJob, dispatch_jobs};
use crate::events::{DARK_MODE_TOGGLE, SubscriptionId, THEME_CHANGE, ThemeEvent, ThemeEventBus};
use crate::store::{InMemoryThemeStore, StoreLimits, ThemeStore};
use crate::taskpool::TaskPool;
use crate::tenant::{TenantResolver, TenantThemeConfig};
use crate::tokens::resolver::TokenResolver;
use crate::tokens::{TokenMap, ValidationState, overlay};
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

pub mod types;

pub use types::{ActiveTheme, ThemeChangeListener, ThemeOptions};

/// Coordinates themes, dark mode, and tenant overrides across contexts.
///
/// A context is any caller-defined string: a session id, a request id, or a
/// tenant key. Queries never fail and fall back to defaults. Mutations return
/// a [`ThemeError`] for unknown themes or contexts.
///
/// # Examples
///
/// ```no_run
/// use coordination::{ThemeCoordinationManager, ThemeOptions, ValidationState};
///
/// let manager = ThemeCoordinationManager::new();
/// manager.set_active_theme("session-42", "blue", Some(ThemeOptions::new().dark_mode(true)))?;
///
/// let tokens = manager.get_validation_tokens_for_state("session-42", ValidationState::Invalid);
/// assert_eq!(tokens["icon"], "✗");
/// # Ok::<(), coordination::ThemeError>(())
/// ```
pub struct ThemeCoordinationManager {
    config: ThemeManagerConfig,
    store: Arc<dyn ThemeStore>,
    token_resolver: Arc<TokenResolver>,
    dark_mode_manager: Arc<DarkModeManager>,
    tenant_resolver: Arc<TenantResolver>,
    event_bus: ThemeEventBus,
    change_listeners: RwLock<Vec<(SubscriptionId, ThemeChangeListener)>>,
    pool: Arc<TaskPool>,
    system_preference: Option<Arc<dyn SystemPreference>>,
    detection: Mutex<Option<DetectionHandle>>,
}

impl fmt::Debug for ThemeCoordinationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeCoordinationManager")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("event_bus", &self.event_bus)
            .field("change_listeners", &self.change_listeners.read_recover().len())
            .finish_non_exhaustive()
    }
}

impl Default for ThemeCoordinationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeCoordinationManager {
    /// Manager with default settings and an unbounded in-memory store.
    pub fn new() -> Self {
        ThemeCoordinationManagerBuilder::new().assemble()
    }

    /// Manager with validated `config`.
    pub fn with_config(config: ThemeManagerConfig) -> Result<Self, ConfigLoadError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ThemeCoordinationManagerBuilder {
        ThemeCoordinationManagerBuilder::new()
    }

    pub fn config(&self) -> &ThemeManagerConfig {
        &self.config
    }

    pub fn token_resolver(&self) -> &Arc<TokenResolver> {
        &self.token_resolver
    }

    pub fn dark_mode_manager(&self) -> &Arc<DarkModeManager> {
        &self.dark_mode_manager
    }

    pub fn tenant_resolver(&self) -> &Arc<TenantResolver> {
        &self.tenant_resolver
    }

    pub fn event_bus(&self) -> &ThemeEventBus {
        &self.event_bus
    }

    /// Theme applied to `context`.
    ///
    /// The stored theme first, then the theme of the tenant named `context`,
    /// then the configured default.
    pub fn get_active_theme(&self, context: &str) -> String {
        if let Some(active) = self.store.get(context) {
            return active.id;
        }

        if self.config.enable_multi_tenant && self.tenant_resolver.is_registered(context) {
            return self.tenant_resolver.get_theme_for_tenant(context);
        }

        self.config.default_theme.clone()
    }

    /// Dark mode flag of the stored theme, else the [`DarkModeManager`] answer.
    pub fn is_dark_mode_enabled(&self, context: &str) -> bool {
        match self.store.get(context) {
            Some(active) => active.dark_mode,
            None => self.dark_mode_manager.is_dark_mode_enabled(context),
        }
    }

    /// Light tokens of `theme_id` for `state`.
    ///
    /// Layers, later winning: validation-state tokens, theme overrides, then
    /// the overrides of the tenant associated with the theme.
    pub fn get_theme_tokens(&self, theme_id: &str, state: ValidationState) -> TokenMap {
        self.compose_tokens(theme_id, false, None, state)
    }

    /// Apply `theme_id` to `context`, replacing any earlier theme.
    ///
    /// Listeners are notified in the background, also when the caller runs
    /// outside a tokio runtime. Use
    /// [`set_active_theme_with_dispatch`](Self::set_active_theme_with_dispatch)
    /// to wait for them.
    pub fn set_active_theme(
        &self,
        context: &str,
        theme_id: &str,
        options: Option<ThemeOptions>,
    ) -> ThemeResult<()> {
        self.set_active_theme_with_dispatch(context, theme_id, options)
            .map(drop)
    }

    /// Same as [`set_active_theme`](Self::set_active_theme), returning the
    /// listener [`Dispatch`].
    pub fn set_active_theme_with_dispatch(
        &self,
        context: &str,
        theme_id: &str,
        options: Option<ThemeOptions>,
    ) -> ThemeResult<Dispatch> {
        if !self.validate_theme_exists(theme_id) {
            log::warn!("Rejected unknown theme '{theme_id}' for context '{context}'");
            return Err(ThemeError::InvalidTheme {
                theme_id: theme_id.to_string(),
            });
        }

        let options = self.resolve_theme_options(options);
        let tenant = self.tenant_from_options(&options);
        self.check_tenant_allows(&tenant, theme_id)?;

        let tenant_ref = (!tenant.is_empty()).then_some(tenant.as_str());
        let resolved_tokens = self.compose_tokens(
            theme_id,
            options.dark_mode,
            tenant_ref,
            ValidationState::Idle,
        );

        let active = ActiveTheme {
            id: theme_id.to_string(),
            tenant: tenant.clone(),
            dark_mode: options.dark_mode,
            resolved_tokens,
            last_updated: Utc::now(),
            context: options.context,
        };
        self.store.insert(context, active);

        log::info!(
            "Context '{context}' now uses theme '{theme_id}' (dark mode: {})",
            options.dark_mode
        );

        let mut dispatch = Dispatch::default();
        if self.config.enable_theme_events {
            let event = ThemeEvent::new(THEME_CHANGE, theme_id, context, options.dark_mode)
                .with_data("tenant", tenant)
                .with_data("source", "manual");
            dispatch.absorb(self.event_bus.emit(THEME_CHANGE, event));
        }
        dispatch.absorb(self.notify_theme_change(theme_id, options.dark_mode));

        Ok(dispatch)
    }

    /// Flip dark mode for `context` and return the new value.
    ///
    /// Fails with [`ThemeError::ContextNotFound`] when no theme was set for
    /// the context; nothing is created in that case.
    pub fn toggle_dark_mode(&self, context: &str) -> ThemeResult<bool> {
        self.toggle_dark_mode_with_dispatch(context)
            .map(|(dark_mode, _)| dark_mode)
    }

    /// Same as [`toggle_dark_mode`](Self::toggle_dark_mode), returning the
    /// listener [`Dispatch`].
    pub fn toggle_dark_mode_with_dispatch(&self, context: &str) -> ThemeResult<(bool, Dispatch)> {
        let updated = self.store.update(context, &mut |active: &mut ActiveTheme| {
            active.dark_mode = !active.dark_mode;
            let tenant = (!active.tenant.is_empty()).then_some(active.tenant.as_str());
            active.resolved_tokens =
                self.compose_tokens(&active.id, active.dark_mode, tenant, ValidationState::Idle);
            active.last_updated = Utc::now();
        });

        let Some(active) = updated else {
            log::debug!("Cannot toggle dark mode, no theme set for context '{context}'");
            return Err(ThemeError::ContextNotFound {
                context: context.to_string(),
            });
        };

        // Mirrored outside the store lock; racing toggles on one context may
        // leave the mirror behind the store, which stays authoritative.
        self.dark_mode_manager.set_dark_mode(context, active.dark_mode);
        log::info!(
            "Context '{context}' dark mode toggled to {}",
            active.dark_mode
        );

        let mut dispatch = Dispatch::default();
        if self.config.enable_theme_events {
            let event = ThemeEvent::new(DARK_MODE_TOGGLE, &active.id, context, active.dark_mode)
                .with_data("previous_state", !active.dark_mode);
            dispatch.absorb(self.event_bus.emit(DARK_MODE_TOGGLE, event));
        }
        dispatch.absorb(self.notify_theme_change(&active.id, active.dark_mode));

        Ok((active.dark_mode, dispatch))
    }

    /// Tokens for `state` under the theme and dark mode that apply to `context`.
    ///
    /// Contexts without a stored theme use [`get_active_theme`](Self::get_active_theme)
    /// and the recorded dark mode preference, falling back to the configured
    /// default dark mode. A context named after a registered tenant takes
    /// that tenant's overrides.
    pub fn get_validation_tokens_for_state(
        &self,
        context: &str,
        state: ValidationState,
    ) -> TokenMap {
        let (theme_id, dark_mode, tenant) = match self.store.get(context) {
            Some(active) => (active.id, active.dark_mode, active.tenant),
            None => {
                let dark_mode = self
                    .dark_mode_manager
                    .preference(context)
                    .unwrap_or(self.config.default_dark_mode);
                let tenant = if self.config.enable_multi_tenant
                    && self.tenant_resolver.is_registered(context)
                {
                    context.to_string()
                } else {
                    String::new()
                };
                (self.get_active_theme(context), dark_mode, tenant)
            }
        };

        let tenant = (!tenant.is_empty()).then_some(tenant.as_str());
        self.compose_tokens(&theme_id, dark_mode, tenant, state)
    }

    /// Register or replace a tenant, including its dark mode default.
    pub fn register_tenant(&self, tenant_id: &str, config: TenantThemeConfig) {
        self.dark_mode_manager
            .set_tenant_default(tenant_id, config.default_dark_mode);
        self.tenant_resolver.register_tenant(tenant_id, config);
    }

    /// Register a callback run with `(theme_id, dark_mode)` after every change.
    pub fn subscribe_to_theme_changes<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.change_listeners
            .write_recover()
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe_from_theme_changes(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.change_listeners.write_recover();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Stored theme for `context`, if any.
    pub fn active_theme(&self, context: &str) -> Option<ActiveTheme> {
        self.store.get(context)
    }

    /// Contexts with a stored theme, sorted.
    pub fn active_contexts(&self) -> Vec<String> {
        self.store.contexts()
    }

    pub fn remove_active_theme(&self, context: &str) -> Option<ActiveTheme> {
        let removed = self.store.remove(context);
        if removed.is_some() {
            log::debug!("Removed active theme for context '{context}'");
        }
        removed
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    /// Start polling the system preference, if enabled and a source was given.
    ///
    /// Detected values are recorded under [`SYSTEM_CONTEXT`] only; they do
    /// not change the dark mode of other contexts. Read them with
    /// [`system_prefers_dark`](Self::system_prefers_dark) or
    /// `is_dark_mode_enabled(SYSTEM_CONTEXT)`.
    ///
    /// Returns whether a detection loop is running afterwards.
    pub fn start_auto_detection(&self) -> bool {
        let mut detection = self.detection.lock_recover();
        if detection.as_ref().is_some_and(DetectionHandle::is_running) {
            return true;
        }

        if !self.config.enable_system_detection {
            return false;
        }

        let Some(source) = &self.system_preference else {
            log::debug!("No system preference source configured, skipping auto-detection");
            return false;
        };

        let handle = self
            .dark_mode_manager
            .start_auto_detection(self.config.detection_interval(), Arc::clone(source));
        let running = handle.is_running();
        *detection = Some(handle);
        running
    }

    /// Last system preference seen by auto-detection, if any.
    pub fn system_prefers_dark(&self) -> Option<bool> {
        self.dark_mode_manager.user_preference(SYSTEM_CONTEXT)
    }

    /// Stop the detection loop and wait for it to exit.
    pub async fn stop_auto_detection(&self) {
        let handle = self.detection.lock_recover().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    fn resolve_theme_options(&self, options: Option<ThemeOptions>) -> ThemeOptions {
        options.unwrap_or_else(|| ThemeOptions {
            dark_mode: self.config.default_dark_mode,
            ..ThemeOptions::default()
        })
    }

    /// Explicit tenant first, then the tenant field of the option context.
    fn tenant_from_options(&self, options: &ThemeOptions) -> String {
        if !options.tenant.is_empty() || !self.config.enable_multi_tenant {
            return options.tenant.clone();
        }

        match options.context.get(&self.config.tenant_context_field) {
            Some(Value::String(tenant)) => tenant.clone(),
            _ => String::new(),
        }
    }

    fn check_tenant_allows(&self, tenant: &str, theme_id: &str) -> ThemeResult<()> {
        if tenant.is_empty() || !self.config.enable_multi_tenant {
            return Ok(());
        }

        match self.tenant_resolver.tenant_config(tenant) {
            Some(config) if !config.allows(theme_id) => {
                log::warn!("Tenant '{tenant}' may not use theme '{theme_id}'");
                Err(ThemeError::ThemeNotAllowed {
                    theme_id: theme_id.to_string(),
                    tenant: tenant.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn validate_theme_exists(&self, theme_id: &str) -> bool {
        if theme_id.trim().is_empty() {
            return false;
        }

        if self.config.registered_themes.is_empty() || theme_id == self.config.default_theme {
            return true;
        }

        self.config.registered_themes.iter().any(|t| t == theme_id)
            || self.token_resolver.known_themes().contains(theme_id)
            || self.tenant_resolver.tenant_themes().iter().any(|t| t == theme_id)
    }

    /// Compose tokens for one theme, color scheme, and validation state.
    ///
    /// A named tenant contributes only its own overrides, even none. Without
    /// a tenant, the tenant associated with the theme applies. Dark tokens go
    /// on top of everything.
    fn compose_tokens(
        &self,
        theme_id: &str,
        dark_mode: bool,
        tenant: Option<&str>,
        state: ValidationState,
    ) -> TokenMap {
        let base = self
            .token_resolver
            .get_validation_tokens(theme_id, false)
            .tokens_for(state, false);
        let mut tokens = self.token_resolver.resolve_theme_tokens(theme_id, &base);

        if self.config.enable_multi_tenant {
            let overrides = match tenant {
                Some(tenant) => self.tenant_resolver.get_tenant_token_overrides(tenant),
                None => self
                    .tenant_resolver
                    .tenant_for_theme(theme_id)
                    .map(|tenant| self.tenant_resolver.get_tenant_token_overrides(&tenant))
                    .unwrap_or_default(),
            };
            overlay(&mut tokens, &overrides);
        }

        if dark_mode {
            let dark = self
                .token_resolver
                .get_validation_tokens(theme_id, true)
                .tokens_for(state, true);
            overlay(&mut tokens, &dark);
        }

        tokens
    }

    fn notify_theme_change(&self, theme_id: &str, dark_mode: bool) -> Dispatch {
        let listeners: Vec<ThemeChangeListener> = self
            .change_listeners
            .read_recover()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let jobs: Vec<ListenerJob> = listeners
            .into_iter()
            .map(|listener| {
                let theme_id = theme_id.to_string();
                Box::new(move || {
                    listener(&theme_id, dark_mode);
                    Ok(())
                }) as ListenerJob
            })
            .collect();

        dispatch_jobs(&self.pool, "theme change", jobs)
    }
}

/// Builder for [`ThemeCoordinationManager`] with injectable collaborators.
#[derive(Default)]
pub struct ThemeCoordinationManagerBuilder {
    config: ThemeManagerConfig,
    store: Option<Arc<dyn ThemeStore>>,
    token_resolver: Option<Arc<TokenResolver>>,
    system_preference: Option<Arc<dyn SystemPreference>>,
}

impl ThemeCoordinationManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ThemeManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `store` instead of an [`InMemoryThemeStore`] built from the config.
    pub fn store(mut self, store: Arc<dyn ThemeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn token_resolver(mut self, resolver: Arc<TokenResolver>) -> Self {
        self.token_resolver = Some(resolver);
        self
    }

    /// Source polled by auto-detection.
    pub fn system_preference(mut self, source: Arc<dyn SystemPreference>) -> Self {
        self.system_preference = Some(source);
        self
    }

    /// Validate the config and build the manager.
    ///
    /// Auto-detection starts right away when enabled, a preference source
    /// was given, and a tokio runtime is available.
    pub fn build(self) -> Result<ThemeCoordinationManager, ConfigLoadError> {
        self.config.validate().map_err(ConfigLoadError::Invalid)?;

        let manager = self.assemble();
        if manager.system_preference.is_some() {
            manager.start_auto_detection();
        }
        Ok(manager)
    }

    fn assemble(self) -> ThemeCoordinationManager {
        let config = self.config;
        let store = self.store.unwrap_or_else(|| {
            Arc::new(InMemoryThemeStore::with_limits(StoreLimits {
                ttl: config.active_theme_ttl(),
                max_entries: config.max_active_themes,
            }))
        });
        let pool = Arc::new(TaskPool::new(config.listener_concurrency));

        ThemeCoordinationManager {
            store,
            token_resolver: self.token_resolver.unwrap_or_default(),
            dark_mode_manager: Arc::new(DarkModeManager::new()),
            tenant_resolver: Arc::new(TenantResolver::new(config.default_theme.clone())),
            event_bus: ThemeEventBus::new(Arc::clone(&pool)),
            change_listeners: RwLock::new(Vec::new()),
            pool,
            system_preference: self.system_preference,
            detection: Mutex::new(None),
            config,
        }
    }
}
