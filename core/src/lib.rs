//! # Theme Coordination Library
//!
//! Per-context theme state for validation-aware UIs. The library resolves
//! design tokens for a theme, validation state, color scheme, and tenant,
//! keeps the active theme of every context, and notifies listeners when a
//! context changes theme or dark mode.
//!
//! ## Modules
//!
//! - [`manager`] - The [`ThemeCoordinationManager`] orchestrator
//! - [`tokens`] - Token maps, validation palettes and the token resolver
//! - [`dark_mode`] - Dark mode preferences and system auto-detection
//! - [`tenant`] - Tenant theme defaults and overrides
//! - [`events`] - Theme event bus with typed subscriptions
//! - [`dispatch`] - Listener dispatch reports
//! - [`store`] - Injectable storage for active themes
//! - [`taskpool`] - Bounded pool running listeners
//! - [`config`] - Manager settings and loading
//! - [`common`] - Error types shared by all modules

pub mod common;
pub mod config;
pub mod dark_mode;
pub mod dispatch;
pub mod events;
pub mod manager;
pub mod store;
pub mod taskpool;
pub mod tenant;
pub mod tokens;

pub use common::{ListenerError, ThemeError, ThemeResult};
pub use config::ThemeManagerConfig;
pub use dark_mode::{DarkModeManager, SYSTEM_CONTEXT, SystemPreference};
pub use dispatch::{Dispatch, DispatchReport};
pub use events::{DARK_MODE_TOGGLE, SubscriptionId, THEME_CHANGE, ThemeEvent, ThemeEventBus};
pub use manager::{ActiveTheme, ThemeCoordinationManager, ThemeOptions};
pub use store::{InMemoryThemeStore, StoreLimits, ThemeStore};
pub use tenant::{TenantResolver, TenantThemeConfig};
pub use tokens::resolver::TokenResolver;
pub use tokens::{TokenMap, ValidationState, ValidationTokens};
