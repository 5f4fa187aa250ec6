use thiserror::Error;

/// Errors returned by the mutating operations of the theme coordination layer.
///
/// Queries (`get_active_theme`, `is_dark_mode_enabled`, `get_theme_tokens`,
/// `get_validation_tokens_for_state`) never fail; they fall back to defaults.
/// Only the operations that change state report errors, and they do so as
/// typed results rather than panics.
///
/// # Error Categories
///
/// - [`InvalidTheme`] - the theme id is empty or not registered
/// - [`ContextNotFound`] - a toggle was requested for a context that never had a theme
/// - [`ThemeNotAllowed`] - the tenant restricts its themes and this one is not listed
///
/// # Examples
///
/// ```no_run
/// use coordination::{ThemeCoordinationManager, ThemeError};
///
/// let manager = ThemeCoordinationManager::new();
/// match manager.toggle_dark_mode("session-42") {
///     Ok(dark) => println!("dark mode is now {dark}"),
///     Err(ThemeError::ContextNotFound { context }) => {
///         log::warn!("no theme applied to {context} yet");
///     }
///     Err(other) => log::error!("toggle failed: {other}"),
/// }
/// ```
///
/// [`InvalidTheme`]: ThemeError::InvalidTheme
/// [`ContextNotFound`]: ThemeError::ContextNotFound
/// [`ThemeNotAllowed`]: ThemeError::ThemeNotAllowed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThemeError {
    /// The requested theme id is empty or unknown to the manager.
    ///
    /// # Fields
    /// - `theme_id`: The id that was rejected (may be empty)
    #[error("Theme '{theme_id}' not found")]
    InvalidTheme { theme_id: String },

    /// No active theme exists for the context.
    ///
    /// Raised by `toggle_dark_mode` when `set_active_theme` was never called
    /// for the context (or its entry was evicted). No entry is created.
    #[error("No active theme for context '{context}'")]
    ContextNotFound { context: String },

    /// The tenant lists allowed themes and the requested one is not among them.
    #[error("Theme '{theme_id}' is not allowed for tenant '{tenant}'")]
    ThemeNotAllowed { theme_id: String, tenant: String },
}

/// Result alias for theme coordination operations.
pub type ThemeResult<T> = Result<T, ThemeError>;

/// Failure reported by a single event or change listener.
///
/// Listener failures are captured per listener and logged; they are never
/// propagated back to the code that emitted the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// The listener returned an error of its own.
    #[error("Listener failed: {reason}")]
    Failed { reason: String },

    /// The listener panicked while handling the event.
    #[error("Listener panicked: {reason}")]
    Panicked { reason: String },

    /// The dispatch pool was shut down before the listener could run.
    #[error("Listener was cancelled before completion")]
    Cancelled,
}

impl ListenerError {
    /// Convenience constructor for listener implementations.
    pub fn failed(reason: impl Into<String>) -> Self {
        ListenerError::Failed {
            reason: reason.into(),
        }
    }
}
