use crate::common::sync::RwLockExt;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Context key that auto-detection writes the system preference to.
pub const SYSTEM_CONTEXT: &str = "system";

/// Source of the operating system (or browser) color-scheme preference.
///
/// Returns `None` when the preference cannot be determined right now.
#[async_trait]
pub trait SystemPreference: Send + Sync {
    async fn prefers_dark(&self) -> Option<bool>;
}

#[derive(Debug, Default)]
struct Preferences {
    user_preferences: HashMap<String, bool>,
    tenant_defaults: HashMap<String, bool>,
    auto_detection_enabled: bool,
    detection_interval: Option<Duration>,
}

/// Tracks dark mode per context with tenant-default fallback.
#[derive(Debug, Default)]
pub struct DarkModeManager {
    preferences: RwLock<Preferences>,
}

impl DarkModeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-context preference first, then the tenant default, then `false`.
    pub fn is_dark_mode_enabled(&self, context: &str) -> bool {
        self.preference(context).unwrap_or(false)
    }

    /// Per-context preference or tenant default, if either is recorded.
    pub fn preference(&self, context: &str) -> Option<bool> {
        let preferences = self.preferences.read_recover();
        preferences
            .user_preferences
            .get(context)
            .or_else(|| preferences.tenant_defaults.get(context))
            .copied()
    }

    /// Record the preference for a context, replacing any earlier value.
    pub fn set_dark_mode(&self, context: &str, dark_mode: bool) {
        self.preferences
            .write_recover()
            .user_preferences
            .insert(context.to_string(), dark_mode);
    }

    /// Explicit per-context preference, without fallbacks.
    pub fn user_preference(&self, context: &str) -> Option<bool> {
        self.preferences
            .read_recover()
            .user_preferences
            .get(context)
            .copied()
    }

    pub fn set_tenant_default(&self, tenant: &str, dark_mode: bool) {
        self.preferences
            .write_recover()
            .tenant_defaults
            .insert(tenant.to_string(), dark_mode);
    }

    pub fn is_auto_detection_enabled(&self) -> bool {
        self.preferences.read_recover().auto_detection_enabled
    }

    pub fn detection_interval(&self) -> Option<Duration> {
        self.preferences.read_recover().detection_interval
    }

    /// Start polling `source` every `interval` on the current tokio runtime.
    ///
    /// Returns at once. Each successful poll goes through
    /// [`set_dark_mode`](Self::set_dark_mode) for [`SYSTEM_CONTEXT`]. Without a
    /// runtime the returned handle is inert and detection stays disabled.
    pub fn start_auto_detection(
        self: &Arc<Self>,
        interval: Duration,
        source: Arc<dyn SystemPreference>,
    ) -> DetectionHandle {
        let token = CancellationToken::new();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("No async runtime available, dark mode auto-detection not started");
            return DetectionHandle { token, task: None };
        };

        {
            let mut preferences = self.preferences.write_recover();
            preferences.auto_detection_enabled = true;
            preferences.detection_interval = Some(interval);
        }

        log::info!("Starting dark mode auto-detection every {interval:?}");
        let manager = Arc::clone(self);
        let task = runtime.spawn(run_detection(manager, source, interval, token.clone()));

        DetectionHandle {
            token,
            task: Some(task),
        }
    }

    fn stop_auto_detection(&self) {
        self.preferences.write_recover().auto_detection_enabled = false;
    }
}

async fn run_detection(
    manager: Arc<DarkModeManager>,
    source: Arc<dyn SystemPreference>,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => {
                log::info!("Dark mode auto-detection shutting down");
                break;
            }
            _ = ticker.tick() => {
                match source.prefers_dark().await {
                    Some(dark_mode) => {
                        if manager.user_preference(SYSTEM_CONTEXT) != Some(dark_mode) {
                            log::debug!("System dark mode preference is now {dark_mode}");
                        }
                        manager.set_dark_mode(SYSTEM_CONTEXT, dark_mode);
                    }
                    None => log::debug!("System dark mode preference unavailable"),
                }
            }
        }
    }

    manager.stop_auto_detection();
}

/// Handle to a running auto-detection loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct DetectionHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DetectionHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("Dark mode auto-detection task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for DetectionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
