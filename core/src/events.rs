//! Typed publish/subscribe for theme change notifications.

use crate::common::ListenerError;
use crate::common::sync::RwLockExt;
use crate::dispatch::{Dispatch, ListenerJob, dispatch_jobs};
use crate::taskpool::TaskPool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Emitted after `set_active_theme` replaces a context's theme.
pub const THEME_CHANGE: &str = "theme_change";
/// Emitted after `toggle_dark_mode` flips a context's dark mode.
pub const DARK_MODE_TOGGLE: &str = "dark_mode_toggle";

/// Notification describing one theme mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeEvent {
    pub event_type: String,
    pub theme_id: String,
    pub context: String,
    pub dark_mode: bool,
    pub timestamp: DateTime<Utc>,
    pub data: BTreeMap<String, Value>,
}

impl ThemeEvent {
    pub fn new(
        event_type: impl Into<String>,
        theme_id: impl Into<String>,
        context: impl Into<String>,
        dark_mode: bool,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            theme_id: theme_id.into(),
            context: context.into(),
            dark_mode,
            timestamp: Utc::now(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Opaque handle returned by subscriptions, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Listener invoked with each event of the type it subscribed to.
pub type EventListener = Arc<dyn Fn(&ThemeEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Dispatches [`ThemeEvent`]s to listeners registered per event type.
///
/// Listeners run concurrently on a bounded [`TaskPool`]. A failing or
/// panicking listener only affects itself; the emitter never sees the error.
pub struct ThemeEventBus {
    listeners: RwLock<HashMap<String, Vec<(SubscriptionId, EventListener)>>>,
    pool: Arc<TaskPool>,
}

impl fmt::Debug for ThemeEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read_recover();
        let counts: HashMap<&String, usize> =
            listeners.iter().map(|(kind, list)| (kind, list.len())).collect();
        f.debug_struct("ThemeEventBus")
            .field("listeners", &counts)
            .finish()
    }
}

impl ThemeEventBus {
    pub fn new(pool: Arc<TaskPool>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            pool,
        }
    }

    /// Register `listener` for `event_type`. Registering the same closure twice
    /// yields two independent subscriptions.
    pub fn subscribe<F>(&self, event_type: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&ThemeEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let event_type = event_type.into();
        log::debug!("Subscribing {id} to '{event_type}' events");

        self.listeners
            .write_recover()
            .entry(event_type)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a subscription. Returns `false` when the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write_recover();
        let mut removed = false;

        for list in listeners.values_mut() {
            let before = list.len();
            list.retain(|(existing, _)| *existing != id);
            removed |= list.len() != before;
        }
        listeners.retain(|_, list| !list.is_empty());

        if removed {
            log::debug!("Unsubscribed {id}");
        }
        removed
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .read_recover()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Fan `event` out to every listener of `event_type`.
    ///
    /// The listener list is copied before dispatch, so listeners may
    /// subscribe or unsubscribe without deadlocking the bus.
    pub fn emit(&self, event_type: &str, event: ThemeEvent) -> Dispatch {
        let listeners: Vec<EventListener> = self
            .listeners
            .read_recover()
            .get(event_type)
            .map(|list| list.iter().map(|(_, listener)| Arc::clone(listener)).collect())
            .unwrap_or_default();

        log::debug!(
            "Emitting '{event_type}' for context '{}' to {} listeners",
            event.context,
            listeners.len()
        );

        let event = Arc::new(event);
        let jobs: Vec<ListenerJob> = listeners
            .into_iter()
            .map(|listener| {
                let event = Arc::clone(&event);
                Box::new(move || listener(&event)) as ListenerJob
            })
            .collect();

        dispatch_jobs(&self.pool, event_type, jobs)
    }
}
