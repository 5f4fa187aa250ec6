use claims::{assert_err, assert_ok, assert_some};
use coordination::tokens::token_map;
use coordination::{
    DARK_MODE_TOGGLE, SYSTEM_CONTEXT, SystemPreference, THEME_CHANGE, TenantThemeConfig,
    ThemeCoordinationManager, ThemeError, ThemeEvent, ThemeManagerConfig, ThemeOptions,
    ValidationState,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

// Helper module for manager testing
mod manager_helpers {
    use super::*;

    /// Manager with events enabled and multi-tenant support
    pub fn create_manager() -> ThemeCoordinationManager {
        ThemeCoordinationManager::new()
    }

    /// Forward every event of `event_type` into a channel
    pub fn capture_events(
        manager: &ThemeCoordinationManager,
        event_type: &str,
    ) -> mpsc::UnboundedReceiver<ThemeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.event_bus().subscribe(event_type, move |event| {
            tx.send(event.clone())
                .map_err(|e| coordination::ListenerError::failed(e.to_string()))
        });
        rx
    }
}

use manager_helpers::*;

mod reference_scenarios {
    use super::*;

    #[test]
    fn test_unset_context_returns_global_default() {
        let config = ThemeManagerConfig {
            default_theme: "corporate".to_string(),
            ..ThemeManagerConfig::default()
        };
        let manager = assert_ok!(ThemeCoordinationManager::with_config(config));

        for context in ["a", "b", "session-1", ""] {
            assert_eq!(manager.get_active_theme(context), "corporate");
        }
    }

    #[test]
    fn test_valid_border_without_tenant_override() {
        let manager = create_manager();
        assert_ok!(manager.set_active_theme(
            "s1",
            "blue",
            Some(ThemeOptions::new().tenant("acme"))
        ));

        let tokens = manager.get_theme_tokens("blue", ValidationState::Valid);
        assert_eq!(tokens["border"], "#16a34a");
        assert_eq!(tokens["icon"], "✓");
    }

    #[test]
    fn test_tenant_override_wins_for_theme() {
        let manager = create_manager();
        manager.register_tenant(
            "acme",
            TenantThemeConfig::new("blue").with_overrides(token_map(&[("border", "#000")])),
        );

        assert_eq!(
            manager.get_theme_tokens("blue", ValidationState::Valid)["border"],
            "#000"
        );
    }

    #[test]
    fn test_toggle_never_set_context() {
        let manager = create_manager();
        let err = assert_err!(manager.toggle_dark_mode("never-set"));

        assert!(matches!(err, ThemeError::ContextNotFound { .. }));
        assert!(manager.active_contexts().is_empty());
    }

    #[test]
    fn test_set_active_theme_is_deterministic() {
        let manager = create_manager();
        let options = ThemeOptions::new().dark_mode(true).tenant("acme");

        assert_ok!(manager.set_active_theme("s1", "blue", Some(options.clone())));
        let first = assert_some!(manager.active_theme("s1")).resolved_tokens;
        assert_ok!(manager.set_active_theme("s1", "blue", Some(options)));
        let second = assert_some!(manager.active_theme("s1")).resolved_tokens;

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

mod event_flow {
    use super::*;

    #[tokio::test]
    async fn test_theme_change_event_payload() {
        let manager = create_manager();
        let mut events = capture_events(&manager, THEME_CHANGE);

        let dispatch = assert_ok!(manager.set_active_theme_with_dispatch(
            "s1",
            "blue",
            Some(ThemeOptions::new().tenant("acme"))
        ));
        let report = dispatch.wait(WAIT).await;
        assert_eq!(report.delivered, 1);

        let event = assert_some!(events.recv().await);
        assert_eq!(event.event_type, THEME_CHANGE);
        assert_eq!(event.theme_id, "blue");
        assert_eq!(event.context, "s1");
        assert!(!event.dark_mode);
        assert_eq!(event.data["tenant"], Value::from("acme"));
        assert_eq!(event.data["source"], Value::from("manual"));
    }

    #[tokio::test]
    async fn test_dark_mode_toggle_event_carries_previous_state() {
        let manager = create_manager();
        let mut events = capture_events(&manager, DARK_MODE_TOGGLE);
        assert_ok!(manager.set_active_theme("s1", "blue", None));

        let (dark_mode, dispatch) = assert_ok!(manager.toggle_dark_mode_with_dispatch("s1"));
        dispatch.wait(WAIT).await;

        assert!(dark_mode);
        let event = assert_some!(events.recv().await);
        assert!(event.dark_mode);
        assert_eq!(event.data["previous_state"], Value::Bool(false));
    }

    #[tokio::test]
    async fn test_change_listener_receives_theme_and_dark_mode() {
        let manager = create_manager();
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.subscribe_to_theme_changes(move |theme_id, dark_mode| {
            let _ = tx.send((theme_id.to_string(), dark_mode));
        });

        let dispatch = assert_ok!(manager.set_active_theme_with_dispatch(
            "s1",
            "green",
            Some(ThemeOptions::new().dark_mode(true))
        ));
        dispatch.wait(WAIT).await;

        assert_eq!(rx.recv().await, Some(("green".to_string(), true)));
    }

    #[tokio::test]
    async fn test_panicking_listener_is_isolated() {
        let manager = create_manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        manager.subscribe_to_theme_changes(|_, _| panic!("listener bug"));
        manager.subscribe_to_theme_changes(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let dispatch = assert_ok!(manager.set_active_theme_with_dispatch("s1", "blue", None));
        let report = dispatch.wait(WAIT).await;

        assert_eq!(report.failed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.get_active_theme("s1"), "blue");
    }

    #[test]
    fn test_slow_listeners_run_off_the_calling_thread() {
        let manager = create_manager();
        let caller = std::thread::current().id();
        let (tx, rx) = std::sync::mpsc::channel();
        manager.subscribe_to_theme_changes(move |_, _| {
            std::thread::sleep(Duration::from_millis(500));
            let _ = tx.send(std::thread::current().id());
        });

        let started = std::time::Instant::now();
        assert_ok!(manager.set_active_theme("s1", "blue", None));
        assert_ok!(manager.toggle_dark_mode("s1"));
        assert!(started.elapsed() < Duration::from_millis(250));

        let listener_thread = assert_ok!(rx.recv_timeout(WAIT));
        assert_ne!(listener_thread, caller);
        assert_ok!(rx.recv_timeout(WAIT));
    }

    #[test]
    fn test_dispatch_from_plain_thread_can_be_awaited() {
        let manager = create_manager();
        manager.subscribe_to_theme_changes(|_, _| std::thread::sleep(Duration::from_millis(50)));

        let dispatch = assert_ok!(manager.set_active_theme_with_dispatch("s1", "blue", None));
        let waiter = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let report = waiter.block_on(dispatch.wait(WAIT));

        assert_eq!(report.delivered, 1);
        assert_eq!(report.timed_out, 0);
    }

    #[tokio::test]
    async fn test_failed_mutation_emits_nothing() {
        let manager = create_manager();
        let mut events = capture_events(&manager, THEME_CHANGE);

        assert_err!(manager.set_active_theme("s1", "", None));
        assert_err!(manager.toggle_dark_mode("s1"));

        assert!(events.try_recv().is_err());
    }
}

mod tenant_flow {
    use super::*;

    #[test]
    fn test_tenant_dark_mode_default_applies_to_tenant_context() {
        let manager = create_manager();
        manager.register_tenant("acme", TenantThemeConfig::new("blue").with_dark_mode(true));

        assert_eq!(manager.get_active_theme("acme"), "blue");
        assert!(manager.is_dark_mode_enabled("acme"));
        assert!(!manager.is_dark_mode_enabled("globex"));
    }

    #[test]
    fn test_reregistering_tenant_replaces_config() {
        let manager = create_manager();
        manager.register_tenant(
            "acme",
            TenantThemeConfig::new("blue").with_overrides(token_map(&[("border", "#000")])),
        );
        manager.register_tenant("acme", TenantThemeConfig::new("green"));

        assert_eq!(manager.get_active_theme("acme"), "green");
        assert_eq!(
            manager.get_theme_tokens("blue", ValidationState::Valid)["border"],
            "#16a34a"
        );
    }

    #[test]
    fn test_tenant_without_overrides_is_isolated_from_other_tenants() {
        let manager = create_manager();
        manager.register_tenant(
            "acme",
            TenantThemeConfig::new("blue").with_overrides(token_map(&[("border", "#000")])),
        );
        manager.register_tenant("beta", TenantThemeConfig::new("green"));

        assert_ok!(manager.set_active_theme(
            "beta-session",
            "blue",
            Some(ThemeOptions::new().tenant("beta"))
        ));

        let active = assert_some!(manager.active_theme("beta-session"));
        assert_eq!(active.tenant, "beta");
        assert!(!active.resolved_tokens.contains_key("border"));

        let tokens =
            manager.get_validation_tokens_for_state("beta-session", ValidationState::Valid);
        assert_eq!(tokens["border"], "#16a34a");

        let tokens = manager.get_theme_tokens("blue", ValidationState::Valid);
        assert_eq!(tokens["border"], "#000");
    }

    #[test]
    fn test_shared_theme_uses_tenant_with_overrides() {
        let manager = create_manager();
        manager.register_tenant(
            "zeta",
            TenantThemeConfig::new("blue").with_overrides(token_map(&[("border", "#000")])),
        );
        manager.register_tenant("acme", TenantThemeConfig::new("blue"));

        assert_eq!(
            manager.get_theme_tokens("blue", ValidationState::Valid)["border"],
            "#000"
        );
    }

    #[test]
    fn test_explicit_tenant_overrides_follow_context_on_toggle() {
        let manager = create_manager();
        manager.register_tenant(
            "acme",
            TenantThemeConfig::new("blue").with_overrides(token_map(&[("accent", "#ff00ff")])),
        );
        assert_ok!(manager.set_active_theme(
            "s1",
            "green",
            Some(ThemeOptions::new().tenant("acme"))
        ));

        assert_ok!(manager.toggle_dark_mode("s1"));
        let active = assert_some!(manager.active_theme("s1"));
        assert_eq!(active.resolved_tokens["accent"], "#ff00ff");
        assert_eq!(active.resolved_tokens["background"], "#111827");
    }
}

mod auto_detection {
    use super::*;

    struct DarkSystem;

    #[async_trait::async_trait]
    impl SystemPreference for DarkSystem {
        async fn prefers_dark(&self) -> Option<bool> {
            Some(true)
        }
    }

    #[tokio::test]
    async fn test_builder_starts_detection_with_source() {
        let config = ThemeManagerConfig {
            detection_interval_ms: 5,
            ..ThemeManagerConfig::default()
        };
        let manager = assert_ok!(
            ThemeCoordinationManager::builder()
                .config(config)
                .system_preference(Arc::new(DarkSystem))
                .build()
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(manager.is_dark_mode_enabled(SYSTEM_CONTEXT));
        assert_eq!(manager.system_prefers_dark(), Some(true));
        assert!(!manager.is_dark_mode_enabled("s1"));
        assert!(manager.dark_mode_manager().is_auto_detection_enabled());

        manager.stop_auto_detection().await;
        assert!(!manager.dark_mode_manager().is_auto_detection_enabled());
    }

    #[tokio::test]
    async fn test_detection_disabled_by_config() {
        let config = ThemeManagerConfig {
            enable_system_detection: false,
            ..ThemeManagerConfig::default()
        };
        let manager = assert_ok!(
            ThemeCoordinationManager::builder()
                .config(config)
                .system_preference(Arc::new(DarkSystem))
                .build()
        );

        assert!(!manager.start_auto_detection());
        assert!(!manager.dark_mode_manager().is_auto_detection_enabled());
    }
}
