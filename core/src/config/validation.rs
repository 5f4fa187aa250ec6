/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid default_theme: must not be empty")]
    EmptyDefaultTheme,
    #[error("Invalid detection_interval_ms: {configured} (must be greater than 0)")]
    DetectionInterval { configured: u64 },
    #[error("Invalid listener_concurrency: {configured} (must be greater than 0)")]
    ListenerConcurrency { configured: usize },
    #[error("Invalid max_active_themes: {configured} (must be greater than 0)")]
    MaxActiveThemes { configured: usize },
    #[error("Invalid active_theme_ttl_secs: {configured} (must be greater than 0)")]
    ActiveThemeTtl { configured: u64 },
    #[error("Invalid tenant_context_field: must not be empty when multi-tenant mode is enabled")]
    EmptyTenantContextField,
}

impl ConfigValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigValidationError::EmptyDefaultTheme => "Default theme missing!\n\n\
                Please set default_theme in config.toml to the theme used when no \
                context or tenant matches."
                .to_string(),
            ConfigValidationError::DetectionInterval { configured } => {
                format!(
                    "Dark mode detection interval too low!\n\n\
                    Your configured value: {configured} ms\n\n\
                    Please update detection_interval_ms in config.toml to a positive value, \
                    or set enable_system_detection = false."
                )
            }
            ConfigValidationError::ListenerConcurrency { configured } => {
                format!(
                    "Listener concurrency too low!\n\n\
                    Your configured value: {configured}\n\n\
                    Please update listener_concurrency in config.toml to 1 or more."
                )
            }
            ConfigValidationError::MaxActiveThemes { configured } => {
                format!(
                    "Active theme limit too low!\n\n\
                    Your configured value: {configured}\n\n\
                    Please update max_active_themes in config.toml to 1 or more, \
                    or remove it to keep every context."
                )
            }
            ConfigValidationError::ActiveThemeTtl { configured } => {
                format!(
                    "Active theme TTL too low!\n\n\
                    Your configured value: {configured} seconds\n\n\
                    Please update active_theme_ttl_secs in config.toml to 1 or more, \
                    or remove it to disable expiry."
                )
            }
            ConfigValidationError::EmptyTenantContextField => {
                "Tenant context field missing!\n\n\
                Please set tenant_context_field in config.toml, \
                or set enable_multi_tenant = false."
                    .to_string()
            }
        }
    }
}

/// Failure to build or deserialize a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration loading failed: {0}")]
    Load(#[source] config::ConfigError),
    #[error("Failed to deserialize config: {0}")]
    Deserialize(#[source] config::ConfigError),
    #[error("Configuration is invalid: {}", summarize(.0))]
    Invalid(Vec<ConfigValidationError>),
}

fn summarize(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_mentions_config_key() {
        let error = ConfigValidationError::ListenerConcurrency { configured: 0 };
        assert!(error.user_message().contains("listener_concurrency"));
    }

    #[test]
    fn test_invalid_summary_joins_errors() {
        let error = ConfigLoadError::Invalid(vec![
            ConfigValidationError::EmptyDefaultTheme,
            ConfigValidationError::ActiveThemeTtl { configured: 0 },
        ]);
        let message = error.to_string();
        assert!(message.contains("default_theme"));
        assert!(message.contains("active_theme_ttl_secs"));
    }
}
