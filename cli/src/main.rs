use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use coordination::{ThemeCoordinationManager, ThemeOptions, ValidationState};
use std::path::PathBuf;
use std::time::Duration;

mod config;
mod logger;
mod output;

use output::OutputFormat;

/// How long listeners get to finish before the process exits
const LISTENER_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(
    name = "themectl",
    version,
    about = "Resolve theme tokens per context, tenant and validation state"
)]
struct Cli {
    /// Path to config.toml (defaults to ./config.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a theme to a context and print its tokens for a validation state
    Resolve {
        #[arg(long, default_value = "cli")]
        context: String,
        /// Theme to apply; the context's current theme is used when omitted
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long)]
        dark: bool,
        /// Flip dark mode after applying the theme
        #[arg(long)]
        toggle: bool,
        #[arg(long, default_value_t = ValidationState::Idle)]
        state: ValidationState,
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
        #[arg(long, default_value = ":root")]
        selector: String,
    },
    /// Print the light tokens of a theme, with theme and tenant overrides
    Tokens {
        theme: String,
        #[arg(long, default_value_t = ValidationState::Idle)]
        state: ValidationState,
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
        #[arg(long, default_value = ":root")]
        selector: String,
    },
    /// List configured tenants
    Tenants,
    /// Validate the configuration file
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app_config =
        config::load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    logger::setup_logger(app_config.logging(), cli.verbose)
        .context("Failed to initialize logger")?;

    match cli.command {
        Command::Check => check(&app_config),
        Command::Tenants => {
            for (tenant_id, tenant) in app_config.tenants() {
                let allowed = if tenant.allowed_themes.is_empty() {
                    "any".to_string()
                } else {
                    tenant.allowed_themes.join(", ")
                };
                println!(
                    "{tenant_id}\ttheme={}\tdark={}\toverrides={}\tallowed={allowed}",
                    tenant.default_theme,
                    tenant.default_dark_mode,
                    tenant.token_overrides.len()
                );
            }
            Ok(())
        }
        Command::Tokens {
            theme,
            state,
            format,
            selector,
        } => {
            let manager = app_config.build_manager()?;
            let tokens = manager.get_theme_tokens(&theme, state);
            println!("{}", output::render(&tokens, format, &selector)?);
            Ok(())
        }
        Command::Resolve {
            context,
            theme,
            tenant,
            dark,
            toggle,
            state,
            format,
            selector,
        } => {
            let manager = app_config.build_manager()?;
            let request = ResolveRequest {
                context: &context,
                theme: theme.as_deref(),
                tenant: tenant.as_deref(),
                dark,
                toggle,
            };
            resolve(&manager, request).await?;

            let tokens = manager.get_validation_tokens_for_state(&context, state);
            println!("{}", output::render(&tokens, format, &selector)?);
            Ok(())
        }
    }
}

struct ResolveRequest<'a> {
    context: &'a str,
    theme: Option<&'a str>,
    tenant: Option<&'a str>,
    dark: bool,
    toggle: bool,
}

async fn resolve(manager: &ThemeCoordinationManager, request: ResolveRequest<'_>) -> Result<()> {
    manager.subscribe_to_theme_changes(|theme_id, dark_mode| {
        log::info!("Theme changed to '{theme_id}' (dark mode: {dark_mode})");
    });

    let theme_id = match request.theme {
        Some(theme_id) => theme_id.to_string(),
        None => manager.get_active_theme(request.context),
    };

    let mut options = ThemeOptions::new().dark_mode(request.dark);
    if let Some(tenant) = request.tenant {
        options = options.tenant(tenant);
    }

    let dispatch = manager.set_active_theme_with_dispatch(request.context, &theme_id, Some(options))?;
    let report = dispatch.wait(LISTENER_TIMEOUT).await;
    log::debug!("Theme change listeners: {report:?}");

    if request.toggle {
        let (dark_mode, dispatch) = manager.toggle_dark_mode_with_dispatch(request.context)?;
        dispatch.wait(LISTENER_TIMEOUT).await;
        log::debug!("Dark mode for '{}' is now {dark_mode}", request.context);
    }

    Ok(())
}

fn check(app_config: &config::AppConfig) -> Result<()> {
    let dangling = app_config.dangling_tenant_themes();
    for (tenant_id, theme_id) in &dangling {
        log::warn!("Tenant '{tenant_id}' uses theme '{theme_id}' which has no [themes] entry");
    }

    match app_config.validate() {
        Ok(()) => {
            println!(
                "Configuration OK: {} themes, {} tenants",
                app_config.themes().len(),
                app_config.tenants().len()
            );
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("{}\n", error.user_message());
            }
            bail!("{} configuration problem(s) found", errors.len())
        }
    }
}
