//! Webhook id management and registration with Homebox.

use url::Url;

use homebox_config::Config;
use homebox_core::{
    HomeboxSource, InventorySource, WebhookRegistration, generate_webhook_id, register_webhook,
    webhook_url,
};

use crate::cli::{GlobalOpts, WebhookArgs, WebhookCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WebhookArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        WebhookCommand::Id { save } => {
            let mut cfg = config::load(global)?;
            let name = config::active_profile_name(global, &cfg);
            let existing = cfg.profiles.get(&name).and_then(|p| p.webhook_id.clone());

            let id = match existing {
                Some(id) => id,
                None if save => persist_new_id(global, &mut cfg, &name)?,
                None => generate_webhook_id(),
            };
            output::print_output(&id, global.quiet);
            Ok(())
        }

        WebhookCommand::Register { external_url } => {
            let mut cfg = config::load(global)?;
            let (name, profile) = config::effective_profile(global, &cfg)?;

            let external = external_url
                .or_else(|| profile.external_url.clone())
                .ok_or_else(|| CliError::Validation {
                    field: "external_url".into(),
                    reason: "pass --external-url or set external_url on the profile".into(),
                })?;
            let external = Url::parse(&external).map_err(|e| CliError::Validation {
                field: "external_url".into(),
                reason: format!("invalid URL '{external}': {e}"),
            })?;

            let id = match profile.webhook_id.clone() {
                Some(id) => id,
                None => persist_new_id(global, &mut cfg, &name)?,
            };

            let source = HomeboxSource::new(&config::coordinator_config(global, None)?)?;
            let result = register_webhook(&source, &external, &id).await;
            source.close().await;

            let url = webhook_url(&external, &id);
            match result? {
                WebhookRegistration::Created => {
                    if !global.quiet {
                        eprintln!("Registered webhook {url}");
                    }
                }
                WebhookRegistration::AlreadyRegistered => {
                    if !global.quiet {
                        eprintln!("Webhook {url} is already registered");
                    }
                }
            }
            output::print_output(&url, global.quiet);
            Ok(())
        }
    }
}

/// Generate an id and store it on the named profile.
fn persist_new_id(global: &GlobalOpts, cfg: &mut Config, name: &str) -> Result<String, CliError> {
    let Some(profile) = cfg.profiles.get_mut(name) else {
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: name.into(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    };

    let id = generate_webhook_id();
    profile.webhook_id = Some(id.clone());
    homebox_config::save_config_to(cfg, &config::config_path(global))?;
    tracing::info!(profile = %name, "saved new webhook id");
    Ok(id)
}
