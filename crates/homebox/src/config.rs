//! Config loading with CLI flag overrides.
//!
//! Profiles come from `homebox-config`; this module layers `--server`,
//! `--username`, `--password` and friends on top and produces the
//! `CoordinatorConfig` handed to core.

use std::path::PathBuf;

use secrecy::SecretString;

use homebox_config::{Config, Profile, build_coordinator_config, normalize_server_url};
use homebox_core::{CoordinatorConfig, Credentials};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file this invocation reads and writes.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(homebox_config::config_path)
}

/// Load the config file, falling back to defaults when it is absent.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(homebox_config::load_config_from(&config_path(global))?)
}

/// Profile name selected by `--profile`, the config default, or "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The active profile with CLI overrides applied.
///
/// Without a stored profile, `--server` alone is enough to build one.
pub fn effective_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, cfg);

    let mut profile = match (cfg.profiles.get(&name), &global.server) {
        (Some(profile), _) => profile.clone(),
        (None, Some(_)) => Profile {
            verify_ssl: true,
            ..Profile::default()
        },
        (None, None) if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path(global).display().to_string(),
            });
        }
    };

    if let Some(server) = &global.server {
        profile.server.clone_from(server);
    }
    if let Some(username) = &global.username {
        profile.username = Some(username.clone());
    }
    if global.insecure {
        profile.verify_ssl = false;
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if let Some(label) = &global.label {
        profile.asset_label = Some(label.clone());
    }

    Ok((name, profile))
}

/// Build the coordinator config for this invocation.
pub fn coordinator_config(
    global: &GlobalOpts,
    poll_interval: Option<u64>,
) -> Result<CoordinatorConfig, CliError> {
    let cfg = load(global)?;
    let (name, mut profile) = effective_profile(global, &cfg)?;
    if let Some(secs) = poll_interval {
        profile.poll_interval = Some(secs);
    }

    let url = normalize_server_url(&profile.server, profile.use_https)?;
    let credentials = match &global.password {
        Some(password) => Credentials {
            username: profile
                .username
                .clone()
                .ok_or_else(|| CliError::NoCredentials {
                    profile: name.clone(),
                })?,
            password: SecretString::from(password.clone()),
        },
        None => homebox_config::resolve_credentials(&profile, &name)?,
    };

    let config = build_coordinator_config(&profile, &cfg.defaults, url, credentials)?;
    tracing::debug!(
        profile = %name,
        url = %config.url,
        poll_interval_secs = config.schedule.effective_poll_interval().as_secs(),
        timeout_secs = config.timeout.as_secs(),
        "resolved configuration"
    );
    Ok(config)
}
