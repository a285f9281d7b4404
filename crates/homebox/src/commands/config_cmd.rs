//! Config subcommand handlers.

use std::io::BufRead;

use serde_json::Value;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "User")]
    username: String,
    #[tabled(rename = "Default")]
    default: String,
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_path(global).display());
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let mut value = serde_json::to_value(&cfg)?;
            redact_passwords(&mut value);

            // No table view for a nested document; YAML reads best.
            let format = match global.output {
                OutputFormat::Table => OutputFormat::Yaml,
                ref other => other.clone(),
            };
            let out = output::render_single(&format, &value, |v| v.to_string(), |_| {
                config::config_path(global).display().to_string()
            })?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            if cfg.profiles.is_empty() {
                eprintln!(
                    "No profiles configured in {}",
                    config::config_path(global).display()
                );
                return Ok(());
            }
            let default = cfg.default_profile.as_deref().unwrap_or("default");

            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort();
            let out = output::render_list(
                &global.output,
                &names,
                |name| {
                    let profile = &cfg.profiles[name.as_str()];
                    ProfileRow {
                        name: (*name).clone(),
                        server: profile.server.clone(),
                        username: profile.username.clone().unwrap_or_else(|| "-".into()),
                        default: if name.as_str() == default { "*".into() } else { String::new() },
                    }
                },
                |name| (*name).clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword => {
            let cfg = config::load(global)?;
            let name = config::active_profile_name(global, &cfg);

            let password = match &global.password {
                Some(password) => password.clone(),
                None => {
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    line.trim_end_matches(['\r', '\n']).to_owned()
                }
            };
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }

            homebox_config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password for profile '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

/// Blank out `profiles.*.password` in a serialized config.
fn redact_passwords(value: &mut Value) {
    let Some(profiles) = value.get_mut("profiles").and_then(Value::as_object_mut) else {
        return;
    };
    for profile in profiles.values_mut() {
        if profile.get("password").is_some_and(|p| !p.is_null()) {
            profile["password"] = Value::String(REDACTED.into());
        }
    }
}
