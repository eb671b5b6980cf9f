//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, Profile};
use crate::error::CliError;
use crate::output;

const VALID_KEYS: &str = "bridge, admin_key, admin_key_env, ca_cert, insecure, timeout, \
                          poll_interval_ms, relink_kick, pairing_stale_secs";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "notify_prefix = \"{}\"", cfg.defaults.notify_prefix);
    let _ = writeln!(out, "notify_min_len = {}", cfg.defaults.notify_min_len);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "bridge = \"{}\"", p.bridge);
        if p.admin_key.is_some() {
            let _ = writeln!(out, "admin_key = \"****\"");
        }
        if let Some(ref env) = p.admin_key_env {
            let _ = writeln!(out, "admin_key_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ms) = p.poll_interval_ms {
            let _ = writeln!(out, "poll_interval_ms = {ms}");
        }
        if let Some(kick) = p.relink_kick {
            let _ = writeln!(out, "relink_kick = {kick}");
        }
        if let Some(secs) = p.pairing_stale_secs {
            let _ = writeln!(out, "pairing_stale_secs = {secs}");
        }
    }

    out
}

/// Masked copy for structured output formats.
fn redacted(cfg: &Config) -> Config {
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            insecure: cfg.defaults.insecure,
            timeout: cfg.defaults.timeout,
            notify_prefix: cfg.defaults.notify_prefix.clone(),
            notify_min_len: cfg.defaults.notify_min_len,
        },
        profiles: cfg
            .profiles
            .iter()
            .map(|(name, p)| {
                let mut p = p.clone();
                if p.admin_key.is_some() {
                    p.admin_key = Some("****".into());
                }
                (name.clone(), p)
            })
            .collect(),
    }
}

/// Delegate to the shared config crate's save function.
fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expected}"),
    })
}

/// Read a non-empty admin key from the terminal.
fn prompt_admin_key() -> Result<String, CliError> {
    let key = rpassword::prompt_password("Admin key: ").map_err(prompt_err)?;
    if key.is_empty() {
        return Err(CliError::Validation {
            field: "admin_key".into(),
            reason: "admin key cannot be empty".into(),
        });
    }
    Ok(key)
}

/// Offer to store the admin key in the system keyring or return it for
/// plaintext config.
///
/// Returns `Some(key)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_keyring_storage(key: &str, profile_name: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the admin key?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        pairlink_config::store_admin_key(profile_name, key)?;
        eprintln!("   ✓ Admin key stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(key.to_owned()))
    }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("pairlink configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            // 1. Profile name
            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            // 2. Bridge URL
            let bridge: String = Input::new()
                .with_prompt("Bridge gateway URL")
                .default("http://localhost:3001".into())
                .interact_text()
                .map_err(prompt_err)?;
            pairlink_config::parse_bridge_url(&bridge)?;

            // 3. Admin key (optional; status and notify work without one)
            let with_key = Select::new()
                .with_prompt("Configure an admin key for pair/unlink?")
                .items(&["Yes", "No (status and notify only)"])
                .default(0)
                .interact()
                .map_err(prompt_err)?
                == 0;
            let admin_key = if with_key {
                let key = prompt_admin_key()?;
                prompt_keyring_storage(&key, &profile_name)?
            } else {
                None
            };

            // 4. Build profile and config, keeping other profiles
            let profile = Profile {
                bridge,
                admin_key,
                ..Profile::default()
            };

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());

            // 5. Write config
            save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: pairlink status");

            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                "config".into()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            match key.as_str() {
                "bridge" => {
                    pairlink_config::parse_bridge_url(&value)?;
                    profile.bridge = value;
                }
                "admin_key" | "admin-key" => profile.admin_key = Some(value),
                "admin_key_env" | "admin-key-env" => profile.admin_key_env = Some(value),
                "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
                "insecure" => {
                    profile.insecure = Some(parse_value("insecure", &value, "'true' or 'false'")?);
                }
                "timeout" => {
                    profile.timeout = Some(parse_value("timeout", &value, "a number (seconds)")?);
                }
                "poll_interval_ms" | "poll-interval-ms" => {
                    let ms: u64 =
                        parse_value("poll_interval_ms", &value, "a number (milliseconds)")?;
                    if ms == 0 {
                        return Err(CliError::Validation {
                            field: "poll_interval_ms".into(),
                            reason: "must be greater than zero".into(),
                        });
                    }
                    profile.poll_interval_ms = Some(ms);
                }
                "relink_kick" | "relink-kick" => {
                    profile.relink_kick =
                        Some(parse_value("relink_kick", &value, "'true' or 'false'")?);
                }
                "pairing_stale_secs" | "pairing-stale-secs" => {
                    profile.pairing_stale_secs =
                        Some(parse_value("pairing_stale_secs", &value, "a number (seconds)")?);
                }
                other => {
                    return Err(CliError::Validation {
                        field: other.into(),
                        reason: format!("unknown config key '{other}'. Valid keys: {VALID_KEYS}"),
                    });
                }
            }

            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: pairlink config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        // ── SetKey ──────────────────────────────────────────────────
        ConfigCommand::SetKey => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: config::available_profiles(&cfg),
                });
            }

            let key = match global.admin_key {
                Some(ref key) => key.clone(),
                None => prompt_admin_key()?,
            };
            pairlink_config::store_admin_key(&profile_name, &key)?;

            if !global.quiet {
                eprintln!("✓ Admin key stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }
    }
}
