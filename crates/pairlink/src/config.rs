//! CLI configuration: thin wrapper around `pairlink_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--bridge, --admin-key, etc.).

use std::time::Duration;

use secrecy::SecretString;

use pairlink_core::{LinkConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use pairlink_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `LinkConfig` for bridge-bound commands.
///
/// Uses the active profile when one exists, otherwise the `--bridge`
/// flag alone. Flags override profile values either way.
pub fn resolve_link_config(cfg: &Config, global: &GlobalOpts) -> Result<LinkConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, cfg, global);
    }

    // An explicitly requested profile that doesn't exist is an error even
    // when --bridge is given.
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(cfg),
        });
    }

    let url_str = global.bridge.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;

    let mut config = LinkConfig::new(pairlink_config::parse_bridge_url(url_str)?);
    config.admin_key = global.admin_key.clone().map(SecretString::from);
    config.tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
    Ok(config)
}

/// Translate a `Profile` + global flags into a `LinkConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<LinkConfig, CliError> {
    let mut config = pairlink_config::profile_to_link_config(profile, profile_name)?;

    // 1. Bridge URL (flag > env > profile)
    if let Some(ref url_str) = global.bridge {
        config.url = pairlink_config::parse_bridge_url(url_str)?;
    }

    // 2. Admin key (flag > profile chain)
    if let Some(ref key) = global.admin_key {
        config.admin_key = Some(SecretString::from(key.clone()));
    }

    // 3. TLS verification
    if global.insecure || (profile.insecure.is_none() && cfg.defaults.insecure) {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }

    // 4. Timeout (flag > profile > defaults)
    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(cfg.defaults.timeout);
    config.timeout = Duration::from_secs(timeout);

    Ok(config)
}

/// Comma-separated profile names for help text.
pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}
