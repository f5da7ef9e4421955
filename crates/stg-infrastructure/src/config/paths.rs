//! XDG base-directory resolution.
//!
//! Follows `${XDG_*:-fallback}/stg` with explicit environment overrides so
//! behaviour matches the documented contract on every platform.

use std::path::PathBuf;

/// Application directory name under the XDG bases.
pub const APP_DIR: &str = "stg";

fn base_dir(env_var: &str, home_fallback: &[&str]) -> PathBuf {
    if let Ok(base) = std::env::var(env_var)
        && !base.is_empty()
    {
        return PathBuf::from(base).join(APP_DIR);
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home_fallback
        .iter()
        .fold(home, |dir, part| dir.join(part))
        .join(APP_DIR)
}

/// `${XDG_CONFIG_HOME:-~/.config}/stg`
#[must_use]
pub fn config_dir() -> PathBuf {
    base_dir("XDG_CONFIG_HOME", &[".config"])
}

/// `${XDG_DATA_HOME:-~/.local/share}/stg`
#[must_use]
pub fn data_dir() -> PathBuf {
    base_dir("XDG_DATA_HOME", &[".local", "share"])
}

/// `${XDG_CACHE_HOME:-~/.cache}/stg`
#[must_use]
pub fn cache_dir() -> PathBuf {
    base_dir("XDG_CACHE_HOME", &[".cache"])
}

/// The TOML application config file.
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// The YAML cookie session registry.
#[must_use]
pub fn cookie_sessions_file() -> PathBuf {
    config_dir().join("cookie_sessions.yaml")
}

/// User prompt guide directory; overridable via configuration.
#[must_use]
pub fn prompts_dir() -> PathBuf {
    config_dir().join("prompts")
}
