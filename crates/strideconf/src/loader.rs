//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, StrideConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/stride/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("stride/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("stride.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from discovered files plus environment overlay.
pub fn load(cli_path: Option<&Path>) -> Result<(StrideConfig, ConfigSources), ConfigError> {
    let files = discover_config_files_with_override(cli_path);

    let mut merged = toml::Table::new();
    for path in &files {
        let table = read_table(path)?;
        merge_tables(&mut merged, table);
    }

    let mut config: StrideConfig =
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: files.last().cloned().unwrap_or_default(),
                message: e.to_string(),
            })?;

    let env_overrides = apply_env_overrides(&mut config);

    Ok((
        config,
        ConfigSources {
            files,
            env_overrides,
        },
    ))
}

/// Load config from a single TOML file, no discovery or env overlay.
pub fn load_from_file(path: &Path) -> Result<StrideConfig, ConfigError> {
    let table = read_table(path)?;
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base`, key by key. Tables merge recursively,
/// everything else is replaced (later file wins).
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply `STRIDE_*` environment variables on top of the loaded config.
///
/// Returns the names of the variables that were applied.
fn apply_env_overrides(config: &mut StrideConfig) -> Vec<String> {
    let mut applied = Vec::new();

    if let Ok(v) = env::var("STRIDE_LOG_LEVEL") {
        config.telemetry.log_level = v;
        applied.push("STRIDE_LOG_LEVEL".to_string());
    }

    if let Ok(v) = env::var("STRIDE_TICK_INTERVAL_MS") {
        if let Ok(ms) = v.parse::<u64>() {
            config.session.tick_interval_ms = ms;
            applied.push("STRIDE_TICK_INTERVAL_MS".to_string());
        }
    }

    if let Ok(v) = env::var("STRIDE_UPDATE_BUFFER") {
        if let Ok(n) = v.parse::<usize>() {
            config.session.update_buffer = n;
            applied.push("STRIDE_UPDATE_BUFFER".to_string());
        }
    }

    applied
}
