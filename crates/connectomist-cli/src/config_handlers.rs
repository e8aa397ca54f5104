//! Handler functions for the `config` subcommands.
//!
//! The handlers are generic over [`ConfigManager`] and write their output to
//! the given sink, stdout in the binary. Hints go to stderr.

use std::io::Write;
use std::path::PathBuf;

use connectomist_core::{ConfigManager, Error, Result, Settings};

use crate::cli::ConfigAction;

// ============================================================================
// Command dispatch
// ============================================================================

/// Runs a `config` subcommand against the Connectomist [`Settings`].
pub fn handle_config_command(
    config_path: Option<&str>,
    action: ConfigAction,
    out: &mut dyn Write,
) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path::<Settings>(config_path, out),
        ConfigAction::Get { key } => cmd_config_get::<Settings>(config_path, &key, out),
        ConfigAction::Set { key, value } => {
            cmd_config_set::<Settings>(config_path, &key, &value, out)
        }
        ConfigAction::Init { file, force } => {
            cmd_config_init::<Settings>(file.as_deref(), force, out)
        }
        ConfigAction::Export { docker_env } => {
            let settings = Settings::load(config_path)?;
            cmd_config_export(&settings, docker_env, out)
        }
    }
}

// ============================================================================
// Generic command handlers
// ============================================================================

/// Prints the resolved config file path.
pub fn cmd_config_path<C: ConfigManager>(
    config_path: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let path = C::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory for this platform"))?;
    writeln!(out, "{}", path.display())?;
    if !path.exists() {
        eprintln!(
            "(file does not exist, run `{} config init` to create it)",
            C::project_name()
        );
    }
    Ok(())
}

/// Prints a configuration value by dotted key.
pub fn cmd_config_get<C: ConfigManager>(
    config_path: Option<&str>,
    key: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let config = C::load(config_path)?;
    let value = toml::Value::try_from(&config).map_err(|e| Error::config(e.to_string()))?;
    let found = get_nested_value(&value, key)
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))?;
    writeln!(out, "{}", format_toml_value(found))?;
    Ok(())
}

/// Sets a configuration value by dotted key in the config file.
///
/// The updated file must still describe valid [`ConfigManager`] settings.
pub fn cmd_config_set<C: ConfigManager>(
    config_path: Option<&str>,
    key: &str,
    value: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let path = C::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory"))?;
    if !path.exists() {
        return Err(Error::config(format!(
            "Config file does not exist at {}. Run `{} config init` first.",
            path.display(),
            C::project_name()
        )));
    }

    let content = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
    let mut doc: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;
    set_nested_value(&mut doc, key, parse_value(value))?;

    let updated: C = doc
        .try_into()
        .map_err(|e| Error::config(format!("Invalid value for '{key}': {e}")))?;
    let toml_str = updated.to_toml_string()?;
    std::fs::write(&path, toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    tracing::debug!(key, path = %path.display(), "Configuration updated");
    writeln!(out, "Set {key} = {value} in {}", path.display())?;
    Ok(())
}

/// Writes a default configuration file.
pub fn cmd_config_init<C: ConfigManager>(
    file: Option<&str>,
    force: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => C::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = C::default().to_toml_string()?;
    std::fs::write(&path, toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    writeln!(out, "Config file created at {}", path.display())?;
    Ok(())
}

/// Prints the configuration as environment variables.
pub fn cmd_config_export<C: ConfigManager>(
    config: &C,
    docker_env: bool,
    out: &mut dyn Write,
) -> Result<()> {
    for (key, value) in config.to_env_vars()? {
        if docker_env {
            writeln!(out, "--env {key}={value}")?;
        } else {
            writeln!(out, "{key}={value}")?;
        }
    }
    Ok(())
}

// ============================================================================
// TOML dotted-key helpers
// ============================================================================

/// Navigates a dotted key path in a TOML value tree.
pub fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(value, |current, part| current.as_table()?.get(part))
}

/// Sets a value at a dotted key path, creating intermediate tables as needed.
pub fn set_nested_value(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let (parents, leaf) = match key.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, key),
    };
    if leaf.is_empty() {
        return Err(Error::config("Empty key path"));
    }

    let mut current = root;
    for part in parents.into_iter().flat_map(|p| p.split('.')) {
        current = current
            .as_table_mut()
            .ok_or_else(|| Error::config("Cannot navigate into a non-table value"))?
            .entry(part)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
    current
        .as_table_mut()
        .ok_or_else(|| Error::config("Cannot set key on a non-table value"))?
        .insert(leaf.to_string(), value);
    Ok(())
}

/// Parses a command-line value, trying bool, then integer, then float.
pub fn parse_value(s: &str) -> toml::Value {
    match s {
        "true" => return toml::Value::Boolean(true),
        "false" => return toml::Value::Boolean(false),
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(s.to_string())
}

/// Formats a TOML value for display.
pub fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            toml::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
