//! Handlers for the `config` subcommands.
//!
//! The handlers are generic over [`ConfigManager`] and work on the TOML
//! document directly for `get`/`set`, so keys can be addressed with dots
//! (`afip.environment`, `printer.paper_width_mm`).

use std::path::PathBuf;

use arca_core::{ArcaConfig, ConfigManager, Error, Result};

use crate::cli::ConfigAction;

// ============================================================================
// Dispatch
// ============================================================================

/// Runs a config subcommand against [`ArcaConfig`].
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path::<ArcaConfig>(config_path),
        ConfigAction::Get { key } => {
            println!("{}", cmd_config_get::<ArcaConfig>(config_path, &key)?);
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let path = cmd_config_set::<ArcaConfig>(config_path, &key, &value)?;
            println!("Set {key} = {value} in {}", path.display());
            Ok(())
        }
        ConfigAction::Init { file, force } => {
            let path = cmd_config_init::<ArcaConfig>(file.as_deref(), force)?;
            println!("Config file created at {}", path.display());
            Ok(())
        }
        ConfigAction::Export { docker_env } => {
            let config = ArcaConfig::load(config_path)?;
            for line in cmd_config_export(&config, docker_env)? {
                println!("{line}");
            }
            Ok(())
        }
        ConfigAction::Check => {
            let config = ArcaConfig::load(config_path)?;
            cmd_config_check(&config)
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Prints the resolved config path, with a hint when the file is missing.
pub fn cmd_config_path<C: ConfigManager>(config_path: Option<&str>) -> Result<()> {
    let path = C::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory for this platform"))?;
    println!("{}", path.display());
    if !path.exists() {
        eprintln!(
            "(file does not exist, run `arca config init` to create it for {})",
            C::project_name()
        );
    }
    Ok(())
}

/// Value at a dotted key, formatted for display.
pub fn cmd_config_get<C: ConfigManager>(config_path: Option<&str>, key: &str) -> Result<String> {
    let config = C::load(config_path)?;
    let value = toml::Value::try_from(&config).map_err(|e| Error::config(e.to_string()))?;
    get_nested_value(&value, key)
        .map(format_toml_value)
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))
}

/// Sets a dotted key in the config file and returns the file path.
///
/// Keys that hold strings keep the value as a string, so a CUIT is not
/// turned into an integer. A value that only loads as a string is stored
/// as one. The edited document must still load as a valid configuration;
/// nothing is written otherwise.
pub fn cmd_config_set<C: ConfigManager>(
    config_path: Option<&str>,
    key: &str,
    value: &str,
) -> Result<PathBuf> {
    let path = C::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory"))?;
    if !path.exists() {
        return Err(Error::config(format!(
            "Config file does not exist at {}. Run `arca config init` first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
    let mut doc: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;

    let defaults = toml::Value::try_from(C::default()).map_err(|e| Error::config(e.to_string()))?;
    let is_string = matches!(
        get_nested_value(&doc, key).or_else(|| get_nested_value(&defaults, key)),
        Some(toml::Value::String(_))
    );
    let new_value = if is_string {
        toml::Value::String(value.to_string())
    } else {
        parse_value(value)
    };

    set_nested_value(&mut doc, key, new_value)?;
    if let Err(e) = doc.clone().try_into::<C>() {
        // Optional string keys have no default to tell their type; `123`
        // may still be meant as text.
        if is_string {
            return Err(Error::config(format!("{key} = {value} is not valid: {e}")));
        }
        set_nested_value(&mut doc, key, toml::Value::String(value.to_string()))?;
        doc.clone()
            .try_into::<C>()
            .map_err(|_| Error::config(format!("{key} = {value} is not valid: {e}")))?;
    }

    let toml_str = toml::to_string_pretty(&doc).map_err(|e| Error::config(e.to_string()))?;
    std::fs::write(&path, toml_str).map_err(|e| Error::io_with_path(e, &path))?;
    Ok(path)
}

/// Writes a default config file and returns its path.
pub fn cmd_config_init<C: ConfigManager>(file: Option<&str>, force: bool) -> Result<PathBuf> {
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

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = C::default().to_toml_string()?;
    std::fs::write(&path, toml_str).map_err(|e| Error::io_with_path(e, &path))?;
    Ok(path)
}

/// Environment variable lines for the configuration.
pub fn cmd_config_export<C: ConfigManager>(config: &C, docker_env: bool) -> Result<Vec<String>> {
    Ok(config
        .to_env_vars()?
        .into_iter()
        .map(|(key, value)| {
            if docker_env {
                format!("--env {key}={value}")
            } else {
                format!("{key}={value}")
            }
        })
        .collect())
}

/// Prints every configuration problem; fails when there is at least one.
pub fn cmd_config_check(config: &ArcaConfig) -> Result<()> {
    let problems = config.validate();
    if problems.is_empty() {
        println!("Configuration OK ({})", config.afip.environment);
        return Ok(());
    }
    for problem in &problems {
        eprintln!("  - {problem}");
    }
    Err(Error::config(format!(
        "{} configuration problem(s) found",
        problems.len()
    )))
}

// ============================================================================
// TOML dotted-key helpers
// ============================================================================

/// Follows a dotted key through nested tables.
pub fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(value, |current, part| current.as_table()?.get(part))
}

/// Sets a value at a dotted key, creating intermediate tables.
pub fn set_nested_value(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((last, parents)) = parts.split_last() else {
        return Err(Error::config("Empty key path"));
    };
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::config(format!("Invalid key '{key}'")));
    }

    let mut current = root;
    for part in parents {
        let table = current
            .as_table_mut()
            .ok_or_else(|| Error::config("Cannot navigate into a non-table value"))?;
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    current
        .as_table_mut()
        .ok_or_else(|| Error::config("Cannot set key on a non-table value"))?
        .insert(last.to_string(), value);
    Ok(())
}

/// Parses a command-line value: bool, then integer, then float, then string.
///
/// Digit strings with a leading zero stay strings so CUITs and document
/// numbers keep their form.
pub fn parse_value(s: &str) -> toml::Value {
    match s {
        "true" => return toml::Value::Boolean(true),
        "false" => return toml::Value::Boolean(false),
        _ => {}
    }
    let leading_zero = s.len() > 1 && s.starts_with('0') && !s.starts_with("0.");
    if !leading_zero {
        if let Ok(i) = s.parse::<i64>() {
            return toml::Value::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return toml::Value::Float(f);
        }
    }
    toml::Value::String(s.to_string())
}

/// Formats a TOML value for stdout.
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write_default(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, ArcaConfig::default().to_toml_string().unwrap()).unwrap();
        path.to_str().unwrap().to_string()
    }

    // ------------------------------------------------------------------------
    // get / set
    // ------------------------------------------------------------------------

    #[test]
    fn test_cmd_config_get_nested_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_default(&dir);

        let value = cmd_config_get::<ArcaConfig>(Some(&path), "printer.paper_width_mm").unwrap();
        assert_eq!(value, "80");
    }

    #[test]
    fn test_cmd_config_get_missing_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_default(&dir);

        let err = cmd_config_get::<ArcaConfig>(Some(&path), "issuer.nope").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_cmd_config_set_then_get() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_default(&dir);

        cmd_config_set::<ArcaConfig>(Some(&path), "issuer.point_of_sale", "9").unwrap();
        cmd_config_set::<ArcaConfig>(Some(&path), "printer.target", "tcp://10.0.0.5").unwrap();
        cmd_config_set::<ArcaConfig>(Some(&path), "issuer.cuit", "20291687297").unwrap();

        let config = ArcaConfig::from_file(std::path::Path::new(&path)).unwrap();
        assert_eq!(config.issuer.point_of_sale, 9);
        assert_eq!(config.printer.target.as_deref(), Some("tcp://10.0.0.5"));
        assert_eq!(config.issuer.cuit, "20291687297");
    }

    #[test]
    fn test_cmd_config_set_numeric_text_for_optional_string() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_default(&dir);

        cmd_config_set::<ArcaConfig>(Some(&path), "printer.name", "2030").unwrap();

        let config = ArcaConfig::from_file(std::path::Path::new(&path)).unwrap();
        assert_eq!(config.printer.name.as_deref(), Some("2030"));
        assert_eq!(
            cmd_config_get::<ArcaConfig>(Some(&path), "printer.name").unwrap(),
            "2030"
        );
    }

    #[test]
    fn test_cmd_config_set_rejects_wrong_type() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_default(&dir);
        let before = std::fs::read_to_string(&path).unwrap();

        let err =
            cmd_config_set::<ArcaConfig>(Some(&path), "printer.paper_width_mm", "wide").unwrap_err();
        assert!(err.to_string().contains("not valid"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_cmd_config_set_missing_file() {
        let err = cmd_config_set::<ArcaConfig>(Some("/nonexistent/config.toml"), "issuer.cuit", "1")
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    // ------------------------------------------------------------------------
    // init / export / check
    // ------------------------------------------------------------------------

    #[test]
    fn test_cmd_config_init_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("arca-pos").join("config.toml");

        let written = cmd_config_init::<ArcaConfig>(Some(path.to_str().unwrap()), false).unwrap();
        assert_eq!(written, path);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[issuer]"));
        assert!(content.contains("[afip]"));
        assert!(content.contains("environment = \"homologation\""));
    }

    #[test]
    fn test_cmd_config_init_no_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "existing").unwrap();

        let err = cmd_config_init::<ArcaConfig>(Some(path.to_str().unwrap()), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        cmd_config_init::<ArcaConfig>(Some(path.to_str().unwrap()), true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[printer]"));
    }

    #[test]
    fn test_cmd_config_export() {
        let mut config = ArcaConfig::default();
        config.issuer.cuit = "20291687297".into();

        let lines = cmd_config_export(&config, false).unwrap();
        assert!(lines.contains(&"ARCA_CUIT=20291687297".to_string()));

        let docker = cmd_config_export(&config, true).unwrap();
        assert!(docker.iter().all(|l| l.starts_with("--env ARCA_")));
    }

    #[test]
    fn test_cmd_config_check_reports_problems() {
        let err = cmd_config_check(&ArcaConfig::default()).unwrap_err();
        assert!(err.to_string().contains("problem"));
    }

    // ------------------------------------------------------------------------
    // dotted-key helpers
    // ------------------------------------------------------------------------

    #[test]
    fn test_get_nested_value() {
        let val: toml::Value = toml::from_str("[afip]\ntimeout_secs = 60").unwrap();
        assert_eq!(
            get_nested_value(&val, "afip.timeout_secs"),
            Some(&toml::Value::Integer(60))
        );
        assert!(get_nested_value(&val, "afip.timeout_secs.x").is_none());
        assert!(get_nested_value(&val, "printer").is_none());
    }

    #[test]
    fn test_set_nested_value_creates_tables() {
        let mut val = toml::Value::Table(toml::map::Map::new());
        set_nested_value(&mut val, "printer.name", toml::Value::String("TM-T20".into())).unwrap();
        assert_eq!(
            get_nested_value(&val, "printer.name"),
            Some(&toml::Value::String("TM-T20".into()))
        );
    }

    #[test]
    fn test_set_nested_value_errors() {
        let mut val: toml::Value = toml::from_str("x = 1").unwrap();
        assert!(set_nested_value(&mut val, "x.y", toml::Value::Integer(2)).is_err());
        assert!(set_nested_value(&mut val, "a..b", toml::Value::Integer(2)).is_err());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), toml::Value::Boolean(true));
        assert_eq!(parse_value("9"), toml::Value::Integer(9));
        assert_eq!(parse_value("0.5"), toml::Value::Float(0.5));
        assert_eq!(parse_value("0009"), toml::Value::String("0009".into()));
        assert_eq!(parse_value("production"), toml::Value::String("production".into()));
    }

    #[test]
    fn test_format_toml_value() {
        assert_eq!(format_toml_value(&toml::Value::String("x".into())), "x");
        assert_eq!(format_toml_value(&toml::Value::Boolean(false)), "false");
    }
}
