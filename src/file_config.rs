//! Configuration file loading for CLI defaults.
//!
//! The file uses one `key = value` pair per line with `#` comments; strings
//! are double-quoted. Values apply only where the command line set nothing.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// File configuration for `http-exchange` defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default cookie policy name.
    pub cookie_policy: Option<String>,
    /// Default redirect bound.
    pub max_redirects: Option<u32>,
    /// Whether redirects are followed.
    pub follow_redirects: Option<bool>,
    /// Proxy URL every request is routed through.
    pub proxy: Option<String>,
    /// Netscape `cookies.txt` loaded before the exchange.
    pub cookies_file: Option<PathBuf>,
    /// Transport connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Transport request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// User-Agent override.
    pub user_agent: Option<String>,
}

impl FileConfig {
    /// Validates config values against CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.max_redirects
            && max > 1000
        {
            bail!("Invalid config value for `max_redirects`: {max}. Expected range: 0..=1000");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/http-exchange/config.toml`
/// 2. `$HOME/.config/http-exchange/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("http-exchange")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("http-exchange")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the explicit config file, or the default one if it exists.
///
/// An explicit path must exist; a missing default file is not an error.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

pub(crate) fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_number = line_index + 1;

        match key {
            "cookie_policy" => {
                cfg.cookie_policy = Some(parse_string_literal(value).with_context(|| {
                    format!("Invalid `cookie_policy` value on line {line_number}")
                })?);
            }
            "max_redirects" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `max_redirects` value on line {line_number}")
                })?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_redirects out of range for u32"))?;
                cfg.max_redirects = Some(n);
            }
            "follow_redirects" => {
                cfg.follow_redirects = Some(parse_boolean(value).with_context(|| {
                    format!("Invalid `follow_redirects` value on line {line_number}")
                })?);
            }
            "proxy" => {
                cfg.proxy = Some(parse_string_literal(value).with_context(|| {
                    format!("Invalid `proxy` value on line {line_number}")
                })?);
            }
            "cookies_file" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `cookies_file` value on line {line_number}")
                })?;
                cfg.cookies_file = Some(PathBuf::from(parsed));
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_number}")
                })?);
            }
            "request_timeout_secs" => {
                cfg.request_timeout_secs = Some(parse_integer_u64(value).with_context(|| {
                    format!("Invalid `request_timeout_secs` value on line {line_number}")
                })?);
            }
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(|| {
                    format!("Invalid `user_agent` value on line {line_number}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
