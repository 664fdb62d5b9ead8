//! Layered configuration.
//!
//! `config.yml` declares every key and its type. Each key can then be
//! replaced, highest precedence first, by a `--key=value` (or bare `--key`)
//! command line argument, an upper-cased environment variable, or an entry in
//! `override.yml`. Replacement values take the YAML type of the declared
//! value, and strings such as `512m` expand to byte counts.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::{Datelike, Local};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use tracing::level_filters::LevelFilter;

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "config.yml";
pub const OVERRIDE_FILE: &str = "override.yml";
const CONFIG_DIR_KEY: &str = "config-dir";
const CONFIG_DIR_ENV: &str = "CONFIG_DIR";

/// Settings for one run, fixed at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "non_empty")]
    pub filename: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Maximum bytes requested per range GET.
    pub block_size: u64,
    pub ghcn_bucket: String,
    /// Key prefix of the yearly CSVs, e.g. `csv/by_year/`.
    pub ghcn_path: String,
    pub stations_key: String,
    pub start_year: i32,
    /// Exclusive. The current year + 1 when unset.
    #[serde(default)]
    pub last_year: Option<i32>,
    /// Minutes between passes.
    #[serde(default)]
    pub polling_interval: u64,
    #[serde(default)]
    pub run_forever: bool,
    #[serde(default = "default_object_endpoint")]
    pub object_endpoint: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub hsds_endpoint: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub hsds_username: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub hsds_password: Option<String>,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_object_endpoint() -> String {
    "https://s3.amazonaws.com".to_string()
}

fn non_empty<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(d)?;
    Ok(value.filter(|s| !s.is_empty()))
}

impl Config {
    pub fn last_year(&self) -> i32 {
        self.last_year.unwrap_or_else(|| Local::now().year() + 1)
    }

    /// The configured level, or `None` when the name is not recognised.
    pub fn log_level(&self) -> Option<LevelFilter> {
        match self.log_level.to_uppercase().as_str() {
            "DEBUG" => Some(LevelFilter::DEBUG),
            "INFO" => Some(LevelFilter::INFO),
            "WARN" | "WARNING" => Some(LevelFilter::WARN),
            "ERROR" => Some(LevelFilter::ERROR),
            _ => None,
        }
    }

    fn validate(self) -> Result<Self> {
        if self.block_size == 0 {
            return Err(Error::Config("block_size must be positive".to_string()));
        }
        Ok(self)
    }
}

/// `--key=value` and `--key` arguments, split from the ones `clap` handles.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Overrides {
    args: Vec<(String, Option<String>)>,
}

impl Overrides {
    /// Separates override arguments from the rest. `--help` and `--version`
    /// stay with the command line parser.
    pub fn split_args<I>(args: I) -> (Vec<String>, Overrides)
    where
        I: IntoIterator<Item = String>,
    {
        let mut rest = Vec::new();
        let mut overrides = Overrides::default();

        for arg in args {
            if !is_override(&arg) {
                rest.push(arg);
                continue;
            }
            match arg[2..].split_once('=') {
                Some((key, value)) => overrides
                    .args
                    .push((key.to_string(), Some(value.to_string()))),
                None => overrides.args.push((arg[2..].to_string(), None)),
            }
        }

        (rest, overrides)
    }

    /// `Some(None)` for a bare flag. The first occurrence wins.
    fn get(&self, key: &str) -> Option<Option<&str>> {
        self.args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }
}

fn is_override(arg: &str) -> bool {
    match arg.strip_prefix("--") {
        Some(name) => !name.is_empty() && name != "help" && name != "version",
        None => false,
    }
}

/// Loads the configuration from the default search path.
pub fn load(overrides: &Overrides) -> Result<Config> {
    load_from(&config_dirs(overrides), overrides, |key| env::var(key).ok())
}

/// Directories searched for `config.yml`; later ones win.
pub fn config_dirs(overrides: &Overrides) -> Vec<PathBuf> {
    if let Some(Some(dir)) = overrides.get(CONFIG_DIR_KEY) {
        return vec![PathBuf::from(dir)];
    }
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        return vec![PathBuf::from(dir)];
    }

    let mut dirs = vec![PathBuf::from("/config")];
    if let Some(dir) = dirs::config_dir() {
        dirs.push(dir.join("ghcn"));
    }
    dirs.push(PathBuf::from("."));
    dirs
}

pub fn load_from<E>(dirs: &[PathBuf], overrides: &Overrides, env: E) -> Result<Config>
where
    E: Fn(&str) -> Option<String>,
{
    let mut config_file = None;
    let mut override_file = None;
    for dir in dirs {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            config_file = Some(path);
        }
        let path = dir.join(OVERRIDE_FILE);
        if path.is_file() {
            override_file = Some(path);
        }
    }

    let config_file = config_file.ok_or_else(|| Error::ConfigNotFound {
        dirs: dirs.to_vec(),
    })?;
    let base = read_mapping(&config_file)?;
    let file_overrides = match override_file {
        Some(path) => read_mapping(&path)?,
        None => Mapping::new(),
    };

    let merged = merge(base, overrides, &file_overrides, env);
    let config: Config = serde_yaml::from_value(Value::Mapping(merged))
        .map_err(|e| Error::Config(format!("{}: {}", config_file.display(), e)))?;

    config.validate()
}

fn read_mapping(path: &Path) -> Result<Mapping> {
    let raw = fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&raw).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        _ => Err(Error::Config(format!(
            "{}: expected a mapping of keys",
            path.display()
        ))),
    }
}

fn merge<E>(base: Mapping, overrides: &Overrides, file_overrides: &Mapping, env: E) -> Mapping
where
    E: Fn(&str) -> Option<String>,
{
    let mut merged = Mapping::new();

    for (key, value) in base {
        let Some(name) = key.as_str() else {
            merged.insert(key, value);
            continue;
        };

        let replacement = match overrides.get(name) {
            Some(None) => Some(Value::Bool(true)),
            Some(Some(raw)) => Some(coerce(&value, raw)),
            None => match env(&name.to_uppercase()) {
                Some(raw) => Some(coerce(&value, &raw)),
                None => file_overrides.get(name).map(|v| match v {
                    Value::String(s) => coerce(&value, s),
                    other => other.clone(),
                }),
            },
        };

        let value = expand_units(replacement.unwrap_or(value));
        merged.insert(key, value);
    }

    merged
}

/// Converts `raw` to the YAML type of `declared`. Values that don't convert
/// stay strings.
fn coerce(declared: &Value, raw: &str) -> Value {
    match declared {
        Value::Bool(_) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" | "" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        Value::Number(n) if n.is_f64() => raw
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Value::Number(_) => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Value::Null => serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        _ => Value::String(raw.to_string()),
    }
}

fn expand_units(value: Value) -> Value {
    match &value {
        Value::String(s) => parse_units(s).map(Value::from).unwrap_or(value),
        _ => value,
    }
}

/// `512k`, `10m`, `1g` in powers of 1024.
fn parse_units(s: &str) -> Option<u64> {
    let multiplier: u64 = match s.chars().last()? {
        'k' => 1024,
        'm' => 1024 * 1024,
        'g' => 1024 * 1024 * 1024,
        _ => return None,
    };
    let digits = &s[..s.len() - 1];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}

// -- Tests -------------------------------------------------------------------
