use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use cross_xdg::BaseDirs;

use crate::tape::DEFAULT_TAPE_SIZE;

/// Engine limits after resolving flags, environment, and the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub tape_size: usize,
    pub max_steps: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tape_size: DEFAULT_TAPE_SIZE,
            max_steps: None,
            timeout_ms: None,
        }
    }
}

/// Values that may be set in one layer (flags, env, or file).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub tape_size: Option<usize>,
    pub max_steps: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl Overrides {
    /// Read `BF_TAPE_SIZE`, `BF_MAX_STEPS` and `BF_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self {
            tape_size: env_parse("BF_TAPE_SIZE"),
            max_steps: env_parse("BF_MAX_STEPS"),
            timeout_ms: env_parse("BF_TIMEOUT_MS"),
        }
    }

    /// `$XDG_CONFIG_HOME/bfvm.toml`, or nothing if it is missing or unreadable.
    pub fn from_config_file() -> Self {
        config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .map(|content| parse_config(&content))
            .unwrap_or_default()
    }
}

impl Settings {
    /// Resolve limits: flags -> env -> config file -> defaults.
    pub fn resolve(flags: Overrides) -> Self {
        Self::layered(flags, Overrides::from_env(), Overrides::from_config_file())
    }

    pub fn layered(flags: Overrides, env: Overrides, file: Overrides) -> Self {
        let defaults = Settings::default();
        Self {
            tape_size: flags
                .tape_size
                .or(env.tape_size)
                .or(file.tape_size)
                .unwrap_or(defaults.tape_size),
            max_steps: flags.max_steps.or(env.max_steps).or(file.max_steps),
            timeout_ms: flags.timeout_ms.or(env.timeout_ms).or(file.timeout_ms),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn config_path() -> Option<PathBuf> {
    // On Linux: resolves to /home/<user>/.config
    // On Windows: resolves to C:\Users\<user>\.config
    // On macOS: resolves to /Users/<user>/.config
    let base_dirs = BaseDirs::new().ok()?;
    let mut path = PathBuf::from(base_dirs.config_home());
    path.push("bfvm.toml");
    Some(path)
}

/// Very small hand-rolled parser: look for the [engine] section and
/// `key = value` pairs. Unknown keys and unparsable values are ignored.
pub fn parse_config(content: &str) -> Overrides {
    let mut in_engine = false;
    let mut map: HashMap<String, String> = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            in_engine = line[1..line.len() - 1].trim() == "engine";
            continue;
        }
        if !in_engine {
            continue;
        }
        if let Some((key, val_raw)) = line.split_once('=') {
            let val_raw = val_raw.trim();
            // Accept quoted or unquoted, and TOML digit separators
            let val = val_raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(val_raw)
                .replace('_', "");
            map.insert(key.trim().to_string(), val);
        }
    }

    Overrides {
        tape_size: map.get("tape_size").and_then(|v| v.parse().ok()),
        max_steps: map.get("max_steps").and_then(|v| v.parse().ok()),
        timeout_ms: map.get("timeout_ms").and_then(|v| v.parse().ok()),
    }
}
