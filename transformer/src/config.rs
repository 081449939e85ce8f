//! Run configuration.
//!
//! Options come from three places, highest precedence first:
//! command-line flags, `STARLOAD_*` environment variables (a `.env` file is
//! loaded by the binary), built-in defaults.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `STARLOAD_OUTPUT_DIR` | output directory |
//! | `STARLOAD_MODEL` | model JSON file (built-in EV charger model when unset) |
//! | `STARLOAD_DELIMITER` | input delimiter (`,` `;` `|` or `tab`) |
//! | `STARLOAD_STRICT` | reject undeclared input columns (`1`/`true`) |

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::ModelResult;
use crate::schema::{ev_charger_model, StarModel};
use crate::transform::pipeline::TransformOptions;

pub const ENV_OUTPUT_DIR: &str = "STARLOAD_OUTPUT_DIR";
pub const ENV_MODEL: &str = "STARLOAD_MODEL";
pub const ENV_DELIMITER: &str = "STARLOAD_DELIMITER";
pub const ENV_STRICT: &str = "STARLOAD_STRICT";

/// Settings read from the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub output_dir: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub delimiter: Option<char>,
    pub strict: Option<bool>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of the process env).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let delimiter = get(ENV_DELIMITER).and_then(|raw| match parse_delimiter(&raw) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(variable = ENV_DELIMITER, value = %raw, "{}", e);
                None
            }
        });

        Self {
            output_dir: get(ENV_OUTPUT_DIR).map(PathBuf::from),
            model: get(ENV_MODEL).map(PathBuf::from),
            delimiter,
            strict: get(ENV_STRICT).map(|v| parse_flag(&v)),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub delimiter: Option<char>,
    pub strict: bool,
    pub no_manifest: bool,
}

/// Merge command line, environment and defaults.
pub fn resolve_options(cli: &CliOverrides, env: &EnvConfig) -> TransformOptions {
    let defaults = TransformOptions::default();
    TransformOptions {
        output_dir: cli
            .output_dir
            .clone()
            .or_else(|| env.output_dir.clone())
            .unwrap_or(defaults.output_dir),
        delimiter: cli.delimiter.or(env.delimiter),
        strict_columns: cli.strict || env.strict.unwrap_or(defaults.strict_columns),
        write_manifest: !cli.no_manifest && defaults.write_manifest,
    }
}

/// Model file chosen on the command line or in the environment.
pub fn resolve_model_path(cli: &CliOverrides, env: &EnvConfig) -> Option<PathBuf> {
    cli.model.clone().or_else(|| env.model.clone())
}

/// Load a model file, or the built-in EV charger model.
pub fn load_model(path: Option<&Path>) -> ModelResult<StarModel> {
    match path {
        Some(p) => StarModel::from_file(p),
        None => Ok(ev_charger_model()),
    }
}

/// Parse a delimiter given as a single character or a name.
pub fn parse_delimiter(raw: &str) -> Result<char, String> {
    match raw {
        "\\t" | "tab" | "TAB" | "\t" => return Ok('\t'),
        "comma" => return Ok(','),
        "semicolon" => return Ok(';'),
        "pipe" => return Ok('|'),
        _ => {}
    }

    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        _ => Err(format!("invalid delimiter '{}': expected one ASCII character", raw)),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> EnvConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_env_parsing() {
        let cfg = env(&[
            (ENV_OUTPUT_DIR, "/tmp/out"),
            (ENV_DELIMITER, "tab"),
            (ENV_STRICT, "TRUE"),
            (ENV_MODEL, "  "),
        ]);
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cfg.delimiter, Some('\t'));
        assert_eq!(cfg.strict, Some(true));
        assert_eq!(cfg.model, None);
    }

    #[test]
    fn test_bad_env_delimiter_is_ignored() {
        let cfg = env(&[(ENV_DELIMITER, ";;")]);
        assert_eq!(cfg.delimiter, None);
    }

    #[test]
    fn test_cli_beats_env_beats_default() {
        let env_cfg = env(&[(ENV_OUTPUT_DIR, "env_out"), (ENV_DELIMITER, ";")]);

        let opts = resolve_options(&CliOverrides::default(), &env_cfg);
        assert_eq!(opts.output_dir, PathBuf::from("env_out"));
        assert_eq!(opts.delimiter, Some(';'));

        let cli = CliOverrides {
            output_dir: Some("cli_out".into()),
            delimiter: Some('|'),
            no_manifest: true,
            ..CliOverrides::default()
        };
        let opts = resolve_options(&cli, &env_cfg);
        assert_eq!(opts.output_dir, PathBuf::from("cli_out"));
        assert_eq!(opts.delimiter, Some('|'));
        assert!(!opts.write_manifest);

        let opts = resolve_options(&CliOverrides::default(), &EnvConfig::default());
        assert_eq!(opts, TransformOptions::default());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(","), Ok(','));
        assert_eq!(parse_delimiter("\\t"), Ok('\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(';'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("§").is_err());
    }

    #[test]
    fn test_load_model_defaults_to_builtin() {
        let model = load_model(None).unwrap();
        assert_eq!(model.name, "ev_chargers");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, model.to_json().unwrap()).unwrap();
        assert_eq!(load_model(Some(&path)).unwrap(), model);

        assert!(load_model(Some(&dir.path().join("missing.json"))).is_err());
    }
}
