//! Plugin name resolution: built-in table first, then `.clap` bundle on disk.
//!
//! Mirrors the trait-based loader abstraction a real-time sibling host
//! uses for testability, adapted to spec.md §4.6's `addFromArgumentString`
//! contract: each entry in the delimited plugin-name list either matches
//! a built-in or is treated as a path to load.

use std::path::PathBuf;

use super::clap_host::ClapHostPlugin;
use super::internal::InternalPlugin;
use super::Plugin;
use crate::error::EngineError;
use crate::settings::AudioSettings;

/// A parsed plugin-chain entry: either a built-in name (with optional
/// `key=value` parameters) or a filesystem path to a `.clap` bundle.
#[derive(Debug, Clone)]
pub enum PluginSpec {
    PassThrough,
    Gain { gain: f32 },
    TestSynth,
    ClapPath(PathBuf),
}

impl PluginSpec {
    /// Parses one entry from a delimited plugin-name list, e.g.
    /// `"again(gain=1.0)"`, `"passthrough"`, or a `.clap` file path.
    pub fn parse(entry: &str) -> Result<Self, EngineError> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(EngineError::InvalidPluginChain(
                "empty plugin name".to_string(),
            ));
        }

        let (name, args) = match entry.split_once('(') {
            Some((name, rest)) => {
                let args = rest.strip_suffix(')').ok_or_else(|| {
                    EngineError::InvalidPluginChain(format!(
                        "unbalanced parentheses in plugin spec '{entry}'"
                    ))
                })?;
                (name.trim(), args)
            }
            None => (entry, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "passthrough" => Ok(PluginSpec::PassThrough),
            "again" | "gain" => {
                let gain = parse_named_float(args, "gain").unwrap_or(1.0);
                Ok(PluginSpec::Gain { gain })
            }
            "testsynth" | "someinstrument" => Ok(PluginSpec::TestSynth),
            _ => Ok(PluginSpec::ClapPath(PathBuf::from(name))),
        }
    }

    fn display_name(&self) -> String {
        match self {
            PluginSpec::PassThrough => "passthrough".to_string(),
            PluginSpec::Gain { gain } => format!("again(gain={gain})"),
            PluginSpec::TestSynth => "testsynth".to_string(),
            PluginSpec::ClapPath(path) => path.display().to_string(),
        }
    }
}

fn parse_named_float(args: &str, key: &str) -> Option<f32> {
    args.split(',').find_map(|kv| {
        let (k, v) = kv.split_once('=')?;
        if k.trim().eq_ignore_ascii_case(key) {
            v.trim().parse::<f32>().ok()
        } else {
            None
        }
    })
}

/// Loads and constructs a [`Plugin`] for one parsed spec. The plugin's
/// `mark_opened`/`initialize` lifecycle steps are still the caller's
/// responsibility (per spec.md §4.5: opened then initialized are
/// distinct transitions).
pub fn resolve_plugin_spec(
    spec: &PluginSpec,
    _settings: &AudioSettings,
) -> Result<Plugin, EngineError> {
    let name = spec.display_name();
    match spec {
        PluginSpec::PassThrough => Ok(Plugin::new_internal(name, InternalPlugin::passthrough())),
        PluginSpec::Gain { gain } => Ok(Plugin::new_internal(name, InternalPlugin::gain(*gain))),
        PluginSpec::TestSynth => Ok(Plugin::new_internal(name, InternalPlugin::test_synth())),
        PluginSpec::ClapPath(path) => {
            if !path.exists() {
                return Err(EngineError::InvalidPluginChain(format!(
                    "plugin '{}' is neither a built-in name nor an existing file",
                    path.display()
                )));
            }
            let clap_plugin = ClapHostPlugin::load(path)?;
            Ok(Plugin::new_clap(name, clap_plugin))
        }
    }
}

/// Parses a delimiter-separated plugin name list (spec.md §4.6), where the
/// delimiter is `,` or `;`.
pub fn parse_plugin_list(spec: &str) -> Result<Vec<PluginSpec>, EngineError> {
    spec.split([',', ';'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PluginSpec::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_builtin_names_case_insensitively() {
        assert!(matches!(
            PluginSpec::parse("PassThrough").unwrap(),
            PluginSpec::PassThrough
        ));
        assert!(matches!(
            PluginSpec::parse("TESTSYNTH").unwrap(),
            PluginSpec::TestSynth
        ));
    }

    #[test]
    fn parses_again_with_gain_argument() {
        let spec = PluginSpec::parse("again(gain=0.5)").unwrap();
        match spec {
            PluginSpec::Gain { gain } => assert_eq!(gain, 0.5),
            _ => panic!("expected Gain"),
        }
    }

    #[test]
    fn again_without_argument_defaults_to_unity_gain() {
        let spec = PluginSpec::parse("again").unwrap();
        match spec {
            PluginSpec::Gain { gain } => assert_eq!(gain, 1.0),
            _ => panic!("expected Gain"),
        }
    }

    #[test]
    fn unknown_name_is_treated_as_a_clap_path() {
        let spec = PluginSpec::parse("/some/bundle.clap").unwrap();
        assert!(matches!(spec, PluginSpec::ClapPath(_)));
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        assert!(PluginSpec::parse("again(gain=1.0").is_err());
    }

    #[test]
    fn parses_comma_and_semicolon_delimited_lists() {
        let list = parse_plugin_list("passthrough, again(gain=2.0); testsynth").unwrap();
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn resolving_a_missing_clap_path_fails() {
        let spec = PluginSpec::ClapPath(PathBuf::from("/nonexistent/bundle.clap"));
        let err = resolve_plugin_spec(&spec, &AudioSettings::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPluginChain(_)));
    }
}
