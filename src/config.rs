//! Keymap configuration.
//!
//! The configuration is a strict JSON object: `map` remaps the base layer,
//! `layers` maps a modifier key name to that layer's remap table, and
//! `keyboardNames` lists the device-reported names to grab. Anything else is
//! rejected.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    /// Base-layer remap, source key name to destination key name.
    #[serde(default)]
    pub map: HashMap<String, String>,

    /// Per-layer remaps, keyed by the modifier key name that activates them.
    #[serde(default)]
    pub layers: HashMap<String, HashMap<String, String>>,

    /// Device-reported names of the keyboards to grab.
    #[serde(default)]
    pub keyboard_names: Vec<String>,
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text).map_err(|err| Error::Config(err.to_string()))?;

        if config.keyboard_names.is_empty() {
            return Err(Error::Config("got empty set of keyboards".to_owned()));
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[track_caller]
    fn check(text: &str, expected: Config) {
        let parsed = Config::parse(text).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn parse() {
        check(
            r#"
            {
                "map": { "A": "B" },
                "layers": {
                    "CAPSLOCK": { "H": "LEFT", "L": "RIGHT" }
                },
                "keyboardNames": ["AT Translated Set 2 keyboard"]
            }
            "#,
            Config {
                map: HashMap::from([("A".to_owned(), "B".to_owned())]),
                layers: HashMap::from([(
                    "CAPSLOCK".to_owned(),
                    HashMap::from([
                        ("H".to_owned(), "LEFT".to_owned()),
                        ("L".to_owned(), "RIGHT".to_owned()),
                    ]),
                )]),
                keyboard_names: vec!["AT Translated Set 2 keyboard".to_owned()],
            },
        );
    }

    #[test]
    fn map_and_layers_default_to_empty() {
        check(
            r#"{ "keyboardNames": ["kb"] }"#,
            Config {
                map: HashMap::new(),
                layers: HashMap::new(),
                keyboard_names: vec!["kb".to_owned()],
            },
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse(r#"{ "keyboardNames": ["kb"], "extra": 1 }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_keyboard_names_are_rejected() {
        for text in [r#"{}"#, r#"{ "keyboardNames": [] }"#] {
            let err = Config::parse(text).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{text}");
        }
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = Config::parse("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "keyboardNames": ["kb"] }}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.keyboard_names, vec!["kb".to_owned()]);

        assert!(Config::load(Path::new("/no/such/file.json")).is_err());
    }
}
