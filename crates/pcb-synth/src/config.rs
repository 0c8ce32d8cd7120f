use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

pub const DEFAULT_MAIN_BOARD: &str = "MAIN";

/// Netlist synthesis options, as read from TOML:
///
/// ```toml
/// main_board = "MAIN"
/// split_by_board = true
/// strict = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthConfig {
    /// Reference of the main board.
    pub main_board: String,
    /// Split connected pins into one net per board.
    pub split_by_board: bool,
    /// Fail instead of warning when connected pins belong to no bus.
    pub strict: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            main_board: DEFAULT_MAIN_BOARD.to_owned(),
            split_by_board: true,
            strict: false,
        }
    }
}

impl SynthConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SynthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = SynthConfig::from_toml_str("strict = true").unwrap();
        assert_eq!(
            config,
            SynthConfig {
                strict: true,
                ..SynthConfig::default()
            }
        );
        assert_eq!(SynthConfig::from_toml_str("").unwrap(), SynthConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = SynthConfig::from_toml_str("main_bord = \"X\"").unwrap_err();
        assert!(matches!(err, SynthError::Config(_)));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.toml");
        std::fs::write(&path, "main_board = \"CTRL\"\nsplit_by_board = false\n").unwrap();
        let config = SynthConfig::load(&path).unwrap();
        assert_eq!(config.main_board, "CTRL");
        assert!(!config.split_by_board);

        let err = SynthConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SynthError::Io { .. }));
    }
}
