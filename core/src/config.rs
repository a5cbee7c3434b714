use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::environment::RECURSION_LIMIT;
use crate::error::{Error, Result};

/// Schema version stamped on exported AST tables
pub const AST_VERSION: &str = "1";

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum lexical scope depth before a recursion error
    pub recursion_limit: usize,
    /// Version string written into exported tables
    pub version: String,
    /// Extra operator words for the global lexicon, alias to tag name
    /// (`{"plus": "ADD"}`)
    pub operators: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            recursion_limit: RECURSION_LIMIT,
            version: AST_VERSION.to_string(),
            operators: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}
