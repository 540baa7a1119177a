//! TOML-backed configuration.
//!
//! Every field has a default, so a missing config file yields a
//! working setup; CLI flags override file values in `main`.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmConfig;

/// Similarity floor for fuzzy delivery-area and item matching.
/// Carried unchanged across bot revisions; no tuning data behind it.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

/// Errors from configuration loading.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(comanda::config::read),
        help("Pass --config with an existing file, or omit it to use defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file \"{path}\": {message}")]
    #[diagnostic(
        code(comanda::config::parse),
        help("Check the TOML syntax; every field is optional.")
    )]
    Parse { path: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Session-independent configuration for the chatbot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatbotConfig {
    /// Menu CSV path.
    pub menu_path: PathBuf,
    /// Delivery-area CSV path.
    pub areas_path: PathBuf,
    /// Append-only order log (JSON Lines).
    pub orders_path: PathBuf,
    /// Terms that short-circuit to the fixed refusal, matched as
    /// case-insensitive substrings.
    pub denylist: Vec<String>,
    /// Static opening-hours reply.
    pub hours_text: String,
    /// Static daily-special reply.
    pub special_text: String,
    /// Whether confirming detours through delivery-info collection.
    pub collect_delivery: bool,
    /// Similarity floor for fuzzy matching.
    pub fuzzy_threshold: f64,
    /// Transcript capacity (turn pairs).
    pub max_transcript_turns: usize,
    /// Generative fallback endpoint.
    pub llm: LlmConfig,
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            menu_path: PathBuf::from("data/menu.csv"),
            areas_path: PathBuf::from("data/delivery-areas.csv"),
            orders_path: PathBuf::from("data/orders.jsonl"),
            denylist: ["stupid", "idiot", "estupido", "idiota", "shut up"]
                .map(String::from)
                .to_vec(),
            hours_text: "Our hours:\n\
                         Monday to Friday: 11:00 AM - 10:00 PM\n\
                         Saturday and Sunday: 10:00 AM - 11:00 PM"
                .into(),
            special_text:
                "Today's special: wild mushroom risotto with black truffle for 18.99".into(),
            collect_delivery: false,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            max_transcript_turns: 50,
            llm: LlmConfig::default(),
        }
    }
}

impl ChatbotConfig {
    /// Load from a TOML file. Every field falls back to its default.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from an optional path: `None` means defaults.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
