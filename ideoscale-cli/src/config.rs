/// Config file loading and creation.
///
/// Config lives at ~/.config/ideoscale/config.toml. Every field is optional
/// and CLI flags override config values.
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::bail;

#[derive(Deserialize, Default)]
pub struct IdeoscaleConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub concurrency: Option<usize>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub politician_type: Option<String>,
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# ideoscale configuration
# All values here can be overridden by CLI flags.

# OpenAI-compatible API endpoint
# endpoint = \"https://api.openai.com\"

# Model ID
# model = \"gpt-4.1-mini\"

# API key: use OPENAI_API_KEY env var or --api-key flag (not stored in config)

# Max concurrent requests (1-200)
# concurrency = 125

# Comparison-phase sampling temperature (extraction always runs at 0)
# temperature = 0.0

# Nucleus sampling parameter
# top_p = 1.0

# What to call the entities inside prompts (\"senator\", \"representative\", ...)
# politician_type = \"politician\"
";

/// Returns the default config path: ~/.config/ideoscale/config.toml
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| bail("HOME environment variable not set"));
    PathBuf::from(home).join(".config").join("ideoscale").join("config.toml")
}

/// Load config from a file path. Returns default (all None) if the file
/// doesn't exist.
pub fn load_config(path: &Path) -> IdeoscaleConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .unwrap_or_else(|e| bail(format!("Failed to parse config at {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => IdeoscaleConfig::default(),
        Err(e) => bail(format!("Failed to read config at {}: {e}", path.display())),
    }
}

/// Create the default config file. Errors if it already exists.
pub fn create_default_config() -> PathBuf {
    let path = config_path();

    if path.exists() {
        bail(format!("Config file already exists at {}", path.display()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| bail(format!("Failed to create directory {}: {e}", parent.display())));
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .unwrap_or_else(|e| bail(format!("Failed to write config to {}: {e}", path.display())));

    path
}
