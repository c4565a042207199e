use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// JSON file holding every board.
    pub data_file: PathBuf,
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body, in bytes.
    pub json_limit: usize,
    /// Updates a slow viewer may fall behind before further ones are dropped.
    pub connection_buffer: usize,
    /// Report failed file writes to the editor instead of only logging them.
    pub strict_persistence: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".into(),
            data_file: PathBuf::from("whiteboards.json"),
            allowed_origins: vec![
                "http://localhost:5173".into(),
                "http://localhost:8080".into(),
                "http://localhost:3000".into(),
            ],
            json_limit: 20 * 1024 * 1024,
            connection_buffer: 32,
            strict_persistence: false,
        }
    }
}

/// Defaults, then `whiteboard.toml` if present, then `WHITEBOARD_*` variables.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
    Config::builder()
        .add_source(File::with_name("whiteboard").required(false))
        .add_source(
            Environment::with_prefix("WHITEBOARD")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("allowed_origins"),
        )
        .build()?
        .try_deserialize()
}
