// Configuration management module
// TOML settings plus the interactive editor behind `ragdocs config`

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, IngestConfig, OllamaConfig, QueryConfig, VectorStoreConfig,
};
