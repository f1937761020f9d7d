// Configuration management module
// TOML settings plus the interactive setup command

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ChatConfig, Config, ConfigError, DEFAULT_EMBEDDING_DIMENSION, LlmConfig, ModelSpec,
    RetrievalConfig,
};

