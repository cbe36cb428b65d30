// Configuration management module
// TOML settings file plus environment overrides

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, OllamaConfig, OpenAiConfig, ProviderKind, StructuredConfig,
};

/// Load `.env` from the working directory or the nearest parent that has one
///
/// Variables already set in the environment take precedence.
#[inline]
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    dotenvy::dotenv().ok()
}
