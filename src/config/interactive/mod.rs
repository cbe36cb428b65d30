
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, OllamaConfig, OpenAiConfig, ProviderKind};
use crate::providers::{OllamaClient, OpenAiClient};

const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 RAG Toolkit Configuration Setup").bold().cyan());
    eprintln!();

    let config_dir = Config::config_dir().context("Failed to determine config directory")?;
    let mut config = load_existing_config_from(&config_dir);

    let providers = &["openai", "ollama"];
    let default_index = match config.provider {
        ProviderKind::OpenAi => 0,
        ProviderKind::Ollama => 1,
    };
    let provider_index = Select::new()
        .with_prompt("Provider")
        .default(default_index)
        .items(providers)
        .interact()?;
    config.provider = match provider_index {
        0 => ProviderKind::OpenAi,
        _ => ProviderKind::Ollama,
    };

    eprintln!();
    match config.provider {
        ProviderKind::OpenAi => {
            eprintln!("{}", style("OpenAI Configuration").bold().yellow());
            eprintln!("The API key is read from OPENAI_API_KEY or .env and is never saved.");
            eprintln!();
            configure_openai(&mut config.openai)?;
        }
        ProviderKind::Ollama => {
            eprintln!("{}", style("Ollama Configuration").bold().yellow());
            eprintln!("Configure your local Ollama instance for embeddings and generation.");
            eprintln!();
            configure_ollama(&mut config.ollama)?;
        }
    }

    eprintln!();
    eprintln!("{}", style("Pipeline Configuration").bold().yellow());
    configure_pipeline(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_connection(&config) {
        Ok(()) => eprintln!("{}", style("✓ Provider connection successful!").green()),
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: Could not reach provider: {}", e)).yellow()
            );
            eprintln!("You can continue, but make sure the provider is reachable before indexing.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    for (section, lines) in config_summary(&config) {
        eprintln!("{}", style(format!("{}:", section)).bold().yellow());
        for (label, value) in lines {
            eprintln!("  {}: {}", label, style(value).cyan());
        }
        eprintln!();
    }

    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

type Section = (&'static str, Vec<(&'static str, String)>);

/// Labelled values shown by `show_config`, with the API key masked
fn config_summary(config: &Config) -> Vec<Section> {
    let provider = match config.provider {
        ProviderKind::OpenAi => (
            "OpenAI Settings",
            vec![
                ("Base URL", config.openai.base_url.clone()),
                ("Model", config.openai.model.clone()),
                ("Embedding Model", config.openai.embed_model.clone()),
                (
                    "API Key",
                    config
                        .openai
                        .masked_api_key()
                        .unwrap_or_else(|| "(not set)".to_string()),
                ),
            ],
        ),
        ProviderKind::Ollama => (
            "Ollama Settings",
            vec![
                (
                    "Ollama URL",
                    config
                        .ollama
                        .ollama_url()
                        .map_or_else(|e| format!("Invalid ({})", e), |url| url.to_string()),
                ),
                ("Model", config.ollama.model.clone()),
                ("Embedding Model", config.ollama.embed_model.clone()),
            ],
        ),
    };

    vec![
        (
            "General",
            vec![
                ("Provider", config.provider.to_string()),
                (
                    "Request Timeout",
                    format!("{}s", config.request_timeout_secs),
                ),
            ],
        ),
        provider,
        (
            "Pipeline Settings",
            vec![
                ("Chunk Size", config.chunking.chunk_size.to_string()),
                ("Chunk Overlap", config.chunking.overlap.to_string()),
                ("Batch Size", config.indexing.batch_size.to_string()),
                (
                    "Structured Retries",
                    config.structured.max_retries.to_string(),
                ),
            ],
        ),
    ]
}

fn load_existing_config_from(config_dir: &Path) -> Config {
    Config::load_from(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            candidate.base_url()?;
            Ok(())
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(openai.model.clone())
        .validate_with(|input: &String| non_empty(input))
        .interact_text()?;

    let embed_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embed_model.clone())
        .validate_with(|input: &String| non_empty(input))
        .interact_text()?;

    openai.set_base_url(base_url)?;
    openai.set_model(model)?;
    openai.set_embed_model(embed_model)?;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Generation model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| non_empty(input))
        .interact_text()?;

    let embed_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embed_model.clone())
        .validate_with(|input: &String| non_empty(input))
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_embed_model(embed_model)?;

    Ok(())
}

fn configure_pipeline(config: &mut Config) -> Result<()> {
    let timeout: f64 = Input::new()
        .with_prompt("Request timeout in seconds")
        .default(config.request_timeout_secs)
        .validate_with(|input: &f64| -> Result<(), &str> {
            if input.is_finite() && *input > 0.0 && *input <= 600.0 {
                Ok(())
            } else {
                Err("Timeout must be between 0 and 600 seconds")
            }
        })
        .interact_text()?;

    let batch_size: usize = Input::new()
        .with_prompt("Batch size for embedding requests")
        .default(config.indexing.batch_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    config.set_request_timeout(timeout)?;
    config.set_batch_size(batch_size)?;

    Ok(())
}

fn non_empty(input: &str) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_connection(config: &Config) -> crate::Result<()> {
    match config.provider {
        ProviderKind::OpenAi => {
            let mut openai = config.openai.clone();
            if openai.api_key.is_none() {
                openai.api_key = std::env::var("OPENAI_API_KEY").ok();
            }
            OpenAiClient::new(&openai, CONNECTION_TEST_TIMEOUT)?.health_check()
        }
        ProviderKind::Ollama => OllamaClient::new(&config.ollama, CONNECTION_TEST_TIMEOUT)?.ping(),
    }
}
