#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{ChatConfig, Config, LlmConfig};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 docqa Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(Config::load())?;

    eprintln!("{}", style("API Configuration").bold().yellow());
    eprintln!("Configure the OpenAI-compatible endpoint used for embeddings and chat.");
    eprintln!();

    configure_llm(&mut config.llm)?;

    eprintln!();
    eprintln!("{}", style("Chat Configuration").bold().yellow());
    configure_chat(&mut config.chat)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_api_connection(&config.llm) {
        eprintln!("{}", style("✓ API endpoint reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the API endpoint").yellow()
        );
        eprintln!("You can continue, but uploads and questions will fail until it is reachable.");
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

    eprintln!("{}", style("API Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.llm.base_url).cyan());
    eprintln!(
        "  Embedding Model: {} ({} dimensions)",
        style(&config.llm.embedding_model).cyan(),
        style(config.llm.embedding_dimension).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.llm.batch_size).cyan());
    match config.llm.resolve_api_key() {
        Ok(_) => eprintln!("  API Key: {}", style("configured").green()),
        Err(e) => eprintln!("  API Key: {} ({})", style("missing").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Chat Settings:").bold().yellow());
    eprintln!("  Default Model: {}", style(&config.chat.default_model).cyan());
    eprintln!(
        "  Default Max Tokens: {}",
        style(config.chat.default_max_tokens).cyan()
    );
    eprintln!("  Temperature: {}", style(config.chat.temperature).cyan());
    eprintln!("  Streaming: {}", style(config.chat.stream).cyan());
    for model in &config.chat.models {
        eprintln!("    - {} (max {} tokens)", model.name, model.max_tokens);
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} tokens, overlap {} ({})",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan(),
        config.chunking.encoding
    );
    eprintln!("  Top N: {}", style(config.retrieval.top_n).cyan());
    eprintln!(
        "  Retry: {} attempts, {} ms apart",
        style(config.retry.attempts).cyan(),
        style(config.retry.delay_ms).cyan()
    );

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());
    eprintln!("Registry: {}", style(config.database_path().display()).dim());
    eprintln!("Vectors: {}", style(config.vector_database_path().display()).dim());

    Ok(())
}

fn load_existing_config(loaded: Result<Config>) -> Result<Config> {
    loaded.map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: Config::config_dir()?,
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_llm(llm: &mut LlmConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(llm.base_url.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let temp_config = LlmConfig {
                base_url: input.clone(),
                ..LlmConfig::default()
            };
            temp_config.validate().map_err(|e| e.to_string())
        })
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(llm.api_key_env.clone())
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(llm.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(llm.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 8192")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding requests")
        .default(llm.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    llm.set_base_url(base_url)?;
    llm.set_api_key_env(api_key_env)?;
    llm.set_embedding_model(model)?;
    llm.set_embedding_dimension(dimension)?;
    llm.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_chat(chat: &mut ChatConfig) -> Result<()> {
    let names: Vec<&str> = chat.models.iter().map(|m| m.name.as_str()).collect();
    let default_index = names
        .iter()
        .position(|&name| name == chat.default_model)
        .unwrap_or(0);

    let model_index = Select::new()
        .with_prompt("Default chat model")
        .default(default_index)
        .items(&names)
        .interact()?;
    let model = names[model_index].to_string();

    let temperature: f32 = Input::new()
        .with_prompt("Temperature")
        .default(chat.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0 and 2")
            }
        })
        .interact_text()?;

    let stream = Confirm::new()
        .with_prompt("Stream answers as they are generated?")
        .default(chat.stream)
        .interact()?;

    chat.set_default_model(model)?;
    chat.set_temperature(temperature)?;
    chat.stream = stream;

    Ok(())
}

fn test_api_connection(llm: &LlmConfig) -> bool {
    let Ok(url) = llm.endpoint("models") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    let mut request = agent.get(url.as_str());
    if let Ok(key) = llm.resolve_api_key() {
        request = request.header("Authorization", &format!("Bearer {}", key));
    }

    match request.call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
