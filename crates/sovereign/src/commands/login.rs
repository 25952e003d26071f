//! Login and logout commands.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};

use sovereign::auth::CredentialStore;
use sovereign::auth::credentials::validate_api_key;
use sovereign::config::Config;

/// Prompt for an API key and store it.
pub async fn run(config_path: &str) -> Result<()> {
    let mut store = open_store(config_path).await?;

    let key = prompt("API key (sk-...): ")?;
    let key = validate_api_key(&key).context("Invalid API key")?;
    store.set_api_key(key)?;

    println!("API key saved to {}", store.path().display());
    Ok(())
}

/// Forget the stored API key.
pub async fn logout(config_path: &str) -> Result<()> {
    let mut store = open_store(config_path).await?;

    if store.clear_api_key()? {
        println!("API key removed from {}", store.path().display());
    } else {
        println!("No API key stored.");
    }
    Ok(())
}

async fn open_store(config_path: &str) -> Result<CredentialStore> {
    let config = Config::load(config_path)
        .await
        .with_context(|| format!("Failed to load config '{}'", config_path))?;
    super::open_credentials(&config)
}

fn prompt(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("No API key entered");
    }
    Ok(line.trim().to_string())
}
