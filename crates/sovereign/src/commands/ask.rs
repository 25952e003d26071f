//! One-shot question command.

use anyhow::{Result, bail};

use sovereign::session::ExchangeOutcome;

use super::interactive::drive_exchange;
use super::render::Renderer;

pub async fn run(query: &str, config_path: &str, server_url: Option<&str>) -> Result<()> {
    let mut controller = super::connect(config_path, server_url).await?;
    let mut renderer = Renderer::default();

    match drive_exchange(&mut controller, &mut renderer, query).await? {
        ExchangeOutcome::Completed | ExchangeOutcome::Cancelled => Ok(()),
        ExchangeOutcome::Ignored => bail!("Query is empty"),
        ExchangeOutcome::CredentialRequired(e) => {
            bail!("{e}. Run `sovereign login` to store an API key.")
        }
        ExchangeOutcome::AuthFailed => {
            bail!("The API key was rejected and has been removed. Run `sovereign login` again.")
        }
        ExchangeOutcome::TransportFailed => bail!("Could not fetch a response from the backend"),
    }
}
