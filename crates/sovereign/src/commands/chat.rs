//! Interactive chat command implementation.

use anyhow::Result;

use super::interactive::run_interactive_loop;

pub async fn run(config_path: &str, server_url: Option<&str>) -> Result<()> {
    let mut controller = super::connect(config_path, server_url).await?;

    println!("Sovereign financial assistant");
    println!("/new starts over, /steps shows the last answer's steps, /login changes the API key, /exit quits.");
    println!("Ctrl+C cancels an answer in progress.");
    println!();

    run_interactive_loop(&mut controller).await
}
