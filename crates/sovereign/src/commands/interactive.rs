//! Interactive chat loop and the exchange driver shared with `ask`.

use std::io::stdout;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use sovereign::auth::credentials::validate_api_key;
use sovereign::client::Transport;
use sovereign::conversation::Sender;
use sovereign::session::{ExchangeOutcome, SessionController};

use super::render::Renderer;

type InputLines = Lines<BufReader<Stdin>>;

/// Run the interactive chat loop until `/exit` or end of input.
pub async fn run_interactive_loop<T: Transport>(
    controller: &mut SessionController<T>,
) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut renderer = Renderer::default();

    loop {
        let Some(input) = read_line(&mut lines, "> ").await? else {
            println!();
            break;
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/exit" | "/quit" => break,
            "/new" => {
                controller.reset_conversation();
                renderer.reset();
                println!("Started a new conversation.");
                continue;
            }
            "/steps" => {
                toggle_last_steps(controller, &renderer)?;
                continue;
            }
            "/login" => {
                prompt_api_key(controller, &mut lines).await?;
                continue;
            }
            _ => {}
        }

        let outcome = drive_exchange(controller, &mut renderer, input).await?;
        match outcome {
            ExchangeOutcome::CredentialRequired(e) => {
                eprintln!("{e}.");
                if prompt_api_key(controller, &mut lines).await? {
                    println!("Send your question again.");
                }
            }
            ExchangeOutcome::AuthFailed => {
                prompt_api_key(controller, &mut lines).await?;
            }
            ExchangeOutcome::Cancelled => println!("\n[cancelled]"),
            ExchangeOutcome::Ignored
            | ExchangeOutcome::Completed
            | ExchangeOutcome::TransportFailed => {}
        }
    }

    Ok(())
}

/// Run one exchange, rendering each snapshot as it is published.
///
/// Ctrl+C cancels the exchange instead of terminating the process.
pub async fn drive_exchange<T: Transport>(
    controller: &mut SessionController<T>,
    renderer: &mut Renderer,
    input: &str,
) -> Result<ExchangeOutcome> {
    let mut updates = controller.subscribe();
    let cancel = controller.cancel_handle();
    let mut out = stdout();

    let send = controller.send(input);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome?,
            changed = updates.changed() => {
                if changed.is_ok() {
                    renderer.render(&updates.borrow_and_update(), &mut out)?;
                }
            }
            _ = tokio::signal::ctrl_c() => cancel.cancel(),
        }
    };

    renderer.render(&updates.borrow_and_update(), &mut out)?;
    Ok(outcome)
}

/// Ask for an API key on the chat input. Returns whether one was stored.
///
/// An empty line skips entry.
async fn prompt_api_key<T: Transport>(
    controller: &mut SessionController<T>,
    lines: &mut InputLines,
) -> Result<bool> {
    loop {
        let Some(key) = read_line(lines, "API key (sk-...), empty to skip: ").await? else {
            return Ok(false);
        };
        if key.trim().is_empty() {
            return Ok(false);
        }
        if let Err(e) = validate_api_key(&key) {
            eprintln!("{e}.");
            continue;
        }
        controller.credentials_mut().set_api_key(&key)?;
        println!("API key saved.");
        return Ok(true);
    }
}

/// Expand or collapse the thinking steps of the latest answer.
fn toggle_last_steps<T: Transport>(
    controller: &mut SessionController<T>,
    renderer: &Renderer,
) -> Result<()> {
    let Some(id) = controller
        .conversation()
        .messages()
        .iter()
        .rev()
        .find(|m| m.sender == Sender::Assistant)
        .map(|m| m.id)
    else {
        println!("No answer yet.");
        return Ok(());
    };

    controller.toggle_thinking(id);
    if let Some(message) = controller.conversation().get(id) {
        renderer.show_steps(message, &mut stdout())?;
    }
    Ok(())
}

async fn read_line(lines: &mut InputLines, prompt: &str) -> Result<Option<String>> {
    let mut out = tokio::io::stdout();
    out.write_all(prompt.as_bytes()).await?;
    out.flush().await?;
    Ok(lines.next_line().await?)
}
