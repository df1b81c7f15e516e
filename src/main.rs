mod cli;
mod config;
mod console;
mod core;
mod error;
mod logging;
mod tui;

use crate::cli::{Cli, Commands};
use crate::config::{Config, Overrides};
use crate::core::Orchestrator;
use crate::error::Result;
use crate::logging::LogTarget;
use crate::tui::{App, EventHandler, init as tui_init, restore as tui_restore, ui};
use clap::Parser;
use std::io;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides: Overrides = cli.llm.into();

    match cli.command {
        Some(Commands::Process { url, json, play }) => {
            logging::init(LogTarget::Stderr)?;
            run_cli_process(&overrides, url, json, play).await?;
        }
        Some(Commands::Quiz { url }) => {
            logging::init(LogTarget::Stderr)?;
            run_cli_quiz(&overrides, url).await?;
        }
        Some(Commands::Tui) | None => {
            logging::init(LogTarget::File)?;
            run_tui(overrides).await?;
        }
    }

    Ok(())
}

async fn run_cli_process(overrides: &Overrides, url: String, json: bool, play: bool) -> Result<()> {
    let config = Config::from_env_with(overrides)?;
    let orchestrator = Orchestrator::from_config(&config)?;

    if !json {
        println!("Processing video and generating content... This may take a minute.");
    }
    let mut state = orchestrator.run(&url).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        console::print_package(&state, &mut io::stdout())?;
    }

    if !state.has_transcript() {
        return Err(error::Error::retrieval(
            state.error.unwrap_or_else(|| "Could not retrieve a transcript".into()),
        ));
    }

    if play {
        let stdin = io::stdin();
        console::play_quiz(
            &mut state,
            &orchestrator,
            &mut stdin.lock(),
            &mut io::stdout(),
        )
        .await?;
    }

    Ok(())
}

async fn run_cli_quiz(overrides: &Overrides, url: String) -> Result<()> {
    let config = Config::from_env_with(overrides)?;
    let orchestrator = Orchestrator::from_config(&config)?;

    println!("Fetching transcript and generating quiz questions...");
    let mut state = orchestrator.run_quiz_only(&url).await;

    if !state.has_transcript() {
        return Err(error::Error::retrieval(
            state.error.unwrap_or_else(|| "Could not retrieve a transcript".into()),
        ));
    }
    println!("📺 {}", state.title);
    if let Some(error) = &state.error {
        println!("{error}");
    }

    let stdin = io::stdin();
    console::play_quiz(
        &mut state,
        &orchestrator,
        &mut stdin.lock(),
        &mut io::stdout(),
    )
    .await?;

    Ok(())
}

async fn run_tui(overrides: Overrides) -> Result<()> {
    // Initialize terminal
    let mut terminal = tui_init()?;

    let mut app = App::new(overrides);
    let event_handler = EventHandler::new();

    // Background tasks report back over this channel
    let (tx, rx) = mpsc::unbounded_channel();
    app.processing_tx = Some(tx);
    app.processing_rx = Some(rx);

    let result = loop {
        let event = match event_handler.next_event() {
            Ok(event) => event,
            Err(e) => break Err(e),
        };
        if let Err(e) = app.handle_event(event) {
            break Err(e);
        }

        if let Err(e) = terminal.draw(|f| ui::draw(f, &mut app)) {
            break Err(e.into());
        }

        if app.should_quit {
            break Ok(());
        }
    };

    // Restore terminal
    tui_restore()?;
    result
}
