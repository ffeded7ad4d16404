mod cli;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use medsafe::{
    AnalysisReport, ChatOptions, ChatSession, GeminiClient, Medsafe, MedsafeConfig,
    prompts::SAMPLE_PRESCRIPTION,
    render::{render_analysis, render_interactions, render_secondary, render_transcript},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, PrescriptionInput};

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_prescription(input: PrescriptionInput) -> Result<String> {
    if input.sample {
        return Ok(SAMPLE_PRESCRIPTION.to_string());
    }
    if let Some(path) = input.file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    Ok(input.text.unwrap_or_default())
}

/// The part of `running` not yet printed.
fn unseen<'a>(running: &'a str, printed: usize) -> &'a str {
    running.get(printed..).unwrap_or("")
}

async fn chat(config: &MedsafeConfig, grounded: bool) -> Result<()> {
    let model = Arc::new(GeminiClient::new(config.gemini.clone())?);
    let options = ChatOptions {
        grounded,
        ..ChatOptions::default()
    };
    let mut session = ChatSession::create_with(model, options);
    print!("{}", render_transcript(session.transcript()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        print!("assistant> ");
        let mut printed = 0;
        let result = session
            .send_message(line, |running| {
                print!("{}", unseen(running, printed));
                printed = running.len();
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();

        if let Err(e) = result {
            eprintln!("{e}");
        }
    }

    let transcript = session.close();
    info!(messages = transcript.len(), "Chat closed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = MedsafeConfig::from_env()?;

    match cli.command {
        Commands::Analyze(input) => {
            let medsafe = Medsafe::from_config(&config)?;
            let text = read_prescription(input)?;
            let result = medsafe.analyzer.analyze(&text).await?;
            print!("{}", render_analysis(&AnalysisReport::from_result(result)));
        }
        Commands::Interactions { drugs } => {
            let medsafe = Medsafe::from_config(&config)?;
            let report = medsafe.interactions.check(&drugs).await?;
            print!("{}", render_interactions(&report));
        }
        Commands::Secondary(input) => {
            let medsafe = Medsafe::from_config(&config)?;
            let text = read_prescription(input)?;
            let outcome = medsafe.secondary.analyze(&text).await?;
            print!("{}", render_secondary(&outcome));
        }
        Commands::Chat { no_search } => chat(&config, !no_search).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_returns_only_new_text() {
        assert_eq!(unseen("Hi there", 2), " there");
        assert_eq!(unseen("Hi", 2), "");
        assert_eq!(unseen("Hi", 5), "");
    }

    #[test]
    fn sample_flag_wins() {
        let input = PrescriptionInput {
            text: None,
            sample: true,
            file: None,
        };
        assert_eq!(read_prescription(input).unwrap(), SAMPLE_PRESCRIPTION);
    }
}
