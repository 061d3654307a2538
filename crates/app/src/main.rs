use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use intake::app::{App, TurnSink};
use intake::settings::Settings;
use intake_core::TicketTracker;
use intake_llm::{LlmProvider, RigProviderAdapter};
use intake_tracker::LinearClient;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints the turn to the terminal as it streams.
struct ConsoleSink;

impl TurnSink for ConsoleSink {
    fn assistant_text(&mut self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn ticket_prepared(&mut self) {
        println!("\n[preparing ticket...]");
    }

    fn ticket_created(&mut self, url: &str) {
        println!("[ticket created: {url}]");
    }

    fn submission_failed(&mut self, reason: &str) {
        println!("[ticket submission failed: {reason}]");
    }

    fn stream_failed(&mut self, reason: &str) {
        println!("\n[stream aborted: {reason}]");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;

    let provider = RigProviderAdapter::new(settings.provider_config())?;
    let tracker = LinearClient::new(settings.linear_config())?;
    let model_id = settings.provider.model.clone();
    tracing::info!(model = %model_id, "starting intake session");

    let mut app = App::new(
        Arc::new(provider) as Arc<dyn LlmProvider>,
        Arc::new(tracker) as Arc<dyn TicketTracker>,
        model_id,
    );
    let mut sink = ConsoleSink;

    println!("Describe the feature you need. Ctrl-D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Err(error) = app.run_turn(input, &mut sink).await {
            eprintln!("turn failed: {error}");
            continue;
        }
        println!();
    }

    Ok(())
}
