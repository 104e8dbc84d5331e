use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use streamcore::audio::SilentEngine;
use streamcore::jobs::{DirectExtractor, HttpDownloader, SourceRegistry};
use streamcore::{AppController, Collaborators, Command, Config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_default()?;

    let _log_guard = match logging::init_logging(&config.log_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {e}");
            None
        }
    };

    tracing::info!("=== streamcore starting ===");

    let controller = AppController::new(
        config,
        Collaborators {
            engine: Arc::new(SilentEngine::new()),
            sources: SourceRegistry::new().fallback(Arc::new(DirectExtractor)),
            downloader: Arc::new(HttpDownloader::default()),
            reporter: Arc::new(|message: &str| println!("{message}")),
        },
    )?;

    let res = run_app(&controller).await;

    controller.shutdown().await;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
        return Err(err);
    }

    tracing::info!("streamcore shutting down");
    Ok(())
}

async fn run_app(controller: &AppController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type `open URL` to start, `q` to quit.");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            Some(Command::Quit) => break,
            Some(command) => {
                if let Some(output) = controller.handle_command(command) {
                    println!("{output}");
                }
            }
            None if line.is_empty() => {}
            None => println!("Unknown command: {}", line.trim()),
        }
    }

    Ok(())
}
