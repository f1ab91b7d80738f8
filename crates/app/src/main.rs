//! `fileconv` -- command-line client for the file-conversion service.
//!
//! # Environment variables
//!
//! | Variable                        | Default                 | Description                       |
//! |---------------------------------|-------------------------|-----------------------------------|
//! | `FILECONV_API_URL`              | `http://localhost:4000` | Service base URL                  |
//! | `FILECONV_WS_URL`               | derived from API URL    | Push notification endpoint        |
//! | `FILECONV_REQUEST_TIMEOUT_SECS` | `30`                    | Per-request HTTP timeout          |
//! | `FILECONV_RECONNECT_ATTEMPTS`   | `5`                     | Push channel reconnect attempts   |
//! | `FILECONV_RECONNECT_DELAY_MS`   | `3000`                  | Delay between reconnect attempts  |
//! | `FILECONV_SAFETY_NET_DELAY_MS`  | `1800`                  | Delay of the fallback refresh     |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fileconv_app::{render, AppConfig, ConversionCoordinator};
use fileconv_core::conversion::{self, ConversionType};
use fileconv_core::files::SourceFile;
use fileconv_core::job_events::JobEvent;

#[derive(Parser)]
#[command(name = "fileconv", version, about = "Convert documents with the file-conversion service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the conversions available for a file name.
    Conversions { file_name: String },

    /// Upload a file for conversion and wait for the job to finish.
    Convert {
        path: PathBuf,

        /// Conversion to request (defaults to the first one available).
        #[arg(long)]
        to: Option<ConversionType>,

        /// Seconds to wait for the completion notification.
        #[arg(long, default_value_t = 60)]
        wait_secs: u64,
    },

    /// Show the converted files available for download.
    Files,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fileconv_app=info,fileconv_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Conversions { file_name } => {
            println!(
                "{}",
                render::conversions(&file_name, conversion::legal_conversions(&file_name))
            );
            Ok(())
        }
        Command::Files => {
            let config = AppConfig::from_env()?;
            let coordinator = ConversionCoordinator::new(
                fileconv_client::ApiClient::new(&config.api_url, config.request_timeout)?,
                None,
                config.safety_net_delay,
            );
            let files = coordinator.refresh().await?;
            println!("{}", render::listing(&files));
            Ok(())
        }
        Command::Convert {
            path,
            to,
            wait_secs,
        } => convert(path, to, Duration::from_secs(wait_secs)).await,
    }
}

async fn convert(path: PathBuf, to: Option<ConversionType>, wait: Duration) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(api_url = %config.api_url, ws_url = %config.ws_url, "Loaded configuration");

    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Path has no file name")?;

    let coordinator = ConversionCoordinator::from_config(&config)?;

    let mut notices = coordinator.notices();
    let printer = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            eprintln!("{}", render::notice(&notice));
        }
    });

    coordinator.activate().await;
    let result = submit_and_wait(&coordinator, file_name, bytes, to, wait).await;
    coordinator.shutdown().await;

    // Dropping the session closes the notice bus, which ends the printer.
    drop(coordinator);
    if let Err(e) = printer.await {
        tracing::error!(error = %e, "Notice printer panicked");
    }
    result
}

async fn submit_and_wait(
    coordinator: &ConversionCoordinator,
    file_name: String,
    bytes: Vec<u8>,
    to: Option<ConversionType>,
    wait: Duration,
) -> anyhow::Result<()> {
    let mut job_events = coordinator.job_events();

    let selection = coordinator.select_file(SourceFile::new(file_name, bytes));
    match to {
        Some(to) => {
            coordinator.select_conversion(to)?;
        }
        None => {
            if let Some(conversion) = selection.selected_conversion {
                tracing::info!(conversion = %conversion, "Using default conversion");
            }
        }
    }

    let handle = coordinator
        .submit()
        .await
        .context("Conversion was not submitted")?;
    println!("Job {} accepted: {}", handle.job_id, handle.server_message);

    let finished = tokio::time::timeout(wait, async {
        while let Some(event) = job_events.recv().await {
            match event {
                JobEvent::JobCompleted { job_id, .. } | JobEvent::JobFailed { job_id, .. }
                    if job_id == handle.job_id =>
                {
                    return true;
                }
                _ => {}
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    if !finished {
        tracing::warn!(job_id = %handle.job_id, "No completion notification received");
    }

    let files = coordinator.refresh().await?;
    println!("{}", render::listing(&files));
    Ok(())
}
