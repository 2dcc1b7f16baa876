use std::io::{stdout, Write};
use std::sync::Arc;
use std::time::Instant;
use anyhow::{Context, Result};
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use tracing_subscriber::EnvFilter;
use uplink::config::init_config;
use uplink::utils::{format_bytes, format_duration};
use uplink::{HttpTransport, SourceFile, UploadEvent, UploadOperation, UploadSession};

fn draw_progress(percent: u8, total: u64) -> std::io::Result<()> {
    let sent = total * u64::from(percent) / 100;
    let mut out = stdout();
    execute!(
        out,
        MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        Print(format!(
            "Uploading... {:>3}%  {} / {}",
            percent,
            format_bytes(sent),
            format_bytes(total)
        ))
    )?;
    out.flush()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = init_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path))?;

    let file_path = config
        .file_path
        .as_ref()
        .context("config has no file_path to upload")?;
    let file = SourceFile::from_path(file_path)
        .await
        .with_context(|| format!("Failed to read {}", file_path.display()))?;

    let operation = config.operation.unwrap_or_else(|| {
        if file.is_image() {
            UploadOperation::Image
        } else if file.is_video() {
            UploadOperation::Video
        } else {
            UploadOperation::File
        }
    });

    let transport = HttpTransport::new(config.transport_config())?;
    let session = Arc::new(UploadSession::new(config.session_config()?, Arc::new(transport)));

    if let Some(preview) = session.select(&file) {
        tracing::debug!(preview = %preview.id(), "preview ready");
    }

    let total = file.size();
    let mut progress_rx = session.subscribe_filtered(|event| matches!(event, UploadEvent::Progress { .. }));
    let progress_task = tokio::spawn(async move {
        while let Ok(UploadEvent::Progress { percent, .. }) = progress_rx.recv().await {
            if draw_progress(percent, total).is_err() {
                break;
            }
        }
    });

    let cancel_task = tokio::spawn({
        let session = session.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                session.cancel();
            }
        }
    });

    let started = Instant::now();
    let outcome = session.begin(file, operation).await;

    cancel_task.abort();
    progress_task.abort();
    println!();
    session.reset();

    match outcome {
        Ok(result) => {
            tracing::info!(elapsed = %format_duration(started.elapsed()), "upload finished");
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.banner_message());
            Err(err.into())
        }
    }
}
