use clap::Parser;
use readdiff::error::ReaddiffError;
use readdiff::pipeline::{parse_tracks, TrackJob, TrackSummary, TrackWindow};
use readdiff::sequence::IndexedFastaReference;
use readdiff::settings::{Cli, DecodeSettings};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct TrackLine<'a> {
    track: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<TrackSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), ReaddiffError> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = DecodeSettings::new(cli.command)?;
    let reference = Arc::new(IndexedFastaReference::new(&settings.reference)?);
    let window = match TrackWindow::new(&settings.chromosome, settings.from, settings.to)
        .bounded_by(reference.as_ref())
    {
        Ok(window) => window,
        Err(e) => {
            tracing::error!(
                chromosome = %settings.chromosome,
                available = %reference.sequence_names().join(", "),
                "chromosome not in reference"
            );
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing with partial results");
            on_interrupt.cancel();
        }
    });

    let jobs = settings
        .paths
        .iter()
        .cloned()
        .map(TrackJob::from_path)
        .collect::<Vec<_>>();
    let outcomes = parse_tracks(jobs, reference, window, settings.decoder, cancel).await;

    let mut failed = 0;
    for (name, outcome) in &outcomes {
        let summary = match outcome {
            Ok(outcome) => outcome.summary().map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let line = match summary {
            Ok(summary) => TrackLine {
                track: name,
                summary: Some(summary),
                error: None,
            },
            Err(error) => {
                failed += 1;
                TrackLine {
                    track: name,
                    summary: None,
                    error: Some(error),
                }
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    if failed > 0 {
        return Err(ReaddiffError::Worker(format!(
            "{} of {} tracks failed",
            failed,
            outcomes.len()
        )));
    }
    Ok(())
}
