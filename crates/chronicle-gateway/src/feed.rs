//! Inbound event feed: newline-delimited JSON `GatewayEvent`s, one per line,
//! as written by the platform connector.

use std::io::BufRead;
use std::pin::Pin;

use anyhow::{Context, Result};
use futures_util::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use chronicle_types::GatewayEvent;

pub type EventStream = Pin<Box<dyn Stream<Item = GatewayEvent> + Send>>;

/// Decode events from `reader`. Blank lines are ignored and lines that do not
/// decode are logged and skipped. The stream ends at EOF or on a read error.
pub fn jsonl_events<R>(reader: R) -> impl Stream<Item = GatewayEvent>
where
    R: AsyncRead + Unpin,
{
    async_stream::stream! {
        let mut lines = BufReader::new(reader).lines();
        let mut line_no: u64 = 0;

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    line_no += 1;
                    if let Some(event) = decode_line(line_no, &line) {
                        yield event;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(line = line_no, error = %e, "Event feed read failed");
                    break;
                }
            }
        }
    }
}

/// Decode events from a blocking reader on a dedicated thread.
///
/// Used for stdin: tokio's stdin reads on the blocking pool, and a read that
/// never returns keeps the runtime from shutting down. A plain thread is
/// simply abandoned at exit. It stops on EOF, on a read error, or once the
/// stream is dropped and the next line fails to send.
pub fn blocking_events<R>(reader: R) -> std::io::Result<impl Stream<Item = GatewayEvent>>
where
    R: std::io::Read + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(256);

    std::thread::Builder::new()
        .name("chronicle-feed".into())
        .spawn(move || {
            for line in std::io::BufReader::new(reader).lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Event feed read failed");
                        break;
                    }
                }
            }
        })?;

    Ok(async_stream::stream! {
        let mut line_no: u64 = 0;
        while let Some(line) = rx.recv().await {
            line_no += 1;
            if let Some(event) = decode_line(line_no, &line) {
                yield event;
            }
        }
    })
}

fn decode_line(line_no: u64, line: &str) -> Option<GatewayEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<GatewayEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(line = line_no, error = %e, "Skipping undecodable event");
            None
        }
    }
}

/// Open the configured feed: `-` for stdin, anything else is a file path.
pub async fn open_feed(source: &str) -> Result<EventStream> {
    if source == "-" {
        info!("Reading events from stdin");
        let events = blocking_events(std::io::stdin()).context("Failed to start stdin reader")?;
        return Ok(Box::pin(events));
    }

    let file = tokio::fs::File::open(source)
        .await
        .with_context(|| format!("Failed to open event feed {}", source))?;
    info!("Reading events from {}", source);
    Ok(Box::pin(jsonl_events(file)))
}
