//! Event sources
//!
//! Reads normalized events as JSON lines and forwards them into the engine
//! channel. Malformed lines are logged and skipped.

use tokio::fs::File;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::parser::OrderEvent;
use crate::telemetry;

/// Line counts from one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub lines: u64,
    pub events: u64,
    pub malformed: u64,
}

/// Open `source`: a file path, or `-` for stdin
pub async fn open_source(source: &str) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if source == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = File::open(source)
        .await
        .map_err(|e| EngineError::IoError(format!("Failed to open {source}: {e}")))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Forward every event in `reader` to `tx`, in input order
///
/// Waits for channel capacity before reading further, so a slow engine
/// throttles the reader.
pub async fn read_events<R>(reader: R, tx: &mpsc::Sender<OrderEvent>) -> Result<ReadSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReadSummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        summary.lines += 1;
        match OrderEvent::parse_line(&line) {
            Ok(Some(event)) => {
                tx.send(event)
                    .await
                    .map_err(|_| EngineError::ChannelClosed)?;
                summary.events += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(line = summary.lines, error = %e, "Skipping malformed event line");
                telemetry::record_malformed_line();
                summary.malformed += 1;
            }
        }
    }

    debug!(?summary, "Event source exhausted");
    Ok(summary)
}
