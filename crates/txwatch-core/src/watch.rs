//! Per-transaction watch task: read the event stream, fall back to polling.

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::event::TxEvent;
use crate::poll;
use crate::registry::{Applied, TxRegistry};
use crate::sse::{SseParser, SseRecord};
use crate::status::TxHash;

/// How the stream phase ended.
#[derive(Debug)]
enum StreamOutcome {
    /// Terminal state applied, or the entry is gone.
    Finished,
    /// Body ended before a terminal event.
    Ended,
    /// Could not connect, or the body failed mid-read.
    Failed(WatchError),
}

/// Entry point spawned by [`TxRegistry::register`].
///
/// Cancelling `cancel` drops whichever future is in flight; nothing is
/// reported and no fallback starts.
pub(crate) async fn run(
    registry: TxRegistry,
    tx_hash: TxHash,
    watch_id: u64,
    deadline: Instant,
    cancel: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(tx_hash = %tx_hash, "watch cancelled");
            return;
        }
        outcome = consume_stream(&registry, &tx_hash, watch_id) => outcome,
    };

    if cancel.is_cancelled() {
        return;
    }
    match outcome {
        StreamOutcome::Finished => return,
        StreamOutcome::Ended => {
            tracing::info!(tx_hash = %tx_hash, "stream closed before completion, polling");
        }
        StreamOutcome::Failed(e) => {
            tracing::warn!(tx_hash = %tx_hash, error = %e, "stream unavailable, polling");
        }
    }

    poll::poll_until_terminal(&registry, &tx_hash, watch_id, deadline, &cancel).await;
}

async fn consume_stream(registry: &TxRegistry, tx_hash: &TxHash, watch_id: u64) -> StreamOutcome {
    // Token is read once here; rotation does not reach an open stream.
    let token = registry.auth_token();
    let mut body = match registry.source().open_stream(tx_hash, token.as_deref()).await {
        Ok(body) => body,
        Err(e) => return StreamOutcome::Failed(e),
    };
    tracing::debug!(tx_hash = %tx_hash, "stream connected");

    let mut parser = SseParser::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return StreamOutcome::Failed(e),
        };
        for record in parser.push_bytes(&chunk) {
            if deliver(registry, tx_hash, watch_id, &record) == Applied::Finished {
                return StreamOutcome::Finished;
            }
        }
    }

    if let Some(record) = parser.finish() {
        tracing::debug!(tx_hash = %tx_hash, event = %record.event, "unterminated trailing frame");
        if deliver(registry, tx_hash, watch_id, &record) == Applied::Finished {
            return StreamOutcome::Finished;
        }
    }
    StreamOutcome::Ended
}

fn deliver(registry: &TxRegistry, tx_hash: &TxHash, watch_id: u64, record: &SseRecord) -> Applied {
    match TxEvent::from_record(record) {
        Ok(Some(event)) => {
            tracing::trace!(tx_hash = %tx_hash, event = event.name(), "stream event");
            registry.apply_event(tx_hash, watch_id, event)
        }
        Ok(None) => Applied::Continue,
        Err(e) => {
            tracing::warn!(tx_hash = %tx_hash, error = %e, "skipping malformed event");
            Applied::Continue
        }
    }
}
