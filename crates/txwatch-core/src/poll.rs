//! Polling fallback used when the event stream cannot deliver a terminal state.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::registry::{Applied, TxRegistry};
use crate::status::TxHash;

/// Poll the status endpoint every `poll_interval` until the transaction is
/// terminal, `cancel` fires, or `deadline` passes. Past the deadline the entry
/// stays registered, disconnected, until `cleanup()` evicts it.
///
/// The first request goes out immediately. Request errors are logged and the
/// loop carries on; the credential is re-read before every request.
pub(crate) async fn poll_until_terminal(
    registry: &TxRegistry,
    tx_hash: &TxHash,
    watch_id: u64,
    deadline: Instant,
    cancel: &CancellationToken,
) {
    let interval = registry.config().poll_interval();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let token = registry.auth_token();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            response = registry.source().fetch_status(tx_hash, token.as_deref()) => response,
        };

        match response {
            Ok(status) => {
                if registry.apply_status(tx_hash, watch_id, status) == Applied::Finished {
                    return;
                }
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(tx_hash = %tx_hash, attempt, error = %e, "status poll failed");
            }
            Err(e) => {
                tracing::error!(tx_hash = %tx_hash, attempt, error = %e, "status poll rejected");
            }
        }

        if Instant::now() + interval > deadline {
            tracing::warn!(tx_hash = %tx_hash, attempt, "poll deadline reached, giving up");
            registry.release_watch(tx_hash, watch_id);
            return;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
