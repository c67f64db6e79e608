//! `TxObserver`: a mounted view of one watched transaction.
//!
//! Creating an observer counts as a subscriber; dropping it releases the
//! count. While at least one observer is attached when the transaction
//! finishes, the registry stays silent and exactly one observer obtains the
//! notification through [`TxObserver::claim_notification`]. If none claims it
//! before the last one is dropped, the registry shows it after all.
//!
//! A subscriber registered with the bare
//! [`TxRegistry::increment_subscriber`] owns the notification outright: when
//! one is mounted at terminal time, observers cannot claim it and the
//! registry never shows it.

use tokio::sync::broadcast::{self, error::RecvError};

use crate::notify::Notification;
use crate::registry::{TxRegistry, TxUpdate};
use crate::status::{TxHash, TxStatus};

pub struct TxObserver {
    registry: TxRegistry,
    tx_hash: TxHash,
    updates: broadcast::Receiver<TxUpdate>,
}

impl TxObserver {
    pub(crate) fn attach(registry: TxRegistry, tx_hash: TxHash) -> Option<Self> {
        // subscribe first so nothing between the count and the first recv is lost
        let updates = registry.subscribe_updates();
        if !registry.attach_observer(&tx_hash) {
            return None;
        }
        Some(Self {
            registry,
            tx_hash,
            updates,
        })
    }

    pub fn tx_hash(&self) -> &TxHash {
        &self.tx_hash
    }

    /// Current status, `None` before the first event or once the entry is gone.
    pub fn status(&self) -> Option<TxStatus> {
        self.registry
            .get_watched_tx(&self.tx_hash)
            .and_then(|snapshot| snapshot.status)
    }

    /// Next update for this transaction. `None` once the registry is gone.
    pub async fn next_update(&mut self) -> Option<TxUpdate> {
        loop {
            match self.updates.recv().await {
                Ok(update) if update.tx_hash() == &self.tx_hash => return Some(update),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(tx_hash = %self.tx_hash, skipped, "observer lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the terminal status. Returns immediately if it is already
    /// known, and `None` if the entry is removed first.
    pub async fn wait_terminal(&mut self) -> Option<TxStatus> {
        loop {
            let snapshot = self.registry.get_watched_tx(&self.tx_hash)?;
            if snapshot.is_terminal {
                return snapshot.status;
            }

            loop {
                match self.updates.recv().await {
                    Ok(TxUpdate::Status {
                        tx_hash,
                        status,
                        is_terminal: true,
                    }) if tx_hash == self.tx_hash => return Some(status),
                    Ok(TxUpdate::Removed { tx_hash }) if tx_hash == self.tx_hash => return None,
                    Ok(_) => continue,
                    // missed updates; re-read the entry
                    Err(RecvError::Lagged(_)) => break,
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    }

    /// Take responsibility for showing the completion notification.
    ///
    /// `Some` for exactly one caller across all observers of a transaction
    /// that finished while observed; `None` otherwise.
    pub fn claim_notification(&self) -> Option<Notification> {
        self.registry.claim_notification(&self.tx_hash)
    }
}

impl Drop for TxObserver {
    fn drop(&mut self) {
        self.registry.detach_observer(&self.tx_hash);
    }
}

impl std::fmt::Debug for TxObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxObserver")
            .field("tx_hash", &self.tx_hash)
            .finish()
    }
}
