//! User-facing notifications and the sink they are delivered to.

use tokio::sync::mpsc;

use crate::status::{NotificationTemplate, TxHash, TxStatus};

/// Text shown on the pending indicator once the transaction is on-chain.
pub const CONFIRMED_PENDING_MESSAGE: &str = "Confirmed on-chain, updating database…";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A completion notification for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub tx_hash: TxHash,
    pub kind: NotificationKind,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    /// Build the notification for a terminal `status` from the registration template.
    pub fn for_terminal(tx_hash: &TxHash, template: &NotificationTemplate, status: &TxStatus) -> Self {
        if status.state.is_success() {
            Self {
                tx_hash: tx_hash.clone(),
                kind: NotificationKind::Success,
                title: template.success_title.clone(),
                description: Some(template.success_description.clone()),
            }
        } else {
            Self {
                tx_hash: tx_hash.clone(),
                kind: NotificationKind::Error,
                title: template.error_title.clone(),
                description: template
                    .error_description
                    .clone()
                    .or_else(|| status.last_error.clone()),
            }
        }
    }
}

/// Where notifications and pending-indicator updates go.
///
/// Called outside the registry lock, so implementations may call back into
/// the registry.
pub trait Notifier: Send + Sync + 'static {
    /// Show a completion notification.
    fn notify(&self, notification: Notification);

    /// Replace the text of the pending indicator for `tx_hash`, if one is shown.
    fn update_pending(&self, tx_hash: &TxHash, message: &str);

    /// Remove the pending indicator for `tx_hash`. Must be idempotent.
    fn dismiss_pending(&self, tx_hash: &TxHash);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => tracing::info!(
                tx_hash = %notification.tx_hash,
                title = %notification.title,
                description = notification.description.as_deref().unwrap_or(""),
                "transaction succeeded"
            ),
            NotificationKind::Error => tracing::warn!(
                tx_hash = %notification.tx_hash,
                title = %notification.title,
                description = notification.description.as_deref().unwrap_or(""),
                "transaction failed"
            ),
        }
    }

    fn update_pending(&self, tx_hash: &TxHash, message: &str) {
        tracing::info!(tx_hash = %tx_hash, "{message}");
    }

    fn dismiss_pending(&self, tx_hash: &TxHash) {
        tracing::debug!(tx_hash = %tx_hash, "pending indicator dismissed");
    }
}

/// Everything a [`ChannelNotifier`] forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    Notify(Notification),
    UpdatePending { tx_hash: TxHash, message: String },
    DismissPending(TxHash),
}

/// Notifier forwarding every call into an unbounded channel, for UI layers
/// that render on their own task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<NotifierEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotifierEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: NotifierEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        self.forward(NotifierEvent::Notify(notification));
    }

    fn update_pending(&self, tx_hash: &TxHash, message: &str) {
        self.forward(NotifierEvent::UpdatePending {
            tx_hash: tx_hash.clone(),
            message: message.to_string(),
        });
    }

    fn dismiss_pending(&self, tx_hash: &TxHash) {
        self.forward(NotifierEvent::DismissPending(tx_hash.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TxState;

    fn template(error_description: Option<&str>) -> NotificationTemplate {
        NotificationTemplate {
            success_title: "Task submitted".into(),
            success_description: "Your task is on-chain.".into(),
            error_title: "Submission failed".into(),
            error_description: error_description.map(str::to_string),
        }
    }

    #[test]
    fn success_uses_template() {
        let status = TxStatus::with_state(TxState::Updated);
        let n = Notification::for_terminal(&TxHash::new("abc123"), &template(None), &status);
        assert_eq!(n.kind, NotificationKind::Success);
        assert_eq!(n.title, "Task submitted");
        assert_eq!(n.description.as_deref(), Some("Your task is on-chain."));
    }

    #[test]
    fn error_falls_back_to_last_error() {
        let mut status = TxStatus::with_state(TxState::Failed);
        status.last_error = Some("insufficient funds".into());
        let n = Notification::for_terminal(&TxHash::new("abc123"), &template(None), &status);
        assert_eq!(n.kind, NotificationKind::Error);
        assert_eq!(n.description.as_deref(), Some("insufficient funds"));

        let n = Notification::for_terminal(&TxHash::new("abc123"), &template(Some("Try again")), &status);
        assert_eq!(n.description.as_deref(), Some("Try again"));
    }

    #[test]
    fn expired_is_an_error() {
        let status = TxStatus::with_state(TxState::Expired);
        let n = Notification::for_terminal(&TxHash::new("abc123"), &template(None), &status);
        assert_eq!(n.kind, NotificationKind::Error);
        assert_eq!(n.description, None);
    }

    #[test]
    fn channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let hash = TxHash::new("abc123");
        notifier.update_pending(&hash, CONFIRMED_PENDING_MESSAGE);
        notifier.dismiss_pending(&hash);
        assert!(matches!(rx.try_recv().unwrap(), NotifierEvent::UpdatePending { .. }));
        assert_eq!(rx.try_recv().unwrap(), NotifierEvent::DismissPending(hash));
    }
}
