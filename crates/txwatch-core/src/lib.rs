//! txwatch-core — process-wide transaction confirmation watcher.
//!
//! # Overview
//!
//! After a signed transaction is submitted, [`TxRegistry::register`] starts a
//! detached watch that follows its confirmation to a terminal state,
//! independently of whichever view is on screen. The core crate defines:
//!
//! - [`TxRegistry`] — the keyed store owning one watch task per transaction
//! - [`SseParser`] / [`TxEvent`] — incremental event-stream framing and typed events
//! - [`StatusSource`] — the async trait stream/poll transports implement
//! - [`Notifier`] — where completion notifications and pending-indicator updates go
//! - [`TxObserver`] — RAII subscriber that takes over notification while mounted
//! - [`WatchError`] — structured error type
//!
//! A watch reads the event stream; if the stream fails or ends before a
//! terminal state it switches to polling without telling the caller. On the
//! terminal state exactly one notification reaches the user: from the
//! registry when nobody observes the transaction, otherwise from one observer.

pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod observer;
pub mod registry;
pub mod sse;
pub mod status;
pub mod transport;

mod poll;
mod watch;

pub use config::WatcherConfig;
pub use error::WatchError;
pub use event::{CompletePayload, TxEvent};
pub use notify::{ChannelNotifier, Notification, NotificationKind, Notifier, NotifierEvent, TracingNotifier};
pub use observer::TxObserver;
pub use registry::{TxRegistry, TxUpdate, WatchedTxSnapshot};
pub use sse::{SseParser, SseRecord};
pub use status::{NotificationTemplate, TxHash, TxState, TxStatus, TxType};
pub use transport::{ByteStream, StatusSource};
