//! The `StatusSource` trait: where transaction status comes from.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::WatchError;
use crate::status::{TxHash, TxStatus};

/// Raw body chunks of an event stream, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, WatchError>>;

/// Server endpoints the watcher consumes.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one source is shared by every
/// watch task through `Arc<dyn StatusSource>`.
///
/// # Cancellation
/// Futures returned here may be dropped at any await point when a watch is
/// cancelled. Implementations must not treat that as an error.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    /// Open the event stream for `tx_hash`.
    ///
    /// `Err` means the connection could not be established (transport error,
    /// non-2xx status, missing body).
    async fn open_stream(
        &self,
        tx_hash: &TxHash,
        auth_token: Option<&str>,
    ) -> Result<ByteStream, WatchError>;

    /// Fetch the current status once.
    async fn fetch_status(
        &self,
        tx_hash: &TxHash,
        auth_token: Option<&str>,
    ) -> Result<TxStatus, WatchError>;

    /// Return the source's identifier (base URL or name).
    fn url(&self) -> &str;
}
