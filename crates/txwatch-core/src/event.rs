//! Typed transaction events decoded from [`SseRecord`]s.

use serde::Deserialize;

use crate::error::WatchError;
use crate::sse::SseRecord;
use crate::status::{TxState, TxStatus, TxType};

/// Event names the watcher acts on.
pub const EVENT_STATE: &str = "state";
pub const EVENT_STATE_CHANGE: &str = "state_change";
pub const EVENT_COMPLETE: &str = "complete";

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum TxEvent {
    /// Full status snapshot; finalizes if already terminal.
    State(TxStatus),
    /// Partial update carrying only the new state.
    StateChange { new_state: TxState },
    /// Final snapshot; always finalizes.
    Complete(CompletePayload),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct StateChangePayload {
    new_state: TxState,
}

/// Payload of the `complete` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletePayload {
    pub final_state: TxState,
    #[serde(default)]
    pub tx_type: Option<TxType>,
    #[serde(default)]
    pub confirmed_at: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl TxEvent {
    /// Decode a record.
    ///
    /// Returns `Ok(None)` for names the watcher ignores (heartbeats, unknown
    /// events) and `Err` for a known name with an unusable payload.
    pub fn from_record(record: &SseRecord) -> Result<Option<Self>, WatchError> {
        let malformed = |e: serde_json::Error| WatchError::MalformedEvent {
            event: record.event.clone(),
            reason: e.to_string(),
        };

        let event = match record.event.as_str() {
            EVENT_STATE => Self::State(serde_json::from_str(&record.data).map_err(malformed)?),
            EVENT_STATE_CHANGE => {
                let payload: StateChangePayload =
                    serde_json::from_str(&record.data).map_err(malformed)?;
                Self::StateChange { new_state: payload.new_state }
            }
            EVENT_COMPLETE => Self::Complete(serde_json::from_str(&record.data).map_err(malformed)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::State(_) => EVENT_STATE,
            Self::StateChange { .. } => EVENT_STATE_CHANGE,
            Self::Complete(_) => EVENT_COMPLETE,
        }
    }
}
