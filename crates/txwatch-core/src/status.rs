//! Transaction identity and lifecycle types.

use serde::{Deserialize, Serialize};

use crate::error::WatchError;

/// Opaque transaction identifier, the registry's primary key.
///
/// On-chain hashes are 64 hex characters, but the watcher never relies on
/// that; use [`TxHash::parse`] at input boundaries to enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Parse a hash, requiring exactly 64 hex characters.
    pub fn parse(hash: &str) -> Result<Self, WatchError> {
        let candidate = Self::new(hash.trim());
        if candidate.is_well_formed() {
            Ok(candidate)
        } else {
            Err(WatchError::InvalidTxHash(hash.to_string()))
        }
    }

    /// Returns `true` if this is 64 hex characters.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 64 && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TxHash {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TxHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag of the domain operation a transaction performs (e.g. `"task_submit"`).
///
/// Only used to label notifications and logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxType(String);

impl TxType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TxType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    /// Submitted, awaiting on-chain confirmation.
    Pending,
    /// Seen on-chain, database update in progress.
    Confirmed,
    /// Database reconciliation complete.
    Updated,
    /// Transaction or reconciliation failed.
    Failed,
    /// Not confirmed within the allowed window.
    Expired,
}

impl TxState {
    /// No further transitions happen from a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Updated | Self::Failed | Self::Expired)
    }

    /// Terminal and successful.
    pub fn is_success(self) -> bool {
        self == Self::Updated
    }

    /// Position in the forward-only ordering pending < confirmed < terminal.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Confirmed => 1,
            Self::Updated | Self::Failed | Self::Expired => 2,
        }
    }
}

impl std::fmt::Display for TxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Updated => write!(f, "updated"),
            Self::Failed => write!(f, "failed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Status snapshot, shaped like the `state` stream event and the poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<TxType>,
    pub state: TxState,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TxStatus {
    /// A bare status carrying only `state`.
    pub fn with_state(state: TxState) -> Self {
        Self {
            tx_hash: None,
            tx_type: None,
            state,
            retry_count: 0,
            confirmed_at: None,
            last_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Caller-supplied notification texts, fixed at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub success_title: String,
    pub success_description: String,
    pub error_title: String,
    /// Falls back to the status' `last_error` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}
