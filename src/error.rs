//! Error types for ledger note operations
//!
//! Two layers: [`ChainError`] describes what went wrong talking to the
//! node (transport, RPC, ABI, receipts), and [`NotesError`] is what the
//! session and repository surface to a front end. Every remote failure
//! reaches the caller as exactly one `NotesError` variant.

use thiserror::Error;

/// Failure at the ledger transport / contract encoding layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// HTTP request could not be completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Contract call data or return data could not be encoded/decoded
    #[error("ABI error: {0}")]
    Abi(String),

    /// Transaction was mined but reverted
    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    /// Transaction never showed up in a block within the transport's window
    #[error("Transaction {tx_hash} not confirmed after {attempts} attempts")]
    Unconfirmed { tx_hash: String, attempts: u32 },
}

impl ChainError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn abi(msg: impl Into<String>) -> Self {
        Self::Abi(msg.into())
    }
}

/// Error surfaced by the session and note repository
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotesError {
    /// No external signer available, or the account request was rejected
    #[error("Connection error: {0}")]
    Connection(String),

    /// Contract handle could not be constructed for the account
    #[error("Binding error: {0}")]
    Binding(String),

    /// Reading notes failed; the previous collection is still installed
    #[error("Failed to load notes: {0}")]
    Load(#[source] ChainError),

    /// Input rejected locally, nothing was sent to the ledger
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A write was submitted but failed or was not confirmed
    #[error("Failed to {action} note: {source}")]
    Mutation {
        action: &'static str,
        #[source]
        source: ChainError,
    },

    /// Another add/delete is still in flight on this repository
    #[error("Another note operation is still in progress")]
    Busy,

    /// Operation needs a connected session
    #[error("Not connected")]
    NotConnected,

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task ended without reporting a result
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotesError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn binding(msg: impl Into<String>) -> Self {
        Self::Binding(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn mutation(action: &'static str, source: ChainError) -> Self {
        Self::Mutation { action, source }
    }

    /// Whether the user can fix this by simply invoking the same action again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Load(_) | Self::Mutation { .. } | Self::Busy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(NotesError::connection("rejected").is_retryable());
        assert!(NotesError::Load(ChainError::transport("timeout")).is_retryable());
        assert!(NotesError::mutation("add", ChainError::Reverted { tx_hash: "0x1".into() }).is_retryable());
        assert!(NotesError::Busy.is_retryable());

        assert!(!NotesError::validation("empty title").is_retryable());
        assert!(!NotesError::binding("no contract").is_retryable());
        assert!(!NotesError::NotConnected.is_retryable());
        assert!(!NotesError::config("bad url").is_retryable());
    }
}
