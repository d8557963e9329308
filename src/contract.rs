//! Collaborator seams around the notes contract
//!
//! The session and repository only see these traits. [`crate::rpc`]
//! implements all three against a JSON-RPC node; tests plug in an
//! in-memory ledger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::abi::AbiDescriptor;
use crate::error::{ChainError, NotesError};
use crate::note::RemoteNote;

/// Externally managed account identifier (an address string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account(String);

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Addresses compare case-insensitively (checksum casing is cosmetic)
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of the deployed notes contract
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractAddress(String);

impl ContractAddress {
    /// Accepts a `0x`-prefixed 20-byte hex address
    pub fn parse(address: &str) -> Result<Self, NotesError> {
        let address = address.trim();
        let digits = address
            .strip_prefix("0x")
            .ok_or_else(|| NotesError::config(format!("Contract address {:?} lacks 0x prefix", address)))?;
        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NotesError::config(format!(
                "Contract address {:?} is not 20 bytes of hex",
                address
            )));
        }
        Ok(Self(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of one submitted contract write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Submitted,
    Confirmed,
    Failed,
}

/// In-flight contract write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHandle {
    pub tx_hash: String,
    pub status: TxStatus,
}

impl TransactionHandle {
    pub fn submitted(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            status: TxStatus::Submitted,
        }
    }
}

/// Bridge to whatever holds the user's keys
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Ask the signer for the active account
    ///
    /// Fails with [`NotesError::Connection`] when no signer is reachable or
    /// the request is refused.
    async fn request_account(&self) -> Result<Account, NotesError>;
}

/// Builds a contract handle signed by one account
#[async_trait]
pub trait ContractBinder: Send + Sync {
    /// Fails with [`NotesError::Binding`]
    async fn bind(
        &self,
        account: &Account,
        address: &ContractAddress,
        abi: &AbiDescriptor,
    ) -> Result<Arc<dyn NoteContract>, NotesError>;
}

/// Handle to the notes contract for one account
#[async_trait]
pub trait NoteContract: Send + Sync {
    fn account(&self) -> &Account;

    /// All notes of the bound account in contract order
    async fn list_notes(&self) -> Result<Vec<RemoteNote>, ChainError>;

    async fn create_note(&self, title: &str, content: &str) -> Result<TransactionHandle, ChainError>;

    async fn delete_note(&self, position: u64) -> Result<TransactionHandle, ChainError>;

    /// Wait until the write is mined; updates `tx.status` either way
    async fn await_confirmation(&self, tx: &mut TransactionHandle) -> Result<(), ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_address_parse() {
        let addr = ContractAddress::parse(" 0x5FbDB2315678afecb367f032d93F642f64180aa3 ").unwrap();
        assert_eq!(addr.as_str(), "0x5FbDB2315678afecb367f032d93F642f64180aa3");

        assert!(ContractAddress::parse("5FbDB2315678afecb367f032d93F642f64180aa3").is_err());
        assert!(ContractAddress::parse("0x1234").is_err());
        assert!(ContractAddress::parse("0xZZbDB2315678afecb367f032d93F642f64180aa3").is_err());
    }

    #[test]
    fn test_account_matches_ignoring_case() {
        let account = Account::new("0xAbCd");
        assert!(account.matches("0xabcd"));
        assert!(!account.matches("0xabce"));
    }
}
