//! Client configuration from environment variables
//!
//! Controls which node and contract the session talks to and how long
//! the transport waits for transaction receipts.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::abi::AbiDescriptor;
use crate::contract::ContractAddress;
use crate::error::NotesError;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_CONFIRM_POLL_MS: u64 = 1000;
pub const DEFAULT_CONFIRM_ATTEMPTS: u32 = 60;

#[derive(Clone, Debug)]
pub struct NotesConfig {
    /// JSON-RPC endpoint of the node / external signer
    pub rpc_url: String,
    /// Notes contract address (required to connect)
    pub contract_address: Option<String>,
    /// Account to use when the signer exposes several
    pub account: Option<String>,
    /// Compiled contract artifact; the built-in interface is used when unset
    pub abi_path: Option<PathBuf>,
    /// Delay between receipt polls
    pub confirm_poll_interval: Duration,
    /// Receipt polls before a write counts as unconfirmed
    pub confirm_attempts: u32,
}

impl NotesConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `NOTES_RPC_URL`: node endpoint (default `http://127.0.0.1:8545`)
    /// - `NOTES_CONTRACT_ADDRESS`: deployed notes contract
    /// - `NOTES_ACCOUNT`: preferred account (optional)
    /// - `NOTES_ABI_PATH`: contract artifact JSON (optional)
    /// - `NOTES_CONFIRM_POLL_MS`: receipt poll interval (default 1000)
    /// - `NOTES_CONFIRM_ATTEMPTS`: receipt polls before giving up (default 60)
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Local dev node with the mock ledger
    /// NOTES_RPC_URL=http://localhost:8545 \
    /// NOTES_CONTRACT_ADDRESS=0x5FbDB2315678afecb367f032d93F642f64180aa3 \
    /// cargo run -- list
    /// ```
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let rpc_url = non_empty("NOTES_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        log::debug!("📡 RPC URL: {}", rpc_url);

        let contract_address = non_empty("NOTES_CONTRACT_ADDRESS");
        let account = non_empty("NOTES_ACCOUNT");
        let abi_path = non_empty("NOTES_ABI_PATH").map(PathBuf::from);

        let confirm_poll_ms = parse_or(
            non_empty("NOTES_CONFIRM_POLL_MS"),
            "NOTES_CONFIRM_POLL_MS",
            DEFAULT_CONFIRM_POLL_MS,
        );
        let confirm_attempts = parse_or(
            non_empty("NOTES_CONFIRM_ATTEMPTS"),
            "NOTES_CONFIRM_ATTEMPTS",
            DEFAULT_CONFIRM_ATTEMPTS,
        );

        Self {
            rpc_url,
            contract_address,
            account,
            abi_path,
            confirm_poll_interval: Duration::from_millis(confirm_poll_ms),
            confirm_attempts,
        }
    }

    /// Parsed contract address
    pub fn contract(&self) -> Result<ContractAddress, NotesError> {
        let raw = self
            .contract_address
            .as_deref()
            .ok_or_else(|| NotesError::config("NOTES_CONTRACT_ADDRESS is not set"))?;
        ContractAddress::parse(raw)
    }

    /// Contract interface, read from `abi_path` when configured
    pub fn abi(&self) -> Result<AbiDescriptor, NotesError> {
        match &self.abi_path {
            None => Ok(AbiDescriptor::notes_contract()),
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    NotesError::config(format!("Cannot read ABI {}: {}", path.display(), e))
                })?;
                AbiDescriptor::from_artifact_json(&json)
                    .map_err(|e| NotesError::config(format!("{}: {}", path.display(), e)))
            }
        }
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️  Invalid {}={:?}, using {}", key, value, default);
            default
        }),
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract_address: None,
            account: None,
            abi_path: None,
            confirm_poll_interval: Duration::from_millis(DEFAULT_CONFIRM_POLL_MS),
            confirm_attempts: DEFAULT_CONFIRM_ATTEMPTS,
        }
    }
}
