/// In-memory notes contract and chain
///
/// Holds the notes of every account, the pending and mined transactions and
/// a block counter. A submitted write stays pending until its receipt has
/// been polled `pending_polls` times; it is executed (and its note changes
/// become visible) when it is mined.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use ledger_notes::abi::{self, AbiDescriptor};
use ledger_notes::{ChainError, RemoteNote, U256};

use crate::types::{quantity, CallRequest, ReceiptResponse};

pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const DEFAULT_CHAIN_ID: u64 = 31337;
/// Timestamp of block 0
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
pub const BLOCK_TIME_SECS: u64 = 12;

/// Placeholder runtime code reported for the contract address
const CONTRACT_CODE: &[u8] = &[0x60, 0x80, 0x60, 0x40, 0x52];

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("unknown account {0}")]
    UnknownAccount(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("execution reverted: {0}")]
    Reverted(String),
}

impl LedgerError {
    /// JSON-RPC error code
    pub fn code(&self) -> i64 {
        match self {
            Self::InvalidParams(_) => -32602,
            Self::UnknownAccount(_) | Self::Reverted(_) => -32000,
        }
    }
}

impl From<ChainError> for LedgerError {
    fn from(err: ChainError) -> Self {
        Self::InvalidParams(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub accounts: Vec<String>,
    pub contract_address: String,
    /// Receipt polls answered with `null` before a write is mined
    pub pending_polls: u32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            accounts: vec![
                "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string(),
                "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string(),
            ],
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            pending_polls: 1,
        }
    }
}

#[derive(Debug)]
struct PendingTx {
    from: String,
    data: Vec<u8>,
    polls_left: u32,
}

#[derive(Debug, Default)]
struct ChainState {
    block_number: u64,
    tx_count: u64,
    /// Keyed by lowercase account
    notes: HashMap<String, Vec<RemoteNote>>,
    pending: HashMap<String, PendingTx>,
    receipts: HashMap<String, ReceiptResponse>,
}

pub struct MockLedger {
    config: MockConfig,
    abi: AbiDescriptor,
    state: Mutex<ChainState>,
}

impl MockLedger {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            abi: AbiDescriptor::notes_contract(),
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        // A panicking handler cannot leave the maps half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn known_account(&self, address: &str) -> Result<String, LedgerError> {
        self.config
            .accounts
            .iter()
            .find(|a| a.eq_ignore_ascii_case(address))
            .map(|a| a.to_lowercase())
            .ok_or_else(|| LedgerError::UnknownAccount(address.to_string()))
    }

    fn is_contract(&self, address: &str) -> bool {
        self.config.contract_address.eq_ignore_ascii_case(address)
    }

    pub fn accounts(&self) -> Vec<String> {
        self.config.accounts.clone()
    }

    pub fn chain_id(&self) -> u64 {
        DEFAULT_CHAIN_ID
    }

    pub fn block_number(&self) -> u64 {
        self.lock().block_number
    }

    pub fn code_at(&self, address: &str) -> Vec<u8> {
        if self.is_contract(address) {
            CONTRACT_CODE.to_vec()
        } else {
            Vec::new()
        }
    }

    /// Notes currently stored for `account`
    pub fn notes_of(&self, account: &str) -> Vec<RemoteNote> {
        self.lock()
            .notes
            .get(&account.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Read-only contract call
    pub fn call(&self, request: &CallRequest) -> Result<Vec<u8>, LedgerError> {
        let to = request.to.as_deref().unwrap_or_default();
        if !self.is_contract(to) {
            // Plain accounts return no data
            return Ok(Vec::new());
        }

        let data = abi::from_hex(request.data.as_deref().unwrap_or("0x"))?;
        let (selector, _) = abi::split_call(&data)?;
        if selector != self.abi.list_notes_selector() {
            return Err(LedgerError::Reverted(format!("unknown selector {}", selector)));
        }

        // msg.sender is the caller's `from`
        let sender = request.from.as_deref().unwrap_or_default().to_lowercase();
        let notes = self.lock().notes.get(&sender).cloned().unwrap_or_default();
        log::debug!("📖 getMyNotes() for {}: {} note(s)", sender, notes.len());
        Ok(abi::encode_note_list(&notes))
    }

    /// Queue a write signed by one of the managed accounts; returns its hash
    pub fn send_transaction(&self, request: &CallRequest) -> Result<String, LedgerError> {
        let from = self.known_account(request.from.as_deref().unwrap_or_default())?;
        let to = request.to.as_deref().unwrap_or_default();
        if !self.is_contract(to) {
            return Err(LedgerError::InvalidParams(format!("{} is not the notes contract", to)));
        }
        let data = abi::from_hex(request.data.as_deref().unwrap_or("0x"))?;

        let mut state = self.lock();
        state.tx_count += 1;
        let tx_hash = format!("0x{:064x}", state.tx_count);
        state.pending.insert(
            tx_hash.clone(),
            PendingTx {
                from,
                data,
                polls_left: self.config.pending_polls,
            },
        );
        log::info!("📨 Queued {}", tx_hash);

        if self.config.pending_polls == 0 {
            Self::mine(&mut state, &self.abi, &self.config.contract_address, &tx_hash);
        }
        Ok(tx_hash)
    }

    /// Receipt of a mined transaction; pending ones count down towards mining
    pub fn receipt(&self, tx_hash: &str) -> Option<ReceiptResponse> {
        let mut state = self.lock();
        if let Some(receipt) = state.receipts.get(tx_hash) {
            return Some(receipt.clone());
        }

        let pending = state.pending.get_mut(tx_hash)?;
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            log::debug!("⏳ {} pending ({} polls left)", tx_hash, pending.polls_left);
            return None;
        }

        Self::mine(&mut state, &self.abi, &self.config.contract_address, tx_hash)
    }

    /// Mine every queued transaction
    pub fn mine_pending(&self) -> usize {
        let mut state = self.lock();
        let mut hashes: Vec<String> = state.pending.keys().cloned().collect();
        hashes.sort();
        for hash in &hashes {
            Self::mine(&mut state, &self.abi, &self.config.contract_address, hash);
        }
        hashes.len()
    }

    fn mine(
        state: &mut ChainState,
        abi: &AbiDescriptor,
        contract: &str,
        tx_hash: &str,
    ) -> Option<ReceiptResponse> {
        let tx = state.pending.remove(tx_hash)?;
        state.block_number += 1;
        let timestamp = GENESIS_TIMESTAMP + state.block_number * BLOCK_TIME_SECS;

        let success = match Self::execute(state, abi, &tx, timestamp) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("⛔ {} reverted: {}", tx_hash, e);
                false
            }
        };

        let receipt = ReceiptResponse {
            transaction_hash: tx_hash.to_string(),
            block_number: quantity(state.block_number),
            from: tx.from.clone(),
            to: contract.to_string(),
            status: if success { "0x1" } else { "0x0" }.to_string(),
        };
        log::info!("⛏️  Mined {} in block {}", tx_hash, state.block_number);
        state.receipts.insert(tx_hash.to_string(), receipt.clone());
        Some(receipt)
    }

    fn execute(
        state: &mut ChainState,
        abi: &AbiDescriptor,
        tx: &PendingTx,
        timestamp: u64,
    ) -> Result<(), LedgerError> {
        let (selector, args) = abi::split_call(&tx.data)?;
        let notes = state.notes.entry(tx.from.clone()).or_default();

        if selector == abi.add_note_selector() {
            let (title, content) = abi::decode_add_note_args(args)?;
            notes.push(RemoteNote {
                title,
                content,
                timestamp: U256::from(timestamp),
            });
            Ok(())
        } else if selector == abi.delete_note_selector() {
            let index = abi::decode_delete_note_args(args)?;
            match usize::try_from(index).ok() {
                Some(i) if i < notes.len() => {
                    notes.remove(i);
                    Ok(())
                }
                _ => Err(LedgerError::Reverted("Invalid note index".to_string())),
            }
        } else {
            Err(LedgerError::Reverted(format!("unknown selector {}", selector)))
        }
    }
}
