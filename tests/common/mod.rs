//! In-memory ledger for repository and session tests
//!
//! Implements all three collaborator traits. Writes are applied when they
//! are confirmed, like a mined transaction. Failures can be injected per
//! operation and confirmations can be held to keep a write in flight.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use ledger_notes::{
    AbiDescriptor, Account, AccountProvider, ChainError, ContractAddress, ContractBinder,
    NoteContract, NotesError, RemoteNote, TransactionHandle, TxStatus, U256,
};

pub const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const ALICE: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const BOB: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn contract_address() -> ContractAddress {
    ContractAddress::parse(CONTRACT).expect("valid test address")
}

/// What the signer answers to an account request
#[derive(Debug, Clone)]
pub enum Signer {
    Account(String),
    Unavailable,
    Rejected,
}

#[derive(Debug, Clone)]
enum Write {
    Add { title: String, content: String },
    Delete { position: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub request_account: usize,
    pub bind: usize,
    pub list: usize,
    pub create: usize,
    pub delete: usize,
}

struct State {
    signer: Signer,
    notes: HashMap<String, Vec<RemoteNote>>,
    next_timestamp: u64,
    tx_count: u64,
    pending: HashMap<String, (String, Write)>,
    calls: CallCounts,
    fail_bind: bool,
    fail_list: Option<ChainError>,
    fail_submit: Option<ChainError>,
    revert_writes: bool,
}

#[derive(Clone)]
pub struct FakeLedger {
    state: Arc<Mutex<State>>,
    release: Arc<watch::Sender<bool>>,
    answer: Arc<watch::Sender<bool>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        let (release, _) = watch::channel(true);
        let (answer, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(State {
                signer: Signer::Account(ALICE.to_string()),
                notes: HashMap::new(),
                next_timestamp: 2000,
                tx_count: 0,
                pending: HashMap::new(),
                calls: CallCounts::default(),
                fail_bind: false,
                fail_list: None,
                fail_submit: None,
                revert_writes: false,
            })),
            release: Arc::new(release),
            answer: Arc::new(answer),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn provider(&self) -> Arc<dyn AccountProvider> {
        Arc::new(self.clone())
    }

    pub fn binder(&self) -> Arc<dyn ContractBinder> {
        Arc::new(self.clone())
    }

    /// Contract handle for `account`, bypassing the binder
    pub fn contract_for(&self, account: &str) -> Arc<dyn NoteContract> {
        Arc::new(FakeContract {
            ledger: self.clone(),
            account: Account::new(account),
        })
    }

    pub fn set_signer(&self, signer: Signer) {
        self.state().signer = signer;
    }

    /// Store a note directly, as if written from another device
    pub fn seed(&self, account: &str, title: &str, content: &str, timestamp: u64) {
        self.state()
            .notes
            .entry(account.to_lowercase())
            .or_default()
            .push(RemoteNote {
                title: title.to_string(),
                content: content.to_string(),
                timestamp: U256::from(timestamp),
            });
    }

    pub fn seed_raw(&self, account: &str, note: RemoteNote) {
        self.state()
            .notes
            .entry(account.to_lowercase())
            .or_default()
            .push(note);
    }

    pub fn notes_of(&self, account: &str) -> Vec<RemoteNote> {
        self.state()
            .notes
            .get(&account.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn titles_of(&self, account: &str) -> Vec<String> {
        self.notes_of(account).into_iter().map(|n| n.title).collect()
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn fail_bind(&self, fail: bool) {
        self.state().fail_bind = fail;
    }

    pub fn fail_list(&self, error: Option<ChainError>) {
        self.state().fail_list = error;
    }

    pub fn fail_submit(&self, error: Option<ChainError>) {
        self.state().fail_submit = error;
    }

    pub fn revert_writes(&self, revert: bool) {
        self.state().revert_writes = revert;
    }

    /// Keep confirmations waiting until [`release_confirmations`](Self::release_confirmations)
    pub fn hold_confirmations(&self) {
        self.release.send_replace(false);
    }

    pub fn release_confirmations(&self) {
        self.release.send_replace(true);
    }

    /// Keep account requests unanswered until [`answer_accounts`](Self::answer_accounts)
    pub fn hold_accounts(&self) {
        self.answer.send_replace(false);
    }

    pub fn answer_accounts(&self) {
        self.answer.send_replace(true);
    }
}

#[async_trait]
impl AccountProvider for FakeLedger {
    async fn request_account(&self) -> Result<Account, NotesError> {
        let mut answer = self.answer.subscribe();
        answer
            .wait_for(|answered| *answered)
            .await
            .map_err(|e| NotesError::connection(e.to_string()))?;

        let mut state = self.state();
        state.calls.request_account += 1;
        match &state.signer {
            Signer::Account(address) => Ok(Account::new(address.clone())),
            Signer::Unavailable => Err(NotesError::connection("No external signer available")),
            Signer::Rejected => Err(NotesError::connection("User rejected the request")),
        }
    }
}

#[async_trait]
impl ContractBinder for FakeLedger {
    async fn bind(
        &self,
        account: &Account,
        address: &ContractAddress,
        _abi: &AbiDescriptor,
    ) -> Result<Arc<dyn NoteContract>, NotesError> {
        let mut state = self.state();
        state.calls.bind += 1;
        if state.fail_bind || address.as_str() != CONTRACT {
            return Err(NotesError::binding(format!("No contract at {}", address)));
        }
        drop(state);
        Ok(self.contract_for(account.as_str()))
    }
}

pub struct FakeContract {
    ledger: FakeLedger,
    account: Account,
}

impl FakeContract {
    fn submit(&self, write: Write) -> Result<TransactionHandle, ChainError> {
        let mut state = self.ledger.state();
        if let Some(error) = state.fail_submit.clone() {
            return Err(error);
        }
        state.tx_count += 1;
        let tx_hash = format!("0x{:064x}", state.tx_count);
        state
            .pending
            .insert(tx_hash.clone(), (self.account.as_str().to_lowercase(), write));
        Ok(TransactionHandle::submitted(tx_hash))
    }
}

#[async_trait]
impl NoteContract for FakeContract {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn list_notes(&self) -> Result<Vec<RemoteNote>, ChainError> {
        let mut state = self.ledger.state();
        state.calls.list += 1;
        if let Some(error) = state.fail_list.clone() {
            return Err(error);
        }
        Ok(state
            .notes
            .get(&self.account.as_str().to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn create_note(&self, title: &str, content: &str) -> Result<TransactionHandle, ChainError> {
        self.ledger.state().calls.create += 1;
        self.submit(Write::Add {
            title: title.to_string(),
            content: content.to_string(),
        })
    }

    async fn delete_note(&self, position: u64) -> Result<TransactionHandle, ChainError> {
        self.ledger.state().calls.delete += 1;
        self.submit(Write::Delete { position })
    }

    async fn await_confirmation(&self, tx: &mut TransactionHandle) -> Result<(), ChainError> {
        let mut release = self.ledger.release.subscribe();
        release
            .wait_for(|released| *released)
            .await
            .map_err(|e| ChainError::transport(e.to_string()))?;

        let mut state = self.ledger.state();
        let (account, write) = state
            .pending
            .remove(&tx.tx_hash)
            .ok_or_else(|| ChainError::invalid_response("unknown transaction"))?;

        let reverted = ChainError::Reverted {
            tx_hash: tx.tx_hash.clone(),
        };
        if state.revert_writes {
            tx.status = TxStatus::Failed;
            return Err(reverted);
        }

        let timestamp = state.next_timestamp;
        let notes = state.notes.entry(account).or_default();
        match write {
            Write::Add { title, content } => notes.push(RemoteNote {
                title,
                content,
                timestamp: U256::from(timestamp),
            }),
            Write::Delete { position } => {
                if position as usize >= notes.len() {
                    tx.status = TxStatus::Failed;
                    return Err(reverted);
                }
                notes.remove(position as usize);
            }
        }
        state.next_timestamp += 1000;
        tx.status = TxStatus::Confirmed;
        Ok(())
    }
}
