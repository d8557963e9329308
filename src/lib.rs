//! Ledger Notes: personal notes stored in a ledger contract
//!
//! This crate is the client-side sync layer for a notes contract. Notes
//! live only on the ledger; the client holds a read-only snapshot of the
//! connected account's notes and replaces it wholesale after every
//! confirmed write.
//!
//! # Architecture
//!
//! - **Session Controller**: Obtains an account from the external signer,
//!   binds the contract for it and owns per-session UI state
//! - **Note Repository**: Loads the collection, submits add/delete writes,
//!   waits for confirmation and resynchronizes
//! - **Note View**: Pure search/sort projection of a snapshot
//! - **JSON-RPC Binding**: `eth_call` / `eth_sendTransaction` against an
//!   Ethereum-compatible node whose signer holds the keys
//!
//! # Example
//!
//! ```ignore
//! use ledger_notes::{NotesConfig, SessionController};
//!
//! let config = NotesConfig::from_env();
//! let mut session = SessionController::from_config(&config)?;
//!
//! let account = session.connect().await?;
//! session.add_note("Groceries", "milk, eggs").await?;
//!
//! for note in session.visible_notes() {
//!     println!("{} {}", note.position, note.title);
//! }
//! ```

// Public modules
pub mod abi;
pub mod config;
pub mod contract;
pub mod error;
pub mod note;
pub mod present;
pub mod repository;
pub mod rpc;
pub mod session;
pub mod view;

// Re-exports for convenience
pub use abi::{AbiDescriptor, Selector, U256};
pub use config::NotesConfig;
pub use contract::{
    Account, AccountProvider, ContractAddress, ContractBinder, NoteContract, TransactionHandle,
    TxStatus,
};
pub use error::{ChainError, NotesError};
pub use note::{Note, NoteSnapshot, RemoteNote};
pub use repository::{
    validate_draft, DeleteOutcome, DeletePrompt, MutationKind, NoteRepository, SyncStatus,
};
pub use rpc::{RpcClient, RpcNoteContract};
pub use session::{SessionController, SessionState};
pub use view::{SortKey, ViewState};

// Common result type
pub type Result<T> = std::result::Result<T, NotesError>;
