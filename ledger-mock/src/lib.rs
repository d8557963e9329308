/// Ledger Mock Server Library
///
/// An in-memory Ethereum-style JSON-RPC node hosting the notes contract,
/// usable as a standalone binary or embedded in tests.

pub mod handlers;
pub mod ledger;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use ledger::{LedgerError, MockConfig, MockLedger};
pub use server::{create_router, run_server, spawn_server};
pub use types::*;
