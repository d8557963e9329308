// JSON-RPC ledger binding
//
// Talks to an Ethereum-compatible node whose external signer manages the
// user's keys. It handles:
// - Account discovery (eth_accounts)
// - Contract binding checks (eth_getCode + ABI descriptor)
// - Note reads via eth_call
// - Note writes via eth_sendTransaction (signed by the node)
// - Receipt polling for confirmation

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::abi::{self, AbiDescriptor};
use crate::config::NotesConfig;
use crate::contract::{
    Account, AccountProvider, ContractAddress, ContractBinder, NoteContract, TransactionHandle,
    TxStatus,
};
use crate::error::{ChainError, NotesError};
use crate::note::RemoteNote;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Subset of a transaction receipt the client cares about
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

/// JSON-RPC client for the node holding the user's account
///
/// Cheap to clone; clones share the HTTP connection pool and request ids.
#[derive(Clone)]
pub struct RpcClient {
    /// HTTP client (reqwest::Client is internally Arc-based)
    http_client: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
    /// Account to pick when the signer exposes several
    preferred_account: Option<String>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        let defaults = NotesConfig::default();
        Self {
            http_client: reqwest::Client::new(),
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
            preferred_account: None,
            poll_interval: defaults.confirm_poll_interval,
            max_attempts: defaults.confirm_attempts,
        }
    }

    /// Client for the configured endpoint, account preference and receipt window
    pub fn from_config(config: &NotesConfig) -> Self {
        Self::new(config.rpc_url.clone())
            .with_preferred_account(config.account.clone())
            .with_confirmation(config.confirm_poll_interval, config.confirm_attempts)
    }

    pub fn with_preferred_account(mut self, account: Option<String>) -> Self {
        self.preferred_account = account;
        self
    }

    /// Receipt polling window; `attempts` is clamped to at least one poll
    pub fn with_confirmation(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one JSON-RPC request and deserialize its `result`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("   ➡️  RPC #{} {} {}", id, method, params);

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::transport(format!("{} request failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(ChainError::transport(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::invalid_response(format!("{}: {}", method, e)))?;

        if let Some(error) = envelope.error {
            log::debug!("   ⬅️  RPC #{} error {}: {}", id, error.code, error.message);
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(envelope.result)
            .map_err(|e| ChainError::invalid_response(format!("{} result: {}", method, e)))
    }
}

#[async_trait]
impl AccountProvider for RpcClient {
    async fn request_account(&self) -> Result<Account, NotesError> {
        log::info!("🔑 Requesting account from signer at {}", self.url);

        let accounts: Vec<String> = self.request("eth_accounts", json!([])).await.map_err(|e| {
            log::error!("   ❌ Signer unreachable: {}", e);
            NotesError::connection(format!("No external signer available: {}", e))
        })?;

        log::debug!("   Signer exposes {} account(s)", accounts.len());

        let chosen = match &self.preferred_account {
            Some(preferred) => accounts
                .iter()
                .find(|a| a.eq_ignore_ascii_case(preferred.trim()))
                .ok_or_else(|| {
                    log::error!("   ❌ Signer does not expose {}", preferred);
                    NotesError::connection(format!(
                        "Account request rejected: signer does not manage {}",
                        preferred
                    ))
                })?,
            None => accounts.first().ok_or_else(|| {
                log::error!("   ❌ Signer has no accounts");
                NotesError::connection("No external signer account available")
            })?,
        };

        log::info!("   ✅ Using account {}", chosen);
        Ok(Account::new(chosen.clone()))
    }
}

#[async_trait]
impl ContractBinder for RpcClient {
    async fn bind(
        &self,
        account: &Account,
        address: &ContractAddress,
        abi: &AbiDescriptor,
    ) -> Result<Arc<dyn NoteContract>, NotesError> {
        log::info!("🔗 Binding notes contract {} for {}", address, account);

        let code: String = self
            .request("eth_getCode", json!([address.as_str(), "latest"]))
            .await
            .map_err(|e| {
                log::error!("   ❌ Could not inspect contract: {}", e);
                NotesError::binding(format!("Cannot inspect {}: {}", address, e))
            })?;

        let code = abi::from_hex(&code)
            .map_err(|e| NotesError::binding(format!("Bad code for {}: {}", address, e)))?;
        if code.is_empty() {
            log::error!("   ❌ No contract deployed at {}", address);
            return Err(NotesError::binding(format!("No contract deployed at {}", address)));
        }

        log::debug!(
            "   Selectors: list={} add={} delete={}",
            abi.list_notes_selector(),
            abi.add_note_selector(),
            abi.delete_note_selector()
        );

        Ok(Arc::new(RpcNoteContract {
            client: self.clone(),
            account: account.clone(),
            address: address.clone(),
            abi: abi.clone(),
        }))
    }
}

/// Notes contract bound to one account over JSON-RPC
pub struct RpcNoteContract {
    client: RpcClient,
    account: Account,
    address: ContractAddress,
    abi: AbiDescriptor,
}

impl RpcNoteContract {
    fn call_object(&self, data: &[u8]) -> Value {
        json!({
            "from": self.account.as_str(),
            "to": self.address.as_str(),
            "data": abi::to_hex(data),
        })
    }

    async fn send_transaction(&self, data: &[u8]) -> Result<TransactionHandle, ChainError> {
        let tx_hash: String = self
            .client
            .request("eth_sendTransaction", json!([self.call_object(data)]))
            .await?;
        log::info!("   📨 Submitted {}", tx_hash);
        Ok(TransactionHandle::submitted(tx_hash))
    }
}

#[async_trait]
impl NoteContract for RpcNoteContract {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn list_notes(&self) -> Result<Vec<RemoteNote>, ChainError> {
        log::debug!("🔍 getMyNotes() for {}", self.account);

        let data: String = self
            .client
            .request(
                "eth_call",
                json!([self.call_object(&self.abi.encode_list_notes()), "latest"]),
            )
            .await?;

        let notes = abi::decode_note_list(&abi::from_hex(&data)?)?;
        log::debug!("   📥 {} note(s)", notes.len());
        Ok(notes)
    }

    async fn create_note(&self, title: &str, content: &str) -> Result<TransactionHandle, ChainError> {
        log::info!("📝 addNote() for {} ({} bytes)", self.account, title.len() + content.len());
        self.send_transaction(&self.abi.encode_add_note(title, content))
            .await
    }

    async fn delete_note(&self, position: u64) -> Result<TransactionHandle, ChainError> {
        log::info!("🗑️  deleteNote({}) for {}", position, self.account);
        self.send_transaction(&self.abi.encode_delete_note(position))
            .await
    }

    async fn await_confirmation(&self, tx: &mut TransactionHandle) -> Result<(), ChainError> {
        let max_attempts = self.client.max_attempts;

        for attempt in 1..=max_attempts {
            let receipt: Result<Option<Receipt>, ChainError> = self
                .client
                .request("eth_getTransactionReceipt", json!([tx.tx_hash]))
                .await;

            match receipt {
                Ok(Some(receipt)) => {
                    let block = receipt.block_number.as_deref().unwrap_or("?");
                    return match receipt.status.as_deref() {
                        Some("0x0") => {
                            log::error!("   ❌ {} reverted in block {}", tx.tx_hash, block);
                            tx.status = TxStatus::Failed;
                            Err(ChainError::Reverted {
                                tx_hash: tx.tx_hash.clone(),
                            })
                        }
                        _ => {
                            log::info!("   ✅ {} confirmed in block {}", tx.tx_hash, block);
                            tx.status = TxStatus::Confirmed;
                            Ok(())
                        }
                    };
                }
                Ok(None) => {
                    log::debug!("   ⏳ {} pending ({}/{})", tx.tx_hash, attempt, max_attempts);
                }
                Err(e) => {
                    // Receipt not readable yet, keep waiting
                    log::warn!("   ⚠️  Receipt poll {} failed: {}", attempt, e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.client.poll_interval).await;
            }
        }

        tx.status = TxStatus::Failed;
        Err(ChainError::Unconfirmed {
            tx_hash: tx.tx_hash.clone(),
            attempts: max_attempts,
        })
    }
}
