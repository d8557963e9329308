//! Session lifecycle and per-session UI state
//!
//! The controller owns the active account, the contract binding built for
//! it and the repository attached to that binding, plus the transient
//! state a front end needs (search, sort, selection, editor). Nothing here
//! is shared with other sessions: a new account gets a fresh binding and
//! repository, and `disconnect` drops all of it without touching the
//! ledger.

use std::sync::Arc;
use tokio::sync::watch;

use crate::abi::AbiDescriptor;
use crate::config::NotesConfig;
use crate::contract::{Account, AccountProvider, ContractAddress, ContractBinder};
use crate::error::NotesError;
use crate::note::{Note, NoteSnapshot};
use crate::repository::{DeleteOutcome, DeletePrompt, NoteRepository};
use crate::rpc::RpcClient;
use crate::view::{self, SortKey, ViewState};
use crate::Result;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Waiting on the signer / binding
    Connecting,
    Connected(Account),
}

impl SessionState {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Connected(account) => Some(account),
            _ => None,
        }
    }
}

/// A note picked in the list, tied to the snapshot it was picked from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    revision: u64,
    position: u64,
}

#[derive(Debug, Clone, Default)]
struct UiState {
    view: ViewState,
    selection: Option<Selection>,
    editor_open: bool,
}

/// Owns one user session against the notes contract
pub struct SessionController {
    provider: Arc<dyn AccountProvider>,
    binder: Arc<dyn ContractBinder>,
    contract: ContractAddress,
    abi: AbiDescriptor,
    state: watch::Sender<SessionState>,
    repository: Option<NoteRepository>,
    ui: UiState,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn AccountProvider>,
        binder: Arc<dyn ContractBinder>,
        contract: ContractAddress,
        abi: AbiDescriptor,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            provider,
            binder,
            contract,
            abi,
            state,
            repository: None,
            ui: UiState::default(),
        }
    }

    /// Session talking JSON-RPC to the configured node
    pub fn from_config(config: &NotesConfig) -> Result<Self> {
        let client = Arc::new(RpcClient::from_config(config));
        Ok(Self::new(
            client.clone(),
            client,
            config.contract()?,
            config.abi()?,
        ))
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn account(&self) -> Option<Account> {
        self.state.borrow().account().cloned()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Connected(_))
    }

    pub fn contract_address(&self) -> &ContractAddress {
        &self.contract
    }

    /// Repository of the connected account
    pub fn repository(&self) -> Option<&NoteRepository> {
        self.repository.as_ref()
    }

    fn connected_repository(&self) -> Result<&NoteRepository> {
        self.repository.as_ref().ok_or(NotesError::NotConnected)
    }

    /// Obtain an account from the signer, bind the contract and load its notes
    ///
    /// - Signer unavailable or refusing: [`NotesError::Connection`]; the
    ///   session stays in whatever state it was in before.
    /// - Binding failure: [`NotesError::Binding`]; the session is torn down.
    /// - Same account as the current session: the binding is kept.
    /// - The initial load failing does not fail the connection; the error
    ///   shows up in the repository's status and the collection stays empty.
    pub async fn connect(&mut self) -> Result<Account> {
        let previous = self.state();
        self.state.send_replace(SessionState::Connecting);
        log::info!("🔌 Connecting session");

        let account = match self.provider.request_account().await {
            Ok(account) => account,
            Err(e) => {
                log::error!("   ❌ Account request failed: {}", e);
                self.state.send_replace(previous);
                return Err(e);
            }
        };

        if previous.account() == Some(&account) && self.repository.is_some() {
            log::info!("   Already connected as {}", account);
            self.state.send_replace(previous);
            return Ok(account);
        }

        if let Some(old) = self.repository.take() {
            log::info!("   🔁 Account changed from {} to {}", old.account(), account);
            self.ui.selection = None;
            self.ui.editor_open = false;
        }

        let contract = match self.binder.bind(&account, &self.contract, &self.abi).await {
            Ok(contract) => contract,
            Err(e) => {
                log::error!("   ❌ Binding failed, disconnecting: {}", e);
                self.disconnect();
                return Err(e);
            }
        };

        let repository = NoteRepository::new(contract);
        self.repository = Some(repository.clone());
        self.state.send_replace(SessionState::Connected(account.clone()));
        log::info!("   ✅ Connected as {}", account);

        if let Err(e) = repository.load().await {
            log::warn!("   ⚠️  Initial load failed: {}", e);
        }

        Ok(account)
    }

    /// Drop account, binding, notes and UI state; makes no remote call
    pub fn disconnect(&mut self) {
        if let Some(account) = self.account() {
            log::info!("🔌 Disconnecting {}", account);
        }
        self.repository = None;
        self.ui = UiState::default();
        self.state.send_replace(SessionState::Disconnected);
    }

    /// Installed collection, empty when disconnected
    pub fn snapshot(&self) -> NoteSnapshot {
        self.repository
            .as_ref()
            .map(NoteRepository::snapshot)
            .unwrap_or_default()
    }

    pub async fn reload(&self) -> Result<NoteSnapshot> {
        self.connected_repository()?.load().await
    }

    /// Create a note; closes the editor once it is on the ledger
    pub async fn add_note(&mut self, title: &str, content: &str) -> Result<NoteSnapshot> {
        let snapshot = self.connected_repository()?.add(title, content).await?;
        self.ui.editor_open = false;
        Ok(snapshot)
    }

    /// Delete a note of the current snapshot; clears the selection once deleted
    pub async fn delete_note(
        &mut self,
        position: u64,
        prompt: &dyn DeletePrompt,
    ) -> Result<DeleteOutcome> {
        let outcome = self.connected_repository()?.delete(position, prompt).await?;
        if let DeleteOutcome::Deleted(_) = outcome {
            self.ui.selection = None;
        }
        Ok(outcome)
    }

    pub fn view(&self) -> &ViewState {
        &self.ui.view
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.ui.view.search_query = query.into();
    }

    pub fn set_sort(&mut self, sort_key: SortKey) {
        self.ui.view.sort_key = sort_key;
    }

    /// Notes to display under the current search and sort
    pub fn visible_notes(&self) -> Vec<Note> {
        view::project(&self.snapshot().notes, &self.ui.view)
    }

    /// Select the note at `position` of the current snapshot
    pub fn select(&mut self, position: u64) -> Result<Note> {
        let snapshot = self.snapshot();
        let note = snapshot
            .at(position)
            .cloned()
            .ok_or_else(|| NotesError::validation(format!("No note at position {}", position)))?;
        self.ui.selection = Some(Selection {
            revision: snapshot.revision,
            position,
        });
        Ok(note)
    }

    pub fn clear_selection(&mut self) {
        self.ui.selection = None;
    }

    /// Selected note, or `None` once the snapshot it came from was replaced
    pub fn selected_note(&self) -> Option<Note> {
        let selection = self.ui.selection?;
        let snapshot = self.snapshot();
        if snapshot.revision != selection.revision {
            return None;
        }
        snapshot.at(selection.position).cloned()
    }

    pub fn open_editor(&mut self) {
        self.ui.editor_open = true;
    }

    pub fn close_editor(&mut self) {
        self.ui.editor_open = false;
    }

    pub fn is_editor_open(&self) -> bool {
        self.ui.editor_open
    }
}
