//! Note repository: the account's authoritative note collection
//!
//! Every operation goes to the contract and the collection is only ever
//! replaced by a full reload, never patched locally. Positions and
//! timestamps are assigned by the contract, so the client cannot guess
//! them without diverging.
//!
//! # Ordering
//!
//! - Loads are queued to one sync worker per repository at the moment
//!   they are issued, so snapshots are installed in issue order on any
//!   runtime flavor.
//! - At most one add/delete runs per repository; a second one fails fast
//!   with [`NotesError::Busy`] instead of racing the first submission.
//! - Loads run on the worker and writes on their own task. A caller that
//!   stops waiting does not cancel either: a confirmed write is still
//!   followed by a reload and a failure is still recorded in [`SyncStatus`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex, OwnedMutexGuard};

use crate::contract::{Account, NoteContract, TransactionHandle};
use crate::error::{ChainError, NotesError};
use crate::note::{self, Note, NoteSnapshot};
use crate::Result;

/// Which write is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Delete,
}

impl MutationKind {
    fn action(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
        }
    }
}

/// Loading and error signals for a front end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// A load is fetching from the contract
    pub loading: bool,
    /// An add/delete holds the repository
    pub pending: Option<MutationKind>,
    /// Outcome of the most recent operation that failed, cleared on success
    pub last_error: Option<NotesError>,
}

impl SyncStatus {
    pub fn is_idle(&self) -> bool {
        !self.loading && self.pending.is_none()
    }
}

/// Result of a delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Removed on the ledger; this is the reloaded collection
    Deleted(NoteSnapshot),
    /// The user said no; nothing was sent
    Declined,
}

/// Confirmation step every delete goes through
///
/// Implemented for plain closures, e.g. `&|_: &Note| true` when the user
/// already confirmed elsewhere.
#[async_trait]
pub trait DeletePrompt: Send + Sync {
    /// `true` to go ahead with deleting `note`
    async fn confirm_delete(&self, note: &Note) -> bool;
}

#[async_trait]
impl<F> DeletePrompt for F
where
    F: Fn(&Note) -> bool + Send + Sync,
{
    async fn confirm_delete(&self, note: &Note) -> bool {
        self(note)
    }
}

/// Reject drafts with an empty (after trimming) title or content
pub fn validate_draft(title: &str, content: &str) -> Result<()> {
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(NotesError::validation("Please fill in both title and content"));
    }
    Ok(())
}

/// Note collection of one account, bound to one contract handle
///
/// Clones are handles to the same repository.
#[derive(Clone)]
pub struct NoteRepository {
    inner: Arc<RepositoryInner>,
}

struct RepositoryInner {
    collection: Arc<Collection>,
    /// Load requests for the sync worker, in issue order
    loads: mpsc::UnboundedSender<LoadReply>,
    /// Held for the whole add/delete, including its reload
    mutation_gate: Arc<Mutex<()>>,
}

/// State shared between the handles and the sync worker
struct Collection {
    contract: Arc<dyn NoteContract>,
    snapshot: watch::Sender<NoteSnapshot>,
    status: watch::Sender<SyncStatus>,
}

type LoadReply = oneshot::Sender<Result<NoteSnapshot>>;

impl NoteRepository {
    /// Attach to a bound contract; the collection starts empty until [`load`](Self::load)
    ///
    /// Spawns the repository's sync worker, so this must be called from
    /// within a Tokio runtime. The worker exits when the last handle drops.
    pub fn new(contract: Arc<dyn NoteContract>) -> Self {
        let (snapshot, _) = watch::channel(NoteSnapshot::default());
        let (status, _) = watch::channel(SyncStatus::default());
        let collection = Arc::new(Collection {
            contract,
            snapshot,
            status,
        });

        let (loads, requests) = mpsc::unbounded_channel();
        tokio::spawn(sync_worker(collection.clone(), requests));

        Self {
            inner: Arc::new(RepositoryInner {
                collection,
                loads,
                mutation_gate: Arc::new(Mutex::new(())),
            }),
        }
    }

    pub fn account(&self) -> &Account {
        self.inner.collection.contract.account()
    }

    /// Currently installed collection
    pub fn snapshot(&self) -> NoteSnapshot {
        self.inner.collection.snapshot.borrow().clone()
    }

    /// Notified after every install
    pub fn subscribe(&self) -> watch::Receiver<NoteSnapshot> {
        self.inner.collection.snapshot.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.collection.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.collection.status.subscribe()
    }

    /// An add/delete currently holds the repository
    pub fn is_busy(&self) -> bool {
        self.inner.mutation_gate.try_lock().is_err()
    }

    /// Fetch every note of the account and install them as a new snapshot
    ///
    /// On failure the previous snapshot stays installed and
    /// [`NotesError::Load`] is returned. The load takes its place in the
    /// install order on the first poll.
    pub async fn load(&self) -> Result<NoteSnapshot> {
        self.inner.load().await
    }

    /// Create a note, wait for confirmation, then reload
    ///
    /// Empty title or content is rejected with [`NotesError::Validation`]
    /// before anything is sent.
    pub async fn add(&self, title: &str, content: &str) -> Result<NoteSnapshot> {
        validate_draft(title, content)?;
        let permit = self.acquire(MutationKind::Add)?;

        let inner = self.inner.clone();
        let (title, content) = (title.to_string(), content.to_string());
        run_detached(async move {
            let _permit = permit;
            inner.add(title, content).await
        })
        .await
    }

    /// Delete the note at `position` of the current snapshot after `prompt` agrees
    ///
    /// Positions of notes after the deleted one shift down, so positions
    /// held from the old snapshot must not be reused after this returns.
    pub async fn delete(&self, position: u64, prompt: &dyn DeletePrompt) -> Result<DeleteOutcome> {
        // Hold the repository before looking up the note so no other
        // write can shift positions while the user is being asked
        let permit = self.acquire(MutationKind::Delete)?;

        let snapshot = self.snapshot();
        let target = snapshot.at(position).cloned().ok_or_else(|| {
            NotesError::validation(format!(
                "No note at position {} (revision {} has {} notes)",
                position,
                snapshot.revision,
                snapshot.len()
            ))
        })?;

        if !prompt.confirm_delete(&target).await {
            log::info!("🚫 Delete of {:?} declined", target.title);
            return Ok(DeleteOutcome::Declined);
        }

        let inner = self.inner.clone();
        run_detached(async move {
            let _permit = permit;
            inner.delete(target).await
        })
        .await
        .map(DeleteOutcome::Deleted)
    }

    fn acquire(&self, kind: MutationKind) -> Result<OwnedMutexGuard<()>> {
        self.inner.mutation_gate.clone().try_lock_owned().map_err(|_| {
            log::warn!("⏳ Rejecting {}: another write is in flight", kind.action());
            NotesError::Busy
        })
    }
}

/// Fetch and install one collection per request, strictly in arrival order
async fn sync_worker(collection: Arc<Collection>, mut requests: mpsc::UnboundedReceiver<LoadReply>) {
    while let Some(reply) = requests.recv().await {
        let outcome = collection.load().await;
        // The caller may have stopped waiting
        let _ = reply.send(outcome);
    }
    log::debug!("Sync worker for {} stopped", collection.contract.account());
}

impl Collection {
    async fn load(&self) -> Result<NoteSnapshot> {
        log::info!("🔄 Loading notes for {}", self.contract.account());
        self.status.send_modify(|s| s.loading = true);

        let outcome = match self.fetch().await {
            Ok(notes) => {
                let next = self.snapshot.borrow().next(notes);
                self.snapshot.send_replace(next.clone());
                log::info!("   ✅ Installed revision {} ({} notes)", next.revision, next.len());
                Ok(next)
            }
            Err(e) => {
                log::error!("   ❌ Load failed, keeping previous notes: {}", e);
                Err(NotesError::Load(e))
            }
        };

        self.status.send_modify(|s| {
            s.loading = false;
            s.last_error = outcome.as_ref().err().cloned();
        });
        outcome
    }

    async fn fetch(&self) -> std::result::Result<Vec<Note>, ChainError> {
        let remote = self.contract.list_notes().await?;
        note::normalize(remote)
    }
}

impl RepositoryInner {
    async fn load(&self) -> Result<NoteSnapshot> {
        let (reply, outcome) = oneshot::channel();
        self.loads
            .send(reply)
            .map_err(|_| NotesError::Internal("Note sync worker has stopped".to_string()))?;
        outcome
            .await
            .map_err(|_| NotesError::Internal("Note sync worker dropped a load".to_string()))?
    }

    async fn add(&self, title: String, content: String) -> Result<NoteSnapshot> {
        log::info!("➕ Adding note {:?}", title);
        let collection = &self.collection;
        collection.status.send_modify(|s| s.pending = Some(MutationKind::Add));

        let written = async {
            let mut tx = collection.contract.create_note(&title, &content).await?;
            collection.contract.await_confirmation(&mut tx).await?;
            Ok::<_, ChainError>(tx)
        }
        .await;

        self.settle(MutationKind::Add, written).await
    }

    async fn delete(&self, target: Note) -> Result<NoteSnapshot> {
        log::info!("➖ Deleting note {} {:?}", target.position, target.title);
        let collection = &self.collection;
        collection.status.send_modify(|s| s.pending = Some(MutationKind::Delete));

        let written = async {
            let mut tx = collection.contract.delete_note(target.position).await?;
            collection.contract.await_confirmation(&mut tx).await?;
            Ok::<_, ChainError>(tx)
        }
        .await;

        self.settle(MutationKind::Delete, written).await
    }

    /// Record a failed write, or resynchronize after a confirmed one
    async fn settle(
        &self,
        kind: MutationKind,
        written: std::result::Result<TransactionHandle, ChainError>,
    ) -> Result<NoteSnapshot> {
        let outcome = match written {
            Ok(tx) => {
                log::info!("   ✅ {} confirmed by {}", kind.action(), tx.tx_hash);
                self.load().await
            }
            Err(e) => {
                log::error!("   ❌ {} failed: {}", kind.action(), e);
                let error = NotesError::mutation(kind.action(), e);
                self.collection
                    .status
                    .send_modify(|s| s.last_error = Some(error.clone()));
                Err(error)
            }
        };

        self.collection.status.send_modify(|s| s.pending = None);
        outcome
    }
}

/// Run a write on its own task so an abandoned caller does not cancel it
async fn run_detached<T, F>(operation: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| NotesError::Internal(format!("Note task ended abnormally: {}", e)))?
}
