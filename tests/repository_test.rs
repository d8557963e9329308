//! NoteRepository Integration Tests
//!
//! Exercises load/add/delete against the in-memory ledger in
//! `common`, including failure injection and single-flight behavior.
//!
//! Run with: cargo test --test repository_test -- --nocapture

mod common;

use common::{init_logger, FakeLedger, ALICE, BOB};
use ledger_notes::{
    ChainError, DeleteOutcome, MutationKind, Note, NoteRepository, NotesError, RemoteNote,
    U256,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn repository(ledger: &FakeLedger) -> NoteRepository {
    init_logger();
    NoteRepository::new(ledger.contract_for(ALICE))
}

fn titles(repo: &NoteRepository) -> Vec<String> {
    repo.snapshot().notes.iter().map(|n| n.title.clone()).collect()
}

fn yes(_: &Note) -> bool {
    true
}

fn no(_: &Note) -> bool {
    false
}

/// Wait until a write holds the repository
async fn wait_for_pending(repo: &NoteRepository) {
    let mut status = repo.watch_status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.pending.is_some()),
    )
    .await
    .expect("write never started")
    .expect("status channel closed");
}

#[tokio::test]
async fn test_load_mirrors_remote_order() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "b", "second", 50);
    ledger.seed(ALICE, "a", "first", 10);
    ledger.seed(ALICE, "c", "third", 30);
    ledger.seed(BOB, "bob", "not mine", 1);
    let repo = repository(&ledger);

    let snapshot = repo.load().await?;

    assert_eq!(snapshot.revision, 1);
    assert_eq!(titles(&repo), vec!["b", "a", "c"]);
    let positions: Vec<u64> = snapshot.notes.iter().map(|n| n.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(snapshot.notes[0].timestamp, 50);
    assert!(repo.status().is_idle());
    assert!(repo.status().last_error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_load_failure_keeps_previous_collection() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "kept", "x", 1);
    let repo = repository(&ledger);
    let before = repo.load().await?;

    ledger.fail_list(Some(ChainError::transport("node down")));
    let result = repo.load().await;

    assert!(matches!(result, Err(NotesError::Load(ChainError::Transport(_)))));
    assert_eq!(repo.snapshot(), before);
    assert!(matches!(repo.status().last_error, Some(NotesError::Load(_))));

    // Next successful load clears the error
    ledger.fail_list(None);
    repo.load().await?;
    assert!(repo.status().last_error.is_none());
    assert_eq!(repo.snapshot().revision, 2);
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_timestamp_fails_whole_load() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "fine", "x", 1);
    ledger.seed_raw(
        ALICE,
        RemoteNote {
            title: "huge".to_string(),
            content: "y".to_string(),
            timestamp: U256::MAX,
        },
    );
    let repo = repository(&ledger);

    let result = repo.load().await;

    assert!(matches!(result, Err(NotesError::Load(ChainError::InvalidResponse(_)))));
    assert!(repo.snapshot().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_add_rejects_empty_fields_without_remote_call() {
    let ledger = FakeLedger::new();
    let repo = repository(&ledger);

    for (title, content) in [("", "x"), ("x", ""), ("   ", "x"), ("x", " \n ")] {
        let result = repo.add(title, content).await;
        assert!(
            matches!(result, Err(NotesError::Validation(_))),
            "{:?}/{:?} was accepted",
            title,
            content
        );
    }

    assert_eq!(ledger.calls().create, 0);
    assert_eq!(ledger.calls().list, 0);
}

#[tokio::test]
async fn test_add_reloads_instead_of_appending() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    let repo = repository(&ledger);
    repo.load().await?;

    let snapshot = repo.add("  padded title ", "body").await?;

    // Content goes to the contract as typed; the new note comes from the reload
    assert_eq!(ledger.titles_of(ALICE), vec!["  padded title "]);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.notes[0].timestamp, 2000);
    assert_eq!(snapshot.revision, 2);
    assert_eq!(ledger.calls().list, 2);
    assert!(repo.status().is_idle());
    Ok(())
}

#[tokio::test]
async fn test_add_failure_leaves_collection_unchanged() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "existing", "x", 1);
    let repo = repository(&ledger);
    let before = repo.load().await?;

    ledger.revert_writes(true);
    let result = repo.add("new", "note").await;

    match result {
        Err(NotesError::Mutation { action, source }) => {
            assert_eq!(action, "add");
            assert!(matches!(source, ChainError::Reverted { .. }));
        }
        other => panic!("expected mutation error, got {:?}", other),
    }
    assert_eq!(repo.snapshot(), before);
    assert_eq!(ledger.calls().list, 1);
    assert!(matches!(
        repo.status().last_error,
        Some(NotesError::Mutation { .. })
    ));
    assert_eq!(repo.status().pending, None);

    // Submission failures are mutation errors too
    ledger.revert_writes(false);
    ledger.fail_submit(Some(ChainError::Rpc {
        code: 4001,
        message: "User denied transaction signature".to_string(),
    }));
    assert!(matches!(
        repo.add("new", "note").await,
        Err(NotesError::Mutation { .. })
    ));
    assert_eq!(repo.snapshot(), before);
    Ok(())
}

#[tokio::test]
async fn test_delete_removes_matching_note_and_shifts_positions() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "a", "1", 1);
    ledger.seed(ALICE, "b", "2", 2);
    ledger.seed(ALICE, "c", "3", 3);
    let repo = repository(&ledger);
    repo.load().await?;

    let outcome = repo.delete(1, &yes).await?;

    let snapshot = match outcome {
        DeleteOutcome::Deleted(snapshot) => snapshot,
        DeleteOutcome::Declined => panic!("delete was confirmed"),
    };
    assert_eq!(titles(&repo), vec!["a", "c"]);
    assert_eq!(snapshot.at(1).map(|n| n.title.as_str()), Some("c"));
    assert_eq!(ledger.titles_of(ALICE), vec!["a", "c"]);
    Ok(())
}

#[tokio::test]
async fn test_delete_keeps_every_other_record() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    for (i, title) in ["a", "b", "a", "c", "b"].iter().enumerate() {
        ledger.seed(ALICE, title, "same body", 10 + i as u64);
    }
    let repo = repository(&ledger);

    for position in [4, 0, 1] {
        let before = repo.load().await?;
        let target = before.at(position).cloned().expect("note at position");

        let after = match repo.delete(position, &yes).await? {
            DeleteOutcome::Deleted(snapshot) => snapshot,
            DeleteOutcome::Declined => panic!("delete was confirmed"),
        };

        let expected: Vec<&Note> = before.notes.iter().filter(|n| n.position != position).collect();
        assert_eq!(after.len(), expected.len());
        for (kept, was) in after.notes.iter().zip(expected) {
            assert!(kept.same_record(was), "{:?} != {:?}", kept, was);
        }
        assert!(!after.notes.iter().any(|n| n.same_record(&target)));
    }
    Ok(())
}

#[tokio::test]
async fn test_declined_delete_sends_nothing() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "a", "1", 1);
    let repo = repository(&ledger);
    repo.load().await?;

    let asked = AtomicUsize::new(0);
    let prompt = |note: &Note| {
        asked.fetch_add(1, Ordering::SeqCst);
        assert_eq!(note.title, "a");
        false
    };

    assert_eq!(repo.delete(0, &prompt).await?, DeleteOutcome::Declined);
    assert_eq!(repo.delete(0, &no).await?, DeleteOutcome::Declined);
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.calls().delete, 0);
    assert_eq!(titles(&repo), vec!["a"]);
    assert!(!repo.is_busy());
    Ok(())
}

#[tokio::test]
async fn test_delete_unknown_position_is_validation_error() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "a", "1", 1);
    let repo = repository(&ledger);
    repo.load().await?;

    let result = repo.delete(5, &yes).await;

    assert!(matches!(result, Err(NotesError::Validation(_))));
    assert_eq!(ledger.calls().delete, 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_delete_leaves_collection_unchanged() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "a", "1", 1);
    ledger.seed(ALICE, "b", "2", 2);
    let repo = repository(&ledger);
    let before = repo.load().await?;

    ledger.revert_writes(true);
    let result = repo.delete(0, &yes).await;

    assert!(matches!(
        result,
        Err(NotesError::Mutation {
            action: "delete",
            ..
        })
    ));
    assert_eq!(repo.snapshot(), before);
    assert_eq!(ledger.titles_of(ALICE), vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn test_second_mutation_while_pending_is_busy() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "a", "1", 1);
    let repo = repository(&ledger);
    repo.load().await?;

    ledger.hold_confirmations();
    let first = tokio::spawn({
        let repo = repo.clone();
        async move { repo.add("first", "in flight").await }
    });
    wait_for_pending(&repo).await;

    assert!(repo.is_busy());
    assert_eq!(repo.status().pending, Some(MutationKind::Add));
    assert!(matches!(repo.add("second", "x").await, Err(NotesError::Busy)));
    assert!(matches!(repo.delete(0, &yes).await, Err(NotesError::Busy)));

    // Loads are not mutations and still go through
    repo.load().await?;

    ledger.release_confirmations();
    let snapshot = first.await??;

    assert_eq!(snapshot.len(), 2);
    assert_eq!(ledger.calls().create, 1);
    assert_eq!(ledger.calls().delete, 0);
    assert!(!repo.is_busy());
    Ok(())
}

#[tokio::test]
async fn test_abandoned_add_still_resynchronizes() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    let repo = repository(&ledger);
    repo.load().await?;
    let mut updates = repo.subscribe();

    ledger.hold_confirmations();
    let caller = tokio::spawn({
        let repo = repo.clone();
        async move { repo.add("orphan", "caller gave up").await }
    });
    wait_for_pending(&repo).await;

    // The caller stops waiting; the write keeps going
    caller.abort();
    let _ = caller.await;
    ledger.release_confirmations();

    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|snapshot| snapshot.len() == 1),
    )
    .await?
    .expect("snapshot channel closed");

    assert_eq!(titles(&repo), vec!["orphan"]);
    let mut status = repo.watch_status();
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.is_idle())).await??;
    Ok(())
}

#[tokio::test]
async fn test_abandoned_failed_add_is_still_reported() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    let repo = repository(&ledger);
    repo.load().await?;

    ledger.hold_confirmations();
    ledger.revert_writes(true);
    let caller = tokio::spawn({
        let repo = repo.clone();
        async move { repo.add("doomed", "x").await }
    });
    wait_for_pending(&repo).await;
    caller.abort();
    let _ = caller.await;
    ledger.release_confirmations();

    let mut status = repo.watch_status();
    let status = tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.pending.is_none()),
    )
    .await??
    .clone();

    assert!(matches!(status.last_error, Some(NotesError::Mutation { .. })));
    assert!(repo.snapshot().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_installs_follow_call_order() -> anyhow::Result<()> {
    let ledger = FakeLedger::new();
    ledger.seed(ALICE, "a", "1", 1);
    let repo = repository(&ledger);
    let mut updates = repo.subscribe();

    for round in 0..20u64 {
        let (first, second, third) = tokio::join!(repo.load(), repo.load(), repo.load());
        let revisions = vec![first?.revision, second?.revision, third?.revision];

        let base = round * 3;
        assert_eq!(revisions, vec![base + 1, base + 2, base + 3]);
    }

    assert!(updates.has_changed()?);
    assert_eq!(updates.borrow_and_update().revision, 60);
    Ok(())
}
