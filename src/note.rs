//! Note data model
//!
//! [`RemoteNote`] is the record exactly as the contract returns it;
//! [`Note`] is the normalized, positioned form the rest of the client
//! works with. A [`NoteSnapshot`] is one installed collection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::abi::U256;
use crate::error::ChainError;

/// Note record as stored by the contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNote {
    pub title: String,
    pub content: String,
    /// Block timestamp (seconds) recorded by the contract
    pub timestamp: U256,
}

/// A note of the active account, as of one load
///
/// `position` is the index the contract stored the note at when the
/// snapshot was taken. It is the deletion key and shifts whenever an
/// earlier note is deleted, so it is only meaningful together with the
/// snapshot it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
    pub content: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub position: u64,
}

impl Note {
    /// Normalize a contract record fetched at `position`
    pub fn from_remote(remote: RemoteNote, position: u64) -> Result<Self, ChainError> {
        let timestamp = u64::try_from(remote.timestamp)
            .ok()
            .and_then(|seconds| i64::try_from(seconds).ok());
        let timestamp = timestamp.ok_or_else(|| {
            ChainError::invalid_response(format!(
                "Note {} has out-of-range timestamp {}",
                position, remote.timestamp
            ))
        })?;

        Ok(Self {
            title: remote.title,
            content: remote.content,
            timestamp,
            position,
        })
    }

    /// Same title, content and timestamp (positions are not identities)
    pub fn same_record(&self, other: &Note) -> bool {
        self.title == other.title && self.content == other.content && self.timestamp == other.timestamp
    }
}

/// Normalize a full `getMyNotes()` result, preserving contract order
///
/// Fails as a whole if any record cannot be normalized.
pub fn normalize(remote: Vec<RemoteNote>) -> Result<Vec<Note>, ChainError> {
    remote
        .into_iter()
        .enumerate()
        .map(|(position, note)| Note::from_remote(note, position as u64))
        .collect()
}

/// One installed note collection
///
/// Cheap to clone; the notes are shared and never mutated after install.
/// `revision` increases by one with every successful load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteSnapshot {
    pub revision: u64,
    pub notes: Arc<Vec<Note>>,
}

impl NoteSnapshot {
    pub(crate) fn next(&self, notes: Vec<Note>) -> Self {
        Self {
            revision: self.revision + 1,
            notes: Arc::new(notes),
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Note stored at `position` in this snapshot
    pub fn at(&self, position: u64) -> Option<&Note> {
        self.notes.iter().find(|n| n.position == position)
    }
}
