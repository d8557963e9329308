//! Filtered and sorted projection of a note collection
//!
//! [`project`] is a pure function of its inputs: it never touches the
//! repository and always returns the same sequence for the same
//! collection and [`ViewState`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::note::Note;

/// Sort order of the visible notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Most recent first
    #[default]
    Newest,
    Oldest,
    /// Alphabetical by title
    Title,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "title" => Ok(Self::Title),
            other => Err(format!(
                "unknown sort key {:?} (expected newest, oldest or title)",
                other
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Title => "title",
        })
    }
}

/// Search and sort settings of the note list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub search_query: String,
    pub sort_key: SortKey,
}

impl ViewState {
    pub fn new(search_query: impl Into<String>, sort_key: SortKey) -> Self {
        Self {
            search_query: search_query.into(),
            sort_key,
        }
    }

    pub fn is_searching(&self) -> bool {
        !self.search_query.is_empty()
    }
}

/// Whether `note` is listed under `query`
///
/// Notes without a title are never listed. An empty query matches
/// everything else; otherwise the query must appear in the title or the
/// content, ignoring case.
pub fn matches(note: &Note, query: &str) -> bool {
    if note.title.is_empty() {
        return false;
    }
    if query.is_empty() {
        return true;
    }
    let query = query.to_lowercase();
    note.title.to_lowercase().contains(&query) || note.content.to_lowercase().contains(&query)
}

/// Title order used by [`SortKey::Title`]: alphabetical, ignoring case
///
/// Titles that differ only in case put the lowercase spelling first.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// Visible notes for `view`, in display order
///
/// The sort is stable, so notes that compare equal keep their
/// collection order.
pub fn project(notes: &[Note], view: &ViewState) -> Vec<Note> {
    let mut visible: Vec<Note> = notes
        .iter()
        .filter(|note| matches(note, &view.search_query))
        .cloned()
        .collect();

    match view.sort_key {
        SortKey::Newest => visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortKey::Oldest => visible.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        SortKey::Title => visible.sort_by(|a, b| compare_titles(&a.title, &b.title)),
    }

    visible
}
