//! Progress on quick wins
//!
//! Detection proposes quick wins; users move them through to-do, in-progress
//! and done. This module rolls those statuses up per user and per dimension.

use crate::error::StorageError;
use crate::store::ArchetypeStore;
use crate::types::{Dimension, QuickWin, QuickWinSource, QuickWinStatus};
use serde::{Deserialize, Serialize};

/// Status counts for a set of quick wins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickWinProgress {
    pub to_do: usize,
    pub in_progress: usize,
    pub done: usize,
    pub system: usize,
    pub user: usize,
}

impl QuickWinProgress {
    pub fn from_quick_wins<'a>(quick_wins: impl IntoIterator<Item = &'a QuickWin>) -> Self {
        let mut progress = Self::default();
        for qw in quick_wins {
            match qw.status {
                QuickWinStatus::ToDo => progress.to_do += 1,
                QuickWinStatus::InProgress => progress.in_progress += 1,
                QuickWinStatus::Done => progress.done += 1,
            }
            match qw.source {
                QuickWinSource::System => progress.system += 1,
                QuickWinSource::User => progress.user += 1,
            }
        }
        progress
    }

    pub fn total(&self) -> usize {
        self.to_do + self.in_progress + self.done
    }

    /// Share done, 0.0 when there is nothing to do
    pub fn percent_done(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.done as f64 / self.total() as f64 * 100.0
        }
    }
}

/// Progress overall and per dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub user_id: String,
    pub overall: QuickWinProgress,
    pub by_dimension: Vec<(Dimension, QuickWinProgress)>,
}

pub fn progress_report<S: ArchetypeStore + ?Sized>(
    store: &S,
    user_id: &str,
) -> Result<ProgressReport, StorageError> {
    let quick_wins = store.list_quick_wins(user_id)?;
    let by_dimension = Dimension::ALL
        .iter()
        .map(|dim| {
            (
                *dim,
                QuickWinProgress::from_quick_wins(
                    quick_wins.iter().filter(|q| q.dimension == *dim),
                ),
            )
        })
        .collect();

    Ok(ProgressReport {
        user_id: user_id.to_string(),
        overall: QuickWinProgress::from_quick_wins(&quick_wins),
        by_dimension,
    })
}
