//! Persistence adapter contract and an in-process implementation
//!
//! Both replace operations are full replaces for one user. Implementations
//! must make `persist_detection` safe against a concurrent run for the same
//! user: a reader never sees an empty or doubled intermediate state.

use crate::catalog::{ArchetypeCatalog, ArchetypeDefinition};
use crate::error::StorageError;
use crate::types::{
    ArchetypeMatch, DetectionReport, DetectionRun, Dimension, ImpactLevel, QuickWin,
    QuickWinSource, QuickWinStatus, QuickWinTemplate, Response,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Storage operations the detection engine depends on
pub trait ArchetypeStore: Send + Sync {
    /// One response per question, the most recently recorded one
    fn load_latest_responses(&self, user_id: &str) -> Result<Vec<Response>, StorageError>;

    /// Archetype definitions in priority order
    fn load_archetype_catalog(&self) -> Result<Vec<ArchetypeDefinition>, StorageError>;

    fn load_quick_win_templates(
        &self,
        archetype_names: &[String],
    ) -> Result<Vec<QuickWinTemplate>, StorageError>;

    /// Every stored template, including any that name no known archetype
    fn load_all_quick_win_templates(&self) -> Result<Vec<QuickWinTemplate>, StorageError>;

    /// Replace every stored match for the user
    fn replace_archetype_matches(
        &self,
        user_id: &str,
        matches: &[ArchetypeMatch],
    ) -> Result<(), StorageError>;

    /// Replace the user's system quick wins; user-sourced ones stay untouched
    fn replace_system_quick_wins(
        &self,
        user_id: &str,
        quick_wins: &[QuickWin],
    ) -> Result<(), StorageError>;

    fn record_detection_run(&self, run: &DetectionRun) -> Result<(), StorageError>;

    /// Write a finished run
    ///
    /// Quick wins go first and matches last, so a failure part way leaves the
    /// previous matches in place rather than new matches without recommendations.
    /// Backends that can wrap all writes in one transaction should override this.
    fn persist_detection(&self, report: &DetectionReport) -> Result<(), StorageError> {
        self.replace_system_quick_wins(&report.user_id, &report.quick_wins)?;
        self.replace_archetype_matches(&report.user_id, &report.matches)?;
        self.record_detection_run(&DetectionRun::from(report))
    }

    /// Append answers to the user's history
    fn record_responses(&self, user_id: &str, responses: &[Response]) -> Result<(), StorageError>;

    fn load_archetype_matches(&self, user_id: &str) -> Result<Vec<ArchetypeMatch>, StorageError>;

    /// System quick wins first, then user ones
    fn list_quick_wins(&self, user_id: &str) -> Result<Vec<QuickWin>, StorageError>;

    fn add_user_quick_win(
        &self,
        user_id: &str,
        title: &str,
        description: &str,
        dimension: Dimension,
        impact_level: ImpactLevel,
    ) -> Result<QuickWin, StorageError>;

    fn set_quick_win_status(
        &self,
        quick_win_id: &str,
        status: QuickWinStatus,
    ) -> Result<(), StorageError>;

    fn latest_detection_run(&self, user_id: &str) -> Result<Option<DetectionRun>, StorageError>;
}

pub(crate) fn ensure_system_only(quick_wins: &[QuickWin]) -> Result<(), StorageError> {
    match quick_wins.iter().find(|q| q.source != QuickWinSource::System) {
        Some(q) => Err(StorageError::Backend(format!(
            "quick win {} is user-sourced and cannot be written as a system recommendation",
            q.id
        ))),
        None => Ok(()),
    }
}

pub(crate) fn user_quick_win(
    user_id: &str,
    title: &str,
    description: &str,
    dimension: Dimension,
    impact_level: ImpactLevel,
) -> QuickWin {
    QuickWin {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        source: QuickWinSource::User,
        archetype: None,
        dimension,
        impact_level,
        status: QuickWinStatus::ToDo,
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    archetypes: Vec<ArchetypeDefinition>,
    templates: Vec<QuickWinTemplate>,
    /// Append-only (user, response) history
    history: Vec<(String, Response)>,
    matches: HashMap<String, Vec<ArchetypeMatch>>,
    quick_wins: Vec<QuickWin>,
    runs: Vec<DetectionRun>,
}

/// Mutex-guarded store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: &ArchetypeCatalog) -> Self {
        let store = Self::new();
        store.set_catalog(catalog.archetypes().to_vec(), catalog.quick_wins().to_vec());
        store
    }

    /// Overwrite the stored catalog without validating it
    pub fn set_catalog(
        &self,
        archetypes: Vec<ArchetypeDefinition>,
        templates: Vec<QuickWinTemplate>,
    ) {
        if let Ok(mut state) = self.state.lock() {
            state.archetypes = archetypes;
            state.templates = templates;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl MemoryState {
    fn replace_quick_wins(&mut self, user_id: &str, quick_wins: &[QuickWin]) {
        self.quick_wins
            .retain(|q| !(q.user_id == user_id && q.source == QuickWinSource::System));
        self.quick_wins.extend(quick_wins.iter().cloned());
    }
}

impl ArchetypeStore for MemoryStore {
    fn load_latest_responses(&self, user_id: &str) -> Result<Vec<Response>, StorageError> {
        let state = self.lock()?;
        let mut latest: BTreeMap<u32, Response> = BTreeMap::new();
        for (_, response) in state.history.iter().filter(|(u, _)| u == user_id) {
            latest.insert(response.question_id, response.clone());
        }
        Ok(latest.into_values().collect())
    }

    fn load_archetype_catalog(&self) -> Result<Vec<ArchetypeDefinition>, StorageError> {
        Ok(self.lock()?.archetypes.clone())
    }

    fn load_quick_win_templates(
        &self,
        archetype_names: &[String],
    ) -> Result<Vec<QuickWinTemplate>, StorageError> {
        Ok(self
            .lock()?
            .templates
            .iter()
            .filter(|t| archetype_names.contains(&t.archetype_name))
            .cloned()
            .collect())
    }

    fn load_all_quick_win_templates(&self) -> Result<Vec<QuickWinTemplate>, StorageError> {
        Ok(self.lock()?.templates.clone())
    }

    fn replace_archetype_matches(
        &self,
        user_id: &str,
        matches: &[ArchetypeMatch],
    ) -> Result<(), StorageError> {
        self.lock()?.matches.insert(user_id.to_string(), matches.to_vec());
        Ok(())
    }

    fn replace_system_quick_wins(
        &self,
        user_id: &str,
        quick_wins: &[QuickWin],
    ) -> Result<(), StorageError> {
        ensure_system_only(quick_wins)?;
        self.lock()?.replace_quick_wins(user_id, quick_wins);
        Ok(())
    }

    fn record_detection_run(&self, run: &DetectionRun) -> Result<(), StorageError> {
        self.lock()?.runs.push(run.clone());
        Ok(())
    }

    fn persist_detection(&self, report: &DetectionReport) -> Result<(), StorageError> {
        ensure_system_only(&report.quick_wins)?;
        // One guard across all three writes
        let mut state = self.lock()?;
        state.replace_quick_wins(&report.user_id, &report.quick_wins);
        state
            .matches
            .insert(report.user_id.clone(), report.matches.clone());
        state.runs.push(DetectionRun::from(report));
        Ok(())
    }

    fn record_responses(&self, user_id: &str, responses: &[Response]) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .history
            .extend(responses.iter().map(|r| (user_id.to_string(), r.clone())));
        Ok(())
    }

    fn load_archetype_matches(&self, user_id: &str) -> Result<Vec<ArchetypeMatch>, StorageError> {
        Ok(self.lock()?.matches.get(user_id).cloned().unwrap_or_default())
    }

    fn list_quick_wins(&self, user_id: &str) -> Result<Vec<QuickWin>, StorageError> {
        let state = self.lock()?;
        let mine = state.quick_wins.iter().filter(|q| q.user_id == user_id);
        let (system, user): (Vec<QuickWin>, Vec<QuickWin>) =
            mine.cloned().partition(|q| q.source == QuickWinSource::System);
        Ok(system.into_iter().chain(user).collect())
    }

    fn add_user_quick_win(
        &self,
        user_id: &str,
        title: &str,
        description: &str,
        dimension: Dimension,
        impact_level: ImpactLevel,
    ) -> Result<QuickWin, StorageError> {
        let quick_win = user_quick_win(user_id, title, description, dimension, impact_level);
        self.lock()?.quick_wins.push(quick_win.clone());
        Ok(quick_win)
    }

    fn set_quick_win_status(
        &self,
        quick_win_id: &str,
        status: QuickWinStatus,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let quick_win = state
            .quick_wins
            .iter_mut()
            .find(|q| q.id == quick_win_id)
            .ok_or_else(|| StorageError::NotFound(quick_win_id.to_string()))?;
        quick_win.status = status;
        Ok(())
    }

    fn latest_detection_run(&self, user_id: &str) -> Result<Option<DetectionRun>, StorageError> {
        Ok(self
            .lock()?
            .runs
            .iter()
            .rev()
            .find(|r| r.user_id == user_id)
            .cloned())
    }
}
