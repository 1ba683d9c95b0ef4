//! Detection run orchestration
//!
//! One pass per request, nothing persisted until the end:
//!
//! ```text
//! Idle -> ResponsesLoaded -> Matched -> Bound -> Persisted -> Idle
//! ```
//!
//! The catalog is loaded and validated when the engine is built, so a bad
//! catalog fails before any user-facing run.

use crate::binder;
use crate::catalog::ArchetypeCatalog;
use crate::error::EngineError;
use crate::matcher;
use crate::responses::ResponseSet;
use crate::store::ArchetypeStore;
use crate::types::{DetectionReport, QuickWin};
use chrono::Utc;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStage {
    Idle,
    ResponsesLoaded,
    Matched,
    Bound,
    Persisted,
}

impl fmt::Display for DetectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectionStage::Idle => "idle",
            DetectionStage::ResponsesLoaded => "responses_loaded",
            DetectionStage::Matched => "matched",
            DetectionStage::Bound => "bound",
            DetectionStage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Runs archetype detection for users against a store
pub struct DetectionEngine<S: ArchetypeStore> {
    store: S,
    catalog: ArchetypeCatalog,
}

impl<S: ArchetypeStore> DetectionEngine<S> {
    /// Load and validate the catalog from the store
    pub fn new(store: S) -> Result<Self, EngineError> {
        let archetypes = store.load_archetype_catalog()?;
        let templates = store.load_all_quick_win_templates()?;
        let catalog = ArchetypeCatalog::new(archetypes, templates)?;

        info!(
            archetypes = catalog.len(),
            templates = catalog.quick_wins().len(),
            fingerprint = %catalog.fingerprint(),
            "Loaded archetype catalog"
        );

        Ok(Self { store, catalog })
    }

    pub fn catalog(&self) -> &ArchetypeCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Detect archetypes for a user and replace their system quick wins
    pub fn run_detection(&self, user_id: &str) -> Result<DetectionReport, EngineError> {
        let run_id = Uuid::new_v4().to_string();
        info!(user_id, run_id = %run_id, "Starting detection run");
        self.enter(&run_id, DetectionStage::Idle);

        // 1. Load the latest answer per question
        let responses = ResponseSet::new(self.store.load_latest_responses(user_id)?)?;
        if responses.is_empty() {
            return Err(EngineError::NoResponses {
                user_id: user_id.to_string(),
            });
        }
        self.enter(&run_id, DetectionStage::ResponsesLoaded);

        // 2. Score archetypes
        let report = matcher::evaluate(&responses, &self.catalog);
        self.enter(&run_id, DetectionStage::Matched);

        // 3. Bind quick wins for the matched archetypes
        let quick_wins = self.bind(user_id, &report.matches)?;
        self.enter(&run_id, DetectionStage::Bound);

        let detection = DetectionReport {
            run_id: run_id.clone(),
            user_id: user_id.to_string(),
            catalog_fingerprint: self.catalog.fingerprint(),
            fallback_used: report.fallback_used,
            matches: report.matches,
            quick_wins,
            created_at: Utc::now(),
        };

        // 4. Persist; nothing was written before this point
        self.store.persist_detection(&detection)?;
        self.enter(&run_id, DetectionStage::Persisted);

        info!(
            user_id,
            run_id = %run_id,
            matches = detection.matches.len(),
            quick_wins = detection.quick_wins.len(),
            fallback = detection.fallback_used,
            "Detection run complete"
        );
        Ok(detection)
    }

    /// Score a user's current answers without writing anything
    pub fn preview(&self, user_id: &str) -> Result<matcher::MatchReport, EngineError> {
        let responses = ResponseSet::new(self.store.load_latest_responses(user_id)?)?;
        if responses.is_empty() {
            return Err(EngineError::NoResponses {
                user_id: user_id.to_string(),
            });
        }
        Ok(matcher::evaluate(&responses, &self.catalog))
    }

    fn bind(
        &self,
        user_id: &str,
        matches: &[crate::types::ArchetypeMatch],
    ) -> Result<Vec<QuickWin>, EngineError> {
        let names: Vec<String> = matches.iter().map(|m| m.archetype_name.clone()).collect();
        let templates = if names.is_empty() {
            Vec::new()
        } else {
            self.store.load_quick_win_templates(&names)?
        };
        self.catalog.check_templates(&templates)?;
        Ok(binder::bind(user_id, matches, &templates))
    }

    fn enter(&self, run_id: &str, stage: DetectionStage) {
        debug!(run_id, stage = %stage, "Detection stage");
    }
}
