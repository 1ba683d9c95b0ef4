//! Convenience entry points
//!
//! Two modes:
//! 1. Full mode: `LensEngine` - SQLite-backed, detection results persisted per user
//! 2. Simple mode: `quick_assessment()` - score a submission in memory, nothing stored

use crate::binder;
use crate::catalog::ArchetypeCatalog;
use crate::config::EngineConfig;
use crate::db::SqliteStore;
use crate::detection::DetectionEngine;
use crate::matcher::{self, MatchReport};
use crate::progress::{self, ProgressReport};
use crate::questionnaire;
use crate::responses::{DimensionSummary, ResponseSet};
use crate::store::ArchetypeStore;
use crate::types::{DetectionReport, QuickWin, ResponseSubmission};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

// ============================================================================
// FULL MODE: LensEngine over SQLite
// ============================================================================

/// SQLite-backed detection engine
///
/// Initialize once at startup; a bad catalog fails here, not on a user's run.
///
/// ```rust,ignore
/// let engine = LensEngine::init(&data_dir.join("lens.db"), None)?;
/// engine.submit("org-42", &submissions)?;
/// let report = engine.detect("org-42")?;
/// ```
pub struct LensEngine {
    engine: DetectionEngine<SqliteStore>,
}

impl LensEngine {
    /// Open the database, seed the catalog if needed, and validate it
    ///
    /// With `catalog_path`, that file replaces the stored catalog. Without it,
    /// the built-in catalog is seeded only into an empty database.
    pub fn init(db_path: &Path, catalog_path: Option<&Path>) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create data directory {:?}", parent))?;
            }
        }

        let store = SqliteStore::open(db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?;

        match catalog_path {
            Some(path) => {
                let catalog = ArchetypeCatalog::from_json_file(path)
                    .with_context(|| format!("Failed to load catalog from {:?}", path))?;
                store.seed_catalog(&catalog)?;
            }
            None => {
                if store.catalog_is_empty()? {
                    store.seed_catalog(&ArchetypeCatalog::builtin()?)?;
                }
            }
        }

        let engine = DetectionEngine::new(store).context("Archetype catalog failed validation")?;
        info!(db = ?db_path, "Engine ready");
        Ok(Self { engine })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::init(&config.db_path, config.catalog_path.as_deref())
    }

    /// Record a questionnaire submission
    pub fn submit(&self, user_id: &str, submissions: &[ResponseSubmission]) -> Result<usize> {
        let responses = questionnaire::resolve(submissions)?;
        self.engine.store().record_responses(user_id, &responses)?;
        Ok(responses.len())
    }

    /// Run detection and persist the result
    pub fn detect(&self, user_id: &str) -> Result<DetectionReport> {
        Ok(self.engine.run_detection(user_id)?)
    }

    pub fn quick_wins(&self, user_id: &str) -> Result<Vec<QuickWin>> {
        Ok(self.engine.store().list_quick_wins(user_id)?)
    }

    pub fn progress(&self, user_id: &str) -> Result<ProgressReport> {
        Ok(progress::progress_report(self.engine.store(), user_id)?)
    }

    pub fn dimension_summary(&self, user_id: &str) -> Result<Vec<DimensionSummary>> {
        let responses = ResponseSet::new(self.engine.store().load_latest_responses(user_id)?)?;
        Ok(responses.dimension_summary())
    }

    pub fn catalog(&self) -> &ArchetypeCatalog {
        self.engine.catalog()
    }

    /// Access the store for queries not wrapped here
    pub fn store(&self) -> &SqliteStore {
        self.engine.store()
    }
}

// ============================================================================
// SIMPLE MODE: in-memory scoring
// ============================================================================

/// Result of scoring a submission without storing it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickAssessment {
    pub report: MatchReport,
    pub quick_wins: Vec<QuickWin>,
    pub dimensions: Vec<DimensionSummary>,
}

/// Score a submission against the built-in catalog
///
/// ```rust,ignore
/// let assessment = quick_assessment("preview", &submissions)?;
/// for m in &assessment.report.matches {
///     println!("{} ({:.0}%)", m.archetype_name, m.confidence * 100.0);
/// }
/// ```
pub fn quick_assessment(
    user_id: &str,
    submissions: &[ResponseSubmission],
) -> Result<QuickAssessment> {
    let catalog = ArchetypeCatalog::builtin()?;
    quick_assessment_with(&catalog, user_id, submissions)
}

pub fn quick_assessment_with(
    catalog: &ArchetypeCatalog,
    user_id: &str,
    submissions: &[ResponseSubmission],
) -> Result<QuickAssessment> {
    let responses = ResponseSet::new(questionnaire::resolve(submissions)?)?;
    let report = matcher::evaluate(&responses, catalog);
    let names: Vec<String> = report.matches.iter().map(|m| m.archetype_name.clone()).collect();
    let quick_wins = binder::bind(user_id, &report.matches, &catalog.templates_for(&names));

    Ok(QuickAssessment {
        report,
        quick_wins,
        dimensions: responses.dimension_summary(),
    })
}
