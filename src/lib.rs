//! archetype-lens - Systemic Archetype Detection
//!
//! An organization rates itself against a fixed questionnaire. From the
//! pattern of low scores and the language in comments, the engine infers
//! which systems-thinking archetypes ("Shifting the Burden", "Escalation",
//! "Limits to Growth", ...) are likely at work, then proposes quick wins
//! tied to each one.
//!
//! The engine is a deterministic rule evaluator over a hand-authored catalog.
//! Nothing is learned from data.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use archetype_lens::{LensEngine, ResponseSubmission};
//!
//! let engine = LensEngine::init(&db_path, None)?;
//! engine.submit("org-42", &submissions)?;
//!
//! let report = engine.detect("org-42")?;
//! for m in &report.matches {
//!     println!("{} ({:.0}%): {}", m.archetype_name, m.confidence * 100.0, m.insight);
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Response Set ──► Matcher (+ Catalog) ──► Archetype Matches
//!                                              │
//!                                              ▼
//!                          Binder (+ Catalog) ──► Quick Wins ──► Store
//! ```

pub mod binder;
pub mod catalog;
pub mod config;
pub mod convenience;
pub mod db;
pub mod detection;
pub mod error;
pub mod matcher;
pub mod progress;
pub mod questionnaire;
pub mod responses;
pub mod store;
pub mod types;

// Core engine
pub use detection::{DetectionEngine, DetectionStage};
pub use error::{CatalogError, EngineError, StorageError};
pub use types::*;

// Catalog and scoring
pub use catalog::{ArchetypeCatalog, ArchetypeDefinition};
pub use matcher::{evaluate, match_archetypes, ArchetypeEvidence, MatchReport};
pub use binder::{bind, fallback_quick_wins};
pub use responses::{DimensionSummary, ResponseSet};

// Persistence
pub use store::{ArchetypeStore, MemoryStore};
pub use db::{SqliteStore, StoreStats};

// Convenience API
pub use config::EngineConfig;
pub use convenience::{quick_assessment, LensEngine, QuickAssessment};
pub use progress::{progress_report, ProgressReport, QuickWinProgress};
