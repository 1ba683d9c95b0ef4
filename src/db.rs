//! SQLite persistence for assessments, detections and quick wins
//!
//! Single file, no network. Every write that replaces a user's detection
//! results runs inside one IMMEDIATE transaction, and the connection sits
//! behind a mutex, so two runs for the same user cannot interleave.

use crate::catalog::{ArchetypeCatalog, ArchetypeDefinition};
use crate::error::StorageError;
use crate::store::{ensure_system_only, user_quick_win, ArchetypeStore};
use crate::types::{
    ArchetypeMatch, DetectionReport, DetectionRun, Dimension, ImpactLevel, QuickWin,
    QuickWinSource, QuickWinStatus, QuickWinTemplate, Response,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Archetype catalog, in priority order
CREATE TABLE IF NOT EXISTS archetypes (
    name TEXT PRIMARY KEY,
    position INTEGER NOT NULL UNIQUE,
    description TEXT NOT NULL,
    key_pattern TEXT NOT NULL,
    symptom_keywords TEXT NOT NULL,         -- JSON array of lower-cased phrases
    diagnostic_question_ids TEXT NOT NULL   -- JSON array, first entry carries the symptom comment
);

CREATE TABLE IF NOT EXISTS quick_win_templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archetype_name TEXT NOT NULL REFERENCES archetypes(name) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    impact_level TEXT NOT NULL CHECK (impact_level IN ('low', 'medium', 'high'))
);

CREATE INDEX IF NOT EXISTS idx_templates_archetype ON quick_win_templates(archetype_name);

-- Append-only answer history; latest row per question wins
CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    question_id INTEGER NOT NULL,
    score INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
    comment TEXT,
    dimension TEXT NOT NULL,
    submitted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_responses_user_question ON responses(user_id, question_id, id);

-- Current detection result per user, fully replaced on each run
CREATE TABLE IF NOT EXISTS detected_archetypes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    rank INTEGER NOT NULL,
    archetype_name TEXT NOT NULL,
    source_dimension TEXT NOT NULL,
    insight TEXT NOT NULL,
    confidence REAL NOT NULL CHECK (confidence BETWEEN 0.0 AND 1.0),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_detected_user ON detected_archetypes(user_id);

CREATE TABLE IF NOT EXISTS quick_wins (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    source TEXT NOT NULL CHECK (source IN ('system', 'user')),
    archetype TEXT,
    dimension TEXT NOT NULL,
    impact_level TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'to_do' CHECK (status IN ('to_do', 'in_progress', 'done')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quick_wins_user_source ON quick_wins(user_id, source);

CREATE TABLE IF NOT EXISTS detection_runs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    catalog_fingerprint TEXT NOT NULL,
    fallback_used INTEGER NOT NULL,
    match_count INTEGER NOT NULL,
    quick_win_count INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_detection_runs_user ON detection_runs(user_id, created_at);
"#;

/// Row counts for a quick health check
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub archetypes: i64,
    pub templates: i64,
    pub users: i64,
    pub responses: i64,
    pub detection_runs: i64,
    pub system_quick_wins: i64,
    pub user_quick_wins: i64,
}

/// `ArchetypeStore` backed by a SQLite file
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database and apply the schema
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Replace the stored catalog with a validated one
    pub fn seed_catalog(&self, catalog: &ArchetypeCatalog) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("DELETE FROM quick_win_templates", [])?;
        tx.execute("DELETE FROM archetypes", [])?;

        for (position, def) in catalog.archetypes().iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO archetypes (name, position, description, key_pattern,
                                        symptom_keywords, diagnostic_question_ids)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    def.name,
                    position as i64,
                    def.description,
                    def.key_pattern,
                    serde_json::to_string(&def.symptom_keywords)?,
                    serde_json::to_string(&def.diagnostic_question_ids)?,
                ],
            )?;
        }

        for template in catalog.quick_wins() {
            tx.execute(
                r#"
                INSERT INTO quick_win_templates (archetype_name, title, description, impact_level)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    template.archetype_name,
                    template.title,
                    template.description,
                    template.impact_level.as_str(),
                ],
            )?;
        }

        tx.commit()?;
        info!(
            archetypes = catalog.len(),
            templates = catalog.quick_wins().len(),
            fingerprint = %catalog.fingerprint(),
            "Seeded archetype catalog"
        );
        Ok(())
    }

    pub fn catalog_is_empty(&self) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM archetypes", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    pub fn stats(&self) -> Result<StoreStats, StorageError> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<i64, StorageError> {
            Ok(conn.query_row(sql, [], |row| row.get(0))?)
        };

        Ok(StoreStats {
            archetypes: count("SELECT COUNT(*) FROM archetypes")?,
            templates: count("SELECT COUNT(*) FROM quick_win_templates")?,
            users: count("SELECT COUNT(DISTINCT user_id) FROM responses")?,
            responses: count("SELECT COUNT(*) FROM responses")?,
            detection_runs: count("SELECT COUNT(*) FROM detection_runs")?,
            system_quick_wins: count("SELECT COUNT(*) FROM quick_wins WHERE source = 'system'")?,
            user_quick_wins: count("SELECT COUNT(*) FROM quick_wins WHERE source = 'user'")?,
        })
    }
}

type TemplateRow = (String, String, String, String);

fn template_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemplateRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_template(
    (archetype_name, title, description, impact): TemplateRow,
) -> Result<QuickWinTemplate, StorageError> {
    Ok(QuickWinTemplate {
        archetype_name,
        title,
        description,
        impact_level: parse_enum(&impact)?,
    })
}

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> Result<T, StorageError> {
    value.parse().map_err(StorageError::Corrupt)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp {:?}: {}", value, e)))
}

fn write_system_quick_wins(
    tx: &Transaction<'_>,
    user_id: &str,
    quick_wins: &[QuickWin],
) -> Result<(), StorageError> {
    tx.execute(
        "DELETE FROM quick_wins WHERE user_id = ?1 AND source = 'system'",
        [user_id],
    )?;

    let now = Utc::now().to_rfc3339();
    for (position, qw) in quick_wins.iter().enumerate() {
        tx.execute(
            r#"
            INSERT INTO quick_wins (id, user_id, position, title, description, source, archetype,
                                    dimension, impact_level, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'system', ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
            params![
                qw.id,
                user_id,
                position as i64,
                qw.title,
                qw.description,
                qw.archetype,
                qw.dimension.as_str(),
                qw.impact_level.as_str(),
                qw.status.as_str(),
                now,
            ],
        )?;
    }
    Ok(())
}

fn write_archetype_matches(
    tx: &Transaction<'_>,
    user_id: &str,
    matches: &[ArchetypeMatch],
) -> Result<(), StorageError> {
    tx.execute("DELETE FROM detected_archetypes WHERE user_id = ?1", [user_id])?;

    let now = Utc::now().to_rfc3339();
    for (rank, m) in matches.iter().enumerate() {
        tx.execute(
            r#"
            INSERT INTO detected_archetypes (user_id, rank, archetype_name, source_dimension,
                                             insight, confidence, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user_id,
                rank as i64,
                m.archetype_name,
                m.source_dimension.as_str(),
                m.insight,
                m.confidence,
                now,
            ],
        )?;
    }
    Ok(())
}

fn write_detection_run(tx: &Transaction<'_>, run: &DetectionRun) -> Result<(), StorageError> {
    tx.execute(
        r#"
        INSERT INTO detection_runs (id, user_id, catalog_fingerprint, fallback_used,
                                    match_count, quick_win_count, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            run.run_id,
            run.user_id,
            run.catalog_fingerprint,
            run.fallback_used as i32,
            run.match_count as i64,
            run.quick_win_count as i64,
            run.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl ArchetypeStore for SqliteStore {
    fn load_latest_responses(&self, user_id: &str) -> Result<Vec<Response>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT r.question_id, r.score, r.comment, r.dimension
            FROM responses r
            WHERE r.user_id = ?1
              AND r.id = (SELECT MAX(id) FROM responses
                          WHERE user_id = r.user_id AND question_id = r.question_id)
            ORDER BY r.question_id
            "#,
        )?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(question_id, score, comment, dimension)| {
                Ok(Response {
                    question_id,
                    score,
                    comment,
                    dimension: parse_enum(&dimension)?,
                })
            })
            .collect()
    }

    fn load_archetype_catalog(&self) -> Result<Vec<ArchetypeDefinition>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT name, description, key_pattern, symptom_keywords, diagnostic_question_ids
            FROM archetypes
            ORDER BY position
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, description, key_pattern, keywords, ids)| {
                Ok(ArchetypeDefinition {
                    name,
                    description,
                    symptom_keywords: serde_json::from_str(&keywords)?,
                    diagnostic_question_ids: serde_json::from_str(&ids)?,
                    key_pattern,
                })
            })
            .collect()
    }

    fn load_quick_win_templates(
        &self,
        archetype_names: &[String],
    ) -> Result<Vec<QuickWinTemplate>, StorageError> {
        if archetype_names.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let placeholders = vec!["?"; archetype_names.len()].join(", ");
        let sql = format!(
            r#"
            SELECT t.archetype_name, t.title, t.description, t.impact_level
            FROM quick_win_templates t
            LEFT JOIN archetypes a ON a.name = t.archetype_name
            WHERE t.archetype_name IN ({})
            ORDER BY a.position, t.id
            "#,
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(archetype_names.iter()), template_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_template).collect()
    }

    fn load_all_quick_win_templates(&self) -> Result<Vec<QuickWinTemplate>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT t.archetype_name, t.title, t.description, t.impact_level
            FROM quick_win_templates t
            LEFT JOIN archetypes a ON a.name = t.archetype_name
            ORDER BY a.position IS NULL, a.position, t.id
            "#,
        )?;
        let rows = stmt
            .query_map([], template_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_template).collect()
    }

    fn replace_archetype_matches(
        &self,
        user_id: &str,
        matches: &[ArchetypeMatch],
    ) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        write_archetype_matches(&tx, user_id, matches)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_system_quick_wins(
        &self,
        user_id: &str,
        quick_wins: &[QuickWin],
    ) -> Result<(), StorageError> {
        ensure_system_only(quick_wins)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        write_system_quick_wins(&tx, user_id, quick_wins)?;
        tx.commit()?;
        Ok(())
    }

    fn record_detection_run(&self, run: &DetectionRun) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_detection_run(&tx, run)?;
        tx.commit()?;
        Ok(())
    }

    fn persist_detection(&self, report: &DetectionReport) -> Result<(), StorageError> {
        ensure_system_only(&report.quick_wins)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        write_system_quick_wins(&tx, &report.user_id, &report.quick_wins)?;
        write_archetype_matches(&tx, &report.user_id, &report.matches)?;
        write_detection_run(&tx, &DetectionRun::from(report))?;
        tx.commit()?;
        Ok(())
    }

    fn record_responses(&self, user_id: &str, responses: &[Response]) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for r in responses {
            tx.execute(
                r#"
                INSERT INTO responses
                    (user_id, question_id, score, comment, dimension, submitted_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![user_id, r.question_id, r.score, r.comment, r.dimension.as_str(), now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_archetype_matches(&self, user_id: &str) -> Result<Vec<ArchetypeMatch>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT archetype_name, source_dimension, insight, confidence
            FROM detected_archetypes
            WHERE user_id = ?1
            ORDER BY rank
            "#,
        )?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(archetype_name, dimension, insight, confidence)| {
                Ok(ArchetypeMatch {
                    archetype_name,
                    source_dimension: parse_enum(&dimension)?,
                    insight,
                    confidence,
                })
            })
            .collect()
    }

    fn list_quick_wins(&self, user_id: &str) -> Result<Vec<QuickWin>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, title, description, source, archetype, dimension, impact_level, status
            FROM quick_wins
            WHERE user_id = ?1
            ORDER BY CASE source WHEN 'system' THEN 0 ELSE 1 END, position, created_at, rowid
            "#,
        )?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, title, description, source, archetype, dimension, impact, status)| {
                    Ok(QuickWin {
                        id,
                        user_id: user_id.to_string(),
                        title,
                        description,
                        source: parse_enum::<QuickWinSource>(&source)?,
                        archetype,
                        dimension: parse_enum::<Dimension>(&dimension)?,
                        impact_level: parse_enum::<ImpactLevel>(&impact)?,
                        status: parse_enum::<QuickWinStatus>(&status)?,
                    })
                },
            )
            .collect()
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
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO quick_wins (id, user_id, title, description, source, archetype,
                                    dimension, impact_level, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 'user', NULL, ?5, ?6, ?7, ?8, ?8)
            "#,
            params![
                quick_win.id,
                user_id,
                quick_win.title,
                quick_win.description,
                dimension.as_str(),
                impact_level.as_str(),
                quick_win.status.as_str(),
                now,
            ],
        )?;
        Ok(quick_win)
    }

    fn set_quick_win_status(
        &self,
        quick_win_id: &str,
        status: QuickWinStatus,
    ) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE quick_wins SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![quick_win_id, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(quick_win_id.to_string()));
        }
        Ok(())
    }

    fn latest_detection_run(&self, user_id: &str) -> Result<Option<DetectionRun>, StorageError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, catalog_fingerprint, fallback_used, match_count, quick_win_count,
                       created_at
                FROM detection_runs
                WHERE user_id = ?1
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                "#,
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i32>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(run_id, catalog_fingerprint, fallback, matches, quick_wins, created_at)| {
            Ok(DetectionRun {
                run_id,
                user_id: user_id.to_string(),
                catalog_fingerprint,
                fallback_used: fallback != 0,
                match_count: matches as usize,
                quick_win_count: quick_wins as usize,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder;
    use tempfile::tempdir;

    fn setup_test_db() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::open(&path).unwrap();
        store.seed_catalog(&ArchetypeCatalog::builtin().unwrap()).unwrap();
        (store, dir)
    }

    fn sample_match(name: &str, confidence: f64) -> ArchetypeMatch {
        ArchetypeMatch {
            archetype_name: name.to_string(),
            source_dimension: Dimension::Effectiveness,
            insight: format!("{} insight", name),
            confidence,
        }
    }

    #[test]
    fn test_all_templates_include_orphans() {
        let (store, _dir) = setup_test_db();
        assert_eq!(store.load_all_quick_win_templates().unwrap().len(), 18);

        {
            let conn = store.lock().unwrap();
            conn.execute_batch(
                "PRAGMA foreign_keys = OFF;
                 INSERT INTO quick_win_templates (archetype_name, title, description, impact_level)
                 VALUES ('Drift to Low Performance', 'Set a floor', 'd', 'low');
                 PRAGMA foreign_keys = ON;",
            )
            .unwrap();
        }

        let all = store.load_all_quick_win_templates().unwrap();
        assert_eq!(all.len(), 19);
        assert_eq!(all.last().unwrap().archetype_name, "Drift to Low Performance");

        let result = crate::detection::DetectionEngine::new(store);
        assert!(matches!(result, Err(crate::error::EngineError::InvalidCatalog(_))));
    }

    #[test]
    fn test_schema_tables_exist() {
        let (store, _dir) = setup_test_db();
        let conn = store.lock().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "archetypes",
            "quick_win_templates",
            "responses",
            "detected_archetypes",
            "quick_wins",
            "detection_runs",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_catalog_round_trip_preserves_order() {
        let (store, _dir) = setup_test_db();
        let catalog = ArchetypeCatalog::builtin().unwrap();

        let loaded = store.load_archetype_catalog().unwrap();
        assert_eq!(loaded, catalog.archetypes());
        assert!(!store.catalog_is_empty().unwrap());
    }

    #[test]
    fn test_seed_catalog_replaces_previous() {
        let (store, _dir) = setup_test_db();
        let small = ArchetypeCatalog::new(
            vec![ArchetypeCatalog::builtin().unwrap().archetypes()[3].clone()],
            Vec::new(),
        )
        .unwrap();
        store.seed_catalog(&small).unwrap();

        assert_eq!(store.load_archetype_catalog().unwrap().len(), 1);
        let stats = store.stats().unwrap();
        assert_eq!(stats.archetypes, 1);
        assert_eq!(stats.templates, 0);
    }

    #[test]
    fn test_templates_follow_catalog_order() {
        let (store, _dir) = setup_test_db();
        let templates = store
            .load_quick_win_templates(&[
                "Escalation".to_string(),
                "Shifting the Burden".to_string(),
            ])
            .unwrap();
        assert_eq!(templates.len(), 4);
        assert_eq!(templates[0].archetype_name, "Shifting the Burden");
        assert_eq!(templates[3].archetype_name, "Escalation");

        assert!(store.load_quick_win_templates(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_latest_response_wins() {
        let (store, _dir) = setup_test_db();
        store
            .record_responses(
                "u1",
                &[
                    Response::new(1, 2, Dimension::Efficiency).with_comment("quick fix"),
                    Response::new(6, 3, Dimension::Effectiveness),
                ],
            )
            .unwrap();
        store
            .record_responses("u1", &[Response::new(1, 5, Dimension::Efficiency)])
            .unwrap();

        let latest = store.load_latest_responses("u1").unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].score, 5);
        assert!(latest[0].comment.is_none());
        assert_eq!(latest[1].dimension, Dimension::Effectiveness);

        assert!(store.load_latest_responses("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_score_check_constraint() {
        let (store, _dir) = setup_test_db();
        let result = store.record_responses("u1", &[Response::new(1, 9, Dimension::Efficiency)]);
        assert!(matches!(result, Err(StorageError::Sqlite(_))));
        // Whole batch rolled back
        assert!(store.load_latest_responses("u1").unwrap().is_empty());
    }

    #[test]
    fn test_replace_archetype_matches() {
        let (store, _dir) = setup_test_db();
        store
            .replace_archetype_matches(
                "u1",
                &[sample_match("Escalation", 0.8), sample_match("Eroding Goals", 0.4)],
            )
            .unwrap();
        store
            .replace_archetype_matches("u1", &[sample_match("Limits to Growth", 0.5)])
            .unwrap();

        let stored = store.load_archetype_matches("u1").unwrap();
        assert_eq!(stored, vec![sample_match("Limits to Growth", 0.5)]);
    }

    #[test]
    fn test_replace_system_quick_wins_preserves_user_rows() {
        let (store, _dir) = setup_test_db();
        let mine = store
            .add_user_quick_win(
                "u1",
                "Weekly demo",
                "Show work",
                Dimension::Excellence,
                ImpactLevel::Low,
            )
            .unwrap();
        store
            .add_user_quick_win("u2", "Other user", "d", Dimension::Efficiency, ImpactLevel::Low)
            .unwrap();

        for _ in 0..3 {
            store
                .replace_system_quick_wins("u1", &binder::fallback_quick_wins("u1"))
                .unwrap();
        }

        let all = store.list_quick_wins("u1").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].source, QuickWinSource::System);
        assert_eq!(all[2].id, mine.id);
        assert_eq!(store.list_quick_wins("u2").unwrap().len(), 1);
    }

    #[test]
    fn test_set_quick_win_status() {
        let (store, _dir) = setup_test_db();
        let qw = store
            .add_user_quick_win("u1", "t", "d", Dimension::Efficiency, ImpactLevel::High)
            .unwrap();

        store.set_quick_win_status(&qw.id, QuickWinStatus::InProgress).unwrap();
        let listed = store.list_quick_wins("u1").unwrap();
        assert_eq!(listed[0].status, QuickWinStatus::InProgress);

        let err = store.set_quick_win_status("nope", QuickWinStatus::Done).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_persist_detection_and_latest_run() {
        let (store, _dir) = setup_test_db();
        assert!(store.latest_detection_run("u1").unwrap().is_none());

        let report = DetectionReport {
            run_id: "run-1".into(),
            user_id: "u1".into(),
            catalog_fingerprint: "abc".into(),
            fallback_used: true,
            matches: vec![sample_match("Escalation", 0.2)],
            quick_wins: binder::fallback_quick_wins("u1"),
            created_at: Utc::now(),
        };
        store.persist_detection(&report).unwrap();

        let run = store.latest_detection_run("u1").unwrap().unwrap();
        assert_eq!(run.run_id, "run-1");
        assert!(run.fallback_used);
        assert_eq!(run.match_count, 1);
        assert_eq!(run.quick_win_count, 2);
        assert_eq!(store.load_archetype_matches("u1").unwrap().len(), 1);
        assert_eq!(store.list_quick_wins("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_persist_detection_rolls_back_on_failure() {
        let (store, _dir) = setup_test_db();
        store
            .replace_system_quick_wins("u1", &binder::fallback_quick_wins("u1"))
            .unwrap();
        store
            .replace_archetype_matches("u1", &[sample_match("Escalation", 0.7)])
            .unwrap();

        // Confidence outside [0, 1] trips the CHECK after quick wins were written
        let report = DetectionReport {
            run_id: "run-bad".into(),
            user_id: "u1".into(),
            catalog_fingerprint: "abc".into(),
            fallback_used: false,
            matches: vec![sample_match("Eroding Goals", 1.5)],
            quick_wins: Vec::new(),
            created_at: Utc::now(),
        };
        assert!(store.persist_detection(&report).is_err());

        assert_eq!(store.list_quick_wins("u1").unwrap().len(), 2);
        assert_eq!(
            store.load_archetype_matches("u1").unwrap()[0].archetype_name,
            "Escalation"
        );
        assert!(store.latest_detection_run("u1").unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = setup_test_db();
        store
            .record_responses("u1", &[Response::new(1, 2, Dimension::Efficiency)])
            .unwrap();
        store
            .record_responses("u2", &[Response::new(1, 4, Dimension::Efficiency)])
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.archetypes, 9);
        assert_eq!(stats.templates, 18);
        assert_eq!(stats.users, 2);
        assert_eq!(stats.responses, 2);
    }
}
