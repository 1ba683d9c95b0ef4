//! End-to-end detection runs against both store backends

use archetype_lens::catalog::{ArchetypeCatalog, ArchetypeDefinition};
use archetype_lens::{
    ArchetypeMatch, ArchetypeStore, DetectionEngine, DetectionRun, Dimension, EngineError,
    ImpactLevel, MemoryStore, QuickWin, QuickWinSource, QuickWinStatus, QuickWinTemplate,
    Response, SqliteStore, StorageError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn worked_example() -> Vec<Response> {
    vec![
        Response::new(1, 2, Dimension::Efficiency).with_comment("We applied a quick fix again"),
        Response::new(4, 2, Dimension::Efficiency),
        Response::new(9, 4, Dimension::Effectiveness),
        Response::new(13, 2, Dimension::Excellence),
    ]
}

fn memory_engine() -> DetectionEngine<MemoryStore> {
    let catalog = ArchetypeCatalog::builtin().unwrap();
    DetectionEngine::new(MemoryStore::with_catalog(&catalog)).unwrap()
}

fn sqlite_engine(path: &std::path::Path) -> DetectionEngine<SqliteStore> {
    let store = SqliteStore::open(path).unwrap();
    store.seed_catalog(&ArchetypeCatalog::builtin().unwrap()).unwrap();
    DetectionEngine::new(store).unwrap()
}

/// Delegates to a `MemoryStore` with switchable faults
struct FaultyStore {
    inner: MemoryStore,
    fail_quick_wins: AtomicBool,
    stray_template: AtomicBool,
}

impl FaultyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::with_catalog(&ArchetypeCatalog::builtin().unwrap()),
            fail_quick_wins: AtomicBool::new(false),
            stray_template: AtomicBool::new(false),
        }
    }
}

impl ArchetypeStore for FaultyStore {
    fn load_latest_responses(&self, user_id: &str) -> Result<Vec<Response>, StorageError> {
        self.inner.load_latest_responses(user_id)
    }

    fn load_archetype_catalog(&self) -> Result<Vec<ArchetypeDefinition>, StorageError> {
        self.inner.load_archetype_catalog()
    }

    fn load_quick_win_templates(
        &self,
        names: &[String],
    ) -> Result<Vec<QuickWinTemplate>, StorageError> {
        let mut templates = self.inner.load_quick_win_templates(names)?;
        if self.stray_template.load(Ordering::SeqCst) {
            templates.push(QuickWinTemplate {
                archetype_name: "Drift to Low Performance".to_string(),
                title: "Orphan".to_string(),
                description: "Points at nothing in the catalog".to_string(),
                impact_level: ImpactLevel::Low,
            });
        }
        Ok(templates)
    }

    fn load_all_quick_win_templates(&self) -> Result<Vec<QuickWinTemplate>, StorageError> {
        self.inner.load_all_quick_win_templates()
    }

    fn replace_archetype_matches(
        &self,
        user_id: &str,
        matches: &[ArchetypeMatch],
    ) -> Result<(), StorageError> {
        self.inner.replace_archetype_matches(user_id, matches)
    }

    fn replace_system_quick_wins(
        &self,
        user_id: &str,
        quick_wins: &[QuickWin],
    ) -> Result<(), StorageError> {
        if self.fail_quick_wins.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".to_string()));
        }
        self.inner.replace_system_quick_wins(user_id, quick_wins)
    }

    fn record_detection_run(&self, run: &DetectionRun) -> Result<(), StorageError> {
        self.inner.record_detection_run(run)
    }

    fn record_responses(&self, user_id: &str, responses: &[Response]) -> Result<(), StorageError> {
        self.inner.record_responses(user_id, responses)
    }

    fn load_archetype_matches(&self, user_id: &str) -> Result<Vec<ArchetypeMatch>, StorageError> {
        self.inner.load_archetype_matches(user_id)
    }

    fn list_quick_wins(&self, user_id: &str) -> Result<Vec<QuickWin>, StorageError> {
        self.inner.list_quick_wins(user_id)
    }

    fn add_user_quick_win(
        &self,
        user_id: &str,
        title: &str,
        description: &str,
        dimension: Dimension,
        impact_level: ImpactLevel,
    ) -> Result<QuickWin, StorageError> {
        self.inner
            .add_user_quick_win(user_id, title, description, dimension, impact_level)
    }

    fn set_quick_win_status(
        &self,
        quick_win_id: &str,
        status: QuickWinStatus,
    ) -> Result<(), StorageError> {
        self.inner.set_quick_win_status(quick_win_id, status)
    }

    fn latest_detection_run(&self, user_id: &str) -> Result<Option<DetectionRun>, StorageError> {
        self.inner.latest_detection_run(user_id)
    }
}

fn system_titles(quick_wins: &[QuickWin]) -> Vec<(String, Dimension)> {
    quick_wins
        .iter()
        .filter(|q| q.source == QuickWinSource::System)
        .map(|q| (q.title.clone(), q.dimension))
        .collect()
}

#[test]
fn test_worked_example_on_sqlite() {
    let dir = tempdir().unwrap();
    let engine = sqlite_engine(&dir.path().join("lens.db"));
    engine.store().record_responses("org-1", &worked_example()).unwrap();

    let report = engine.run_detection("org-1").unwrap();
    assert!(!report.fallback_used);
    assert_eq!(report.matches.len(), 1);

    let top = &report.matches[0];
    assert_eq!(top.archetype_name, "Shifting the Burden");
    assert_eq!(top.source_dimension, Dimension::Efficiency);
    assert!((top.confidence - 0.6).abs() < 1e-9);

    // Every bound quick win inherits the match's dimension
    assert_eq!(report.quick_wins.len(), 2);
    assert!(report.quick_wins.iter().all(|q| {
        q.dimension == Dimension::Efficiency
            && q.archetype.as_deref() == Some("Shifting the Burden")
    }));

    assert_eq!(engine.store().load_archetype_matches("org-1").unwrap(), report.matches);
    let run = engine.store().latest_detection_run("org-1").unwrap().unwrap();
    assert_eq!(run.run_id, report.run_id);
    assert_eq!(run.quick_win_count, 2);
}

#[test]
fn test_rerun_replaces_instead_of_accumulating() {
    let dir = tempdir().unwrap();
    let engine = sqlite_engine(&dir.path().join("lens.db"));
    engine.store().record_responses("org-1", &worked_example()).unwrap();

    let first = engine.run_detection("org-1").unwrap();
    let second = engine.run_detection("org-1").unwrap();

    assert_eq!(first.matches, second.matches);
    let stored = engine.store().list_quick_wins("org-1").unwrap();
    assert_eq!(stored.len(), second.quick_wins.len());
    assert!(stored
        .iter()
        .zip(&second.quick_wins)
        .all(|(s, r)| s.id == r.id && s.same_content(r)));
    assert!(first
        .quick_wins
        .iter()
        .zip(&second.quick_wins)
        .all(|(a, b)| a.same_content(b)));

    // Fresh ids each run, old rows gone
    let ids: Vec<&str> = stored.iter().map(|q| q.id.as_str()).collect();
    assert!(first.quick_wins.iter().all(|q| !ids.contains(&q.id.as_str())));
    assert_eq!(engine.store().load_archetype_matches("org-1").unwrap().len(), 1);
}

#[test]
fn test_user_quick_wins_survive_detection() {
    let engine = memory_engine();
    let store = engine.store();
    store.record_responses("org-1", &worked_example()).unwrap();

    let mine = store
        .add_user_quick_win(
            "org-1",
            "Weekly demo",
            "Show work every Friday",
            Dimension::Excellence,
            ImpactLevel::Low,
        )
        .unwrap();
    store.set_quick_win_status(&mine.id, QuickWinStatus::InProgress).unwrap();

    engine.run_detection("org-1").unwrap();
    engine.run_detection("org-1").unwrap();

    let all = store.list_quick_wins("org-1").unwrap();
    let kept: Vec<&QuickWin> = all.iter().filter(|q| q.source == QuickWinSource::User).collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, mine.id);
    assert_eq!(kept[0].status, QuickWinStatus::InProgress);
    assert_eq!(all.last().unwrap().id, mine.id);
}

#[test]
fn test_failed_write_leaves_previous_run_in_place() {
    let engine = DetectionEngine::new(FaultyStore::new()).unwrap();
    engine.store().record_responses("org-1", &worked_example()).unwrap();
    let before = engine.run_detection("org-1").unwrap();

    // New answers would change the result, but the write fails
    engine
        .store()
        .record_responses("org-1", &[Response::new(7, 1, Dimension::Effectiveness)])
        .unwrap();
    engine.store().fail_quick_wins.store(true, Ordering::SeqCst);

    let err = engine.run_detection("org-1").unwrap_err();
    assert!(matches!(err, EngineError::Storage(StorageError::Backend(_))));

    assert_eq!(engine.store().load_archetype_matches("org-1").unwrap(), before.matches);
    assert_eq!(
        system_titles(&engine.store().list_quick_wins("org-1").unwrap()),
        system_titles(&before.quick_wins)
    );
    assert_eq!(
        engine.store().latest_detection_run("org-1").unwrap().unwrap().run_id,
        before.run_id
    );
}

#[test]
fn test_unknown_template_at_run_time_fails_the_run() {
    let engine = DetectionEngine::new(FaultyStore::new()).unwrap();
    engine.store().record_responses("org-1", &worked_example()).unwrap();
    engine.store().stray_template.store(true, Ordering::SeqCst);

    let err = engine.run_detection("org-1").unwrap_err();
    assert!(matches!(err, EngineError::InvalidCatalog(_)));
    assert!(engine.store().list_quick_wins("org-1").unwrap().is_empty());
    assert!(engine.store().load_archetype_matches("org-1").unwrap().is_empty());
}

#[test]
fn test_no_low_scores_gets_general_quick_wins() {
    let engine = memory_engine();
    engine
        .store()
        .record_responses(
            "org-1",
            &[
                Response::new(1, 5, Dimension::Efficiency),
                Response::new(7, 4, Dimension::Effectiveness),
            ],
        )
        .unwrap();

    let report = engine.run_detection("org-1").unwrap();
    assert!(report.matches.is_empty());
    assert!(!report.fallback_used);

    let titles = system_titles(&report.quick_wins);
    assert_eq!(
        titles,
        vec![
            ("Map one core process end to end".to_string(), Dimension::Efficiency),
            ("Hold a blameless retrospective".to_string(), Dimension::Excellence),
        ]
    );
    assert!(report.quick_wins.iter().all(|q| q.archetype.is_none()));
}

#[test]
fn test_fallback_single_pick_is_persisted() {
    let engine = memory_engine();
    // One low score among Escalation's three diagnostics: 0.7 / 3 is below threshold
    engine
        .store()
        .record_responses("org-1", &[Response::new(3, 2, Dimension::Efficiency)])
        .unwrap();

    let report = engine.run_detection("org-1").unwrap();
    assert!(report.fallback_used);
    assert_eq!(report.matches.len(), 1);
    // Escalation is the earliest archetype listing question 3
    assert_eq!(report.matches[0].archetype_name, "Escalation");
    assert!(report.matches[0].confidence <= 0.3);
    assert!(engine.store().latest_detection_run("org-1").unwrap().unwrap().fallback_used);
}

#[test]
fn test_mis_tagged_answer_in_store_fails_the_run() {
    let dir = tempdir().unwrap();
    let engine = sqlite_engine(&dir.path().join("lens.db"));
    engine
        .store()
        .record_responses("org-1", &[Response::new(7, 1, Dimension::Excellence)])
        .unwrap();

    let err = engine.run_detection("org-1").unwrap_err();
    assert!(matches!(err, EngineError::InvalidResponse(_)));
    assert!(engine.store().list_quick_wins("org-1").unwrap().is_empty());
}

#[test]
fn test_missing_responses_is_an_error() {
    let dir = tempdir().unwrap();
    let engine = sqlite_engine(&dir.path().join("lens.db"));
    let err = engine.run_detection("nobody").unwrap_err();
    assert!(matches!(err, EngineError::NoResponses { ref user_id } if user_id == "nobody"));
    assert!(engine.store().latest_detection_run("nobody").unwrap().is_none());
}

#[test]
fn test_concurrent_users_on_sqlite() {
    let dir = tempdir().unwrap();
    let engine = Arc::new(sqlite_engine(&dir.path().join("lens.db")));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let user = format!("org-{}", i);
                engine.store().record_responses(&user, &worked_example()).unwrap();
                for _ in 0..3 {
                    engine.run_detection(&user).unwrap();
                }
                user
            })
        })
        .collect();

    for handle in handles {
        let user = handle.join().unwrap();
        let quick_wins = engine.store().list_quick_wins(&user).unwrap();
        assert_eq!(quick_wins.len(), 2);
        assert!(quick_wins.iter().all(|q| q.user_id == user));
        assert_eq!(engine.store().load_archetype_matches(&user).unwrap().len(), 1);
    }
}

#[test]
fn test_concurrent_runs_same_user_on_memory_store() {
    let engine = Arc::new(memory_engine());
    engine.store().record_responses("org-1", &worked_example()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.run_detection("org-1").unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Last writer wins; never a doubled set
    assert_eq!(engine.store().list_quick_wins("org-1").unwrap().len(), 2);
    assert_eq!(engine.store().load_archetype_matches("org-1").unwrap().len(), 1);
}
