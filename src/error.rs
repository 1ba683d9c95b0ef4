//! Error types for archetype detection
//!
//! - `NoResponses` is recoverable: the user has not answered yet
//! - `InvalidCatalog` is a configuration fault, raised at load time
//! - `Storage` comes from the persistence adapter and is passed through as-is

/// Errors surfaced by the detection engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The user has no recorded responses
    #[error("no responses recorded for user {user_id}")]
    NoResponses { user_id: String },

    /// The archetype catalog failed validation
    #[error("invalid catalog: {0}")]
    InvalidCatalog(#[from] CatalogError),

    /// A submitted answer does not fit the questionnaire
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The persistence adapter failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Whether the caller can recover by asking the user for input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::NoResponses { .. } | EngineError::InvalidResponse(_)
        )
    }
}

/// Catalog validation failures
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("archetype at position {position} has a blank name")]
    BlankName { position: usize },

    #[error("archetype {0:?} is defined more than once")]
    DuplicateArchetype(String),

    #[error("archetype {0:?} has no diagnostic questions")]
    EmptyDiagnostics(String),

    #[error("archetype {archetype:?} lists question {question_id} more than once")]
    DuplicateDiagnosticQuestion { archetype: String, question_id: u32 },

    #[error("archetype {archetype:?} references unknown question {question_id}")]
    UnknownQuestion { archetype: String, question_id: u32 },

    #[error("archetype {0:?} has a blank symptom keyword")]
    BlankKeyword(String),

    #[error("quick win {title:?} references unknown archetype {archetype:?}")]
    UnknownArchetype { title: String, archetype: String },

    #[error("quick win for archetype {0:?} has a blank title")]
    BlankTemplateTitle(String),

    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Persistence adapter failures
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded into a domain value
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("quick win {0} not found")]
    NotFound(String),

    #[error("store lock poisoned")]
    Poisoned,

    /// Injected or backend-specific failure
    #[error("{0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(EngineError::NoResponses {
            user_id: "u1".into()
        }
        .is_recoverable());
        assert!(!EngineError::InvalidCatalog(CatalogError::EmptyDiagnostics("X".into()))
            .is_recoverable());
        assert!(!EngineError::Storage(StorageError::Poisoned).is_recoverable());
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = EngineError::from(CatalogError::UnknownArchetype {
            title: "Hold a retro".into(),
            archetype: "Nonexistent".into(),
        });
        let msg = err.to_string();
        assert!(msg.contains("Hold a retro"));
        assert!(msg.contains("Nonexistent"));
    }
}
