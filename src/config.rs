//! Runtime configuration
//!
//! Everything lives under one data directory (XDG data dir on Linux,
//! ~/Library/Application Support on macOS). Environment variables override.

use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "ARCHETYPE_LENS_DATA_DIR";
pub const DB_PATH_ENV: &str = "ARCHETYPE_LENS_DB";
pub const CATALOG_PATH_ENV: &str = "ARCHETYPE_LENS_CATALOG";

const APP_DIR: &str = "archetype-lens";
const DB_FILE: &str = "lens.db";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// JSON catalog to seed instead of the built-in table
    pub catalog_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup(DATA_DIR_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let db_path = lookup(DB_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(DB_FILE));

        let catalog_path = lookup(CATALOG_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            data_dir,
            db_path,
            catalog_path,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
