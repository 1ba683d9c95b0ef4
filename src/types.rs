//! Core types for archetype detection
//!
//! These types carry the assessment through the engine:
//! - Responses come in (one per question, latest wins)
//! - Archetype matches come out of the matcher
//! - Quick wins come out of the binder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three assessment axes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Efficiency,
    Effectiveness,
    Excellence,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [
        Dimension::Efficiency,
        Dimension::Effectiveness,
        Dimension::Excellence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Efficiency => "efficiency",
            Dimension::Effectiveness => "effectiveness",
            Dimension::Excellence => "excellence",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Efficiency => "Efficiency",
            Dimension::Effectiveness => "Effectiveness",
            Dimension::Excellence => "Excellence",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "efficiency" => Ok(Dimension::Efficiency),
            "effectiveness" => Ok(Dimension::Effectiveness),
            "excellence" => Ok(Dimension::Excellence),
            other => Err(format!("unknown dimension: {}", other)),
        }
    }
}

/// A single questionnaire answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub question_id: u32,
    /// 1 (strongly disagree) to 5 (strongly agree)
    pub score: u8,
    pub comment: Option<String>,
    pub dimension: Dimension,
}

impl Response {
    pub fn new(question_id: u32, score: u8, dimension: Dimension) -> Self {
        Self {
            question_id,
            score,
            comment: None,
            dimension,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Scores of 3 or below count as evidence for an archetype
    pub fn is_low_scoring(&self) -> bool {
        self.score <= LOW_SCORE_CEILING
    }
}

/// Highest score still treated as a low score
pub const LOW_SCORE_CEILING: u8 = 3;

/// A raw answer as submitted, before the questionnaire assigns its dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSubmission {
    pub question_id: u32,
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

/// An archetype the matcher believes is present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeMatch {
    pub archetype_name: String,
    pub source_dimension: Dimension,
    pub insight: String,
    /// Always within [0, 1]
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        }
    }
}

impl FromStr for ImpactLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(ImpactLevel::Low),
            "medium" => Ok(ImpactLevel::Medium),
            "high" => Ok(ImpactLevel::High),
            other => Err(format!("unknown impact level: {}", other)),
        }
    }
}

/// A catalog recommendation attached to an archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickWinTemplate {
    pub archetype_name: String,
    pub title: String,
    pub description: String,
    pub impact_level: ImpactLevel,
}

/// Who created a quick win
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QuickWinSource {
    /// Generated by a detection run; replaced on every rerun
    System,
    /// Entered by the user; never touched by detection
    User,
}

impl QuickWinSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuickWinSource::System => "system",
            QuickWinSource::User => "user",
        }
    }
}

impl FromStr for QuickWinSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(QuickWinSource::System),
            "user" => Ok(QuickWinSource::User),
            other => Err(format!("unknown quick win source: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuickWinStatus {
    #[default]
    ToDo,
    InProgress,
    Done,
}

impl QuickWinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuickWinStatus::ToDo => "to_do",
            QuickWinStatus::InProgress => "in_progress",
            QuickWinStatus::Done => "done",
        }
    }
}

impl FromStr for QuickWinStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "to_do" | "todo" => Ok(QuickWinStatus::ToDo),
            "in_progress" => Ok(QuickWinStatus::InProgress),
            "done" => Ok(QuickWinStatus::Done),
            other => Err(format!("unknown quick win status: {}", other)),
        }
    }
}

/// A short-term recommended action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickWin {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub source: QuickWinSource,
    pub archetype: Option<String>,
    pub dimension: Dimension,
    pub impact_level: ImpactLevel,
    pub status: QuickWinStatus,
}

impl QuickWin {
    /// Same recommendation regardless of id or progress
    pub fn same_content(&self, other: &QuickWin) -> bool {
        self.user_id == other.user_id
            && self.title == other.title
            && self.description == other.description
            && self.source == other.source
            && self.archetype == other.archetype
            && self.dimension == other.dimension
            && self.impact_level == other.impact_level
    }
}

/// Result of a completed detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub run_id: String,
    pub user_id: String,
    pub catalog_fingerprint: String,
    /// True when no archetype cleared the threshold and the strongest tied signal was used
    pub fallback_used: bool,
    pub matches: Vec<ArchetypeMatch>,
    pub quick_wins: Vec<QuickWin>,
    pub created_at: DateTime<Utc>,
}

/// Stored record of a persisted detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRun {
    pub run_id: String,
    pub user_id: String,
    pub catalog_fingerprint: String,
    pub fallback_used: bool,
    pub match_count: usize,
    pub quick_win_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&DetectionReport> for DetectionRun {
    fn from(report: &DetectionReport) -> Self {
        Self {
            run_id: report.run_id.clone(),
            user_id: report.user_id.clone(),
            catalog_fingerprint: report.catalog_fingerprint.clone(),
            fallback_used: report.fallback_used,
            match_count: report.matches.len(),
            quick_win_count: report.quick_wins.len(),
            created_at: report.created_at,
        }
    }
}

impl DetectionReport {
    pub fn summary(&self) -> String {
        let top = self
            .matches
            .first()
            .map(|m| format!("{} ({:.0}%)", m.archetype_name, m.confidence * 100.0))
            .unwrap_or_else(|| "none".to_string());

        format!(
            "{} archetype(s) detected{}. Top: {}. {} quick win(s) proposed.",
            self.matches.len(),
            if self.fallback_used { " via fallback" } else { "" },
            top,
            self.quick_wins.len()
        )
    }
}
