//! Archetype Matcher
//!
//! Scores every archetype in the catalog against a response set:
//!
//! ```text
//! diagnostic_ratio = low-scoring diagnostic answers / diagnostic questions
//! symptom_ratio    = keywords found in the first diagnostic comment / keywords
//! confidence       = 0.7 * diagnostic_ratio + 0.3 * symptom_ratio
//! ```
//!
//! Archetypes above the threshold are returned strongest first, ties kept in
//! catalog order. If none clears it, the single archetype with the most
//! low-scoring diagnostic answers (earliest in the catalog on a tie) is
//! returned instead, unless there are no low scores at all.

use crate::catalog::{ArchetypeCatalog, ArchetypeDefinition};
use crate::responses::ResponseSet;
use crate::types::{ArchetypeMatch, Dimension};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Weight of score evidence
pub const DIAGNOSTIC_WEIGHT: f64 = 0.7;
/// Weight of comment evidence
pub const SYMPTOM_WEIGHT: f64 = 0.3;
/// Confidence must be strictly greater than this to be accepted
pub const ACCEPTANCE_THRESHOLD: f64 = 0.3;

/// Everything the matcher computed for one archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeEvidence {
    pub archetype_name: String,
    pub low_scoring_count: usize,
    pub diagnostic_total: usize,
    pub diagnostic_ratio: f64,
    pub matched_keywords: Vec<String>,
    pub symptom_ratio: f64,
    pub confidence: f64,
    /// Dimension of the first low-scoring diagnostic answer
    pub source_dimension: Option<Dimension>,
}

impl ArchetypeEvidence {
    pub fn is_accepted(&self) -> bool {
        self.confidence > ACCEPTANCE_THRESHOLD
    }
}

/// Matches plus the per-archetype evidence behind them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub matches: Vec<ArchetypeMatch>,
    /// One entry per catalog archetype, in catalog order
    pub evidence: Vec<ArchetypeEvidence>,
    pub fallback_used: bool,
}

/// Ordered archetype matches for a response set
pub fn match_archetypes(
    responses: &ResponseSet,
    catalog: &ArchetypeCatalog,
) -> Vec<ArchetypeMatch> {
    evaluate(responses, catalog).matches
}

/// Score every archetype and apply the acceptance and fallback policy
pub fn evaluate(responses: &ResponseSet, catalog: &ArchetypeCatalog) -> MatchReport {
    let evidence: Vec<ArchetypeEvidence> = catalog
        .archetypes()
        .iter()
        .map(|def| score_archetype(responses, def))
        .collect();

    for e in &evidence {
        debug!(
            archetype = %e.archetype_name,
            low_scoring = e.low_scoring_count,
            diagnostic_ratio = e.diagnostic_ratio,
            symptom_ratio = e.symptom_ratio,
            confidence = e.confidence,
            "Scored archetype"
        );
    }

    // (catalog index, evidence) so ties fall back to catalog order
    let mut accepted: Vec<(usize, &ArchetypeEvidence)> = evidence
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_accepted())
        .collect();
    accepted.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence).then(a.0.cmp(&b.0)));

    let mut fallback_used = false;
    let selected: Vec<(usize, &ArchetypeEvidence)> = if accepted.is_empty() {
        match fallback_pick(&evidence) {
            Some(pick) => {
                warn!(
                    archetype = %pick.1.archetype_name,
                    low_scoring = pick.1.low_scoring_count,
                    "No archetype cleared the threshold, using strongest signal"
                );
                fallback_used = true;
                vec![pick]
            }
            None => Vec::new(),
        }
    } else {
        accepted
    };

    let matches = selected
        .into_iter()
        .filter_map(|(index, e)| to_match(&catalog.archetypes()[index], e))
        .collect();

    MatchReport {
        matches,
        evidence,
        fallback_used,
    }
}

/// Compute ratios and confidence for a single archetype
pub fn score_archetype(responses: &ResponseSet, def: &ArchetypeDefinition) -> ArchetypeEvidence {
    let diagnostic_total = def.diagnostic_question_ids.len();
    let low_scoring_count = responses.low_scoring_count(&def.diagnostic_question_ids);
    let diagnostic_ratio = ratio(low_scoring_count, diagnostic_total);

    let matched_keywords: Vec<String> = def
        .diagnostic_question_ids
        .first()
        .and_then(|id| responses.comment_lowercase(*id))
        .map(|comment| {
            def.symptom_keywords
                .iter()
                .filter(|k| comment.contains(k.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    let symptom_ratio = ratio(matched_keywords.len(), def.symptom_keywords.len());

    let confidence =
        (DIAGNOSTIC_WEIGHT * diagnostic_ratio + SYMPTOM_WEIGHT * symptom_ratio).clamp(0.0, 1.0);

    let source_dimension = def
        .diagnostic_question_ids
        .iter()
        .filter_map(|id| responses.get(*id))
        .find(|r| r.is_low_scoring())
        .map(|r| r.dimension);

    ArchetypeEvidence {
        archetype_name: def.name.clone(),
        low_scoring_count,
        diagnostic_total,
        diagnostic_ratio,
        matched_keywords,
        symptom_ratio,
        confidence,
        source_dimension,
    }
}

/// First archetype holding the maximum low-scoring count, if that maximum is non-zero
fn fallback_pick(evidence: &[ArchetypeEvidence]) -> Option<(usize, &ArchetypeEvidence)> {
    let max_low = evidence.iter().map(|e| e.low_scoring_count).max()?;
    if max_low == 0 {
        return None;
    }
    evidence
        .iter()
        .enumerate()
        .find(|(_, e)| e.low_scoring_count == max_low)
}

fn to_match(def: &ArchetypeDefinition, evidence: &ArchetypeEvidence) -> Option<ArchetypeMatch> {
    // Accepted and fallback archetypes always have at least one low score
    let source_dimension = evidence.source_dimension?;
    Some(ArchetypeMatch {
        archetype_name: def.name.clone(),
        source_dimension,
        insight: insight(def, evidence),
        confidence: evidence.confidence,
    })
}

fn insight(def: &ArchetypeDefinition, evidence: &ArchetypeEvidence) -> String {
    let mut text = format!(
        "{} {} of {} diagnostic answers scored 3 or below",
        def.key_pattern, evidence.low_scoring_count, evidence.diagnostic_total
    );
    if evidence.matched_keywords.is_empty() {
        text.push('.');
    } else {
        let quoted: Vec<String> = evidence
            .matched_keywords
            .iter()
            .map(|k| format!("\"{}\"", k))
            .collect();
        text.push_str(&format!(", and comments mention {}.", quoted.join(", ")));
    }
    text
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
