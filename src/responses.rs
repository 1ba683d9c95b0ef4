//! Normalized set of a user's latest answers

use crate::error::EngineError;
use crate::questionnaire;
use crate::types::{Dimension, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// At most one response per question, keyed in question order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSet {
    responses: BTreeMap<u32, Response>,
}

impl ResponseSet {
    /// Build from answers in submission order
    ///
    /// A later response for the same question supersedes an earlier one.
    /// Unknown questions and mis-tagged dimensions are rejected.
    pub fn new(responses: impl IntoIterator<Item = Response>) -> Result<Self, EngineError> {
        let mut map = BTreeMap::new();
        for response in responses {
            questionnaire::validate_response(&response)?;
            map.insert(response.question_id, response);
        }
        Ok(Self { responses: map })
    }

    pub fn get(&self, question_id: u32) -> Option<&Response> {
        self.responses.get(&question_id)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Response> {
        self.responses.values()
    }

    /// Low-scoring answers among the given questions; missing answers never count
    pub fn low_scoring_count(&self, question_ids: &[u32]) -> usize {
        question_ids
            .iter()
            .filter(|id| self.get(**id).is_some_and(Response::is_low_scoring))
            .count()
    }

    /// Lower-cased comment for a question, if present
    pub fn comment_lowercase(&self, question_id: u32) -> Option<String> {
        self.get(question_id)
            .and_then(|r| r.comment.as_deref())
            .map(str::to_lowercase)
    }

    /// Average score and completion per dimension
    pub fn dimension_summary(&self) -> Vec<DimensionSummary> {
        Dimension::ALL
            .iter()
            .map(|dim| {
                let scores: Vec<u8> = self
                    .iter()
                    .filter(|r| r.dimension == *dim)
                    .map(|r| r.score)
                    .collect();
                let answered = scores.len();
                let average_score = if answered == 0 {
                    None
                } else {
                    Some(scores.iter().map(|s| *s as f64).sum::<f64>() / answered as f64)
                };

                DimensionSummary {
                    dimension: *dim,
                    answered,
                    total: questionnaire::questions_in(*dim),
                    average_score,
                    low_scoring: scores
                        .iter()
                        .filter(|s| **s <= crate::types::LOW_SCORE_CEILING)
                        .count(),
                }
            })
            .collect()
    }
}

/// Per-dimension rollup of a response set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSummary {
    pub dimension: Dimension,
    pub answered: usize,
    pub total: usize,
    pub average_score: Option<f64>,
    pub low_scoring: usize,
}

impl DimensionSummary {
    pub fn completion(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.answered as f64 / self.total as f64
        }
    }
}
