//! The fixed self-assessment questionnaire
//!
//! Fifteen statements, five per dimension. Each is rated 1 (strongly
//! disagree) to 5 (strongly agree), so a low score points at a problem.

use crate::error::EngineError;
use crate::types::{Dimension, Response, ResponseSubmission};
use serde::{Deserialize, Serialize};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// A questionnaire item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub dimension: Dimension,
    pub text: String,
}

#[rustfmt::skip]
const QUESTIONS: &[(u32, Dimension, &str)] = &[
    (1, Dimension::Efficiency, "Problems are resolved at their root cause rather than with workarounds."),
    (2, Dimension::Efficiency, "People, budget and tooling grow in step with demand."),
    (3, Dimension::Efficiency, "Work moves between teams without waiting, hand-off loss or rework."),
    (4, Dimension::Efficiency, "Teams build their own capability instead of relying on outside experts or heroics."),
    (5, Dimension::Efficiency, "Shared resources such as infrastructure and specialists are used without being overdrawn."),
    (6, Dimension::Effectiveness, "Goals and targets hold steady instead of being lowered when they are missed."),
    (7, Dimension::Effectiveness, "Teams cooperate toward shared objectives rather than competing with each other."),
    (8, Dimension::Effectiveness, "Capacity is added before demand outgrows it."),
    (9, Dimension::Effectiveness, "Fixes are checked for their long-term side effects before they are rolled out."),
    (10, Dimension::Effectiveness, "Resources and recognition are spread fairly across teams and projects."),
    (11, Dimension::Excellence, "Growth initiatives keep their momentum without running into hidden limits."),
    (12, Dimension::Excellence, "Quality standards are held even under deadline pressure."),
    (13, Dimension::Excellence, "Leadership tackles underlying causes rather than short-term symptoms."),
    (14, Dimension::Excellence, "Departments and partners support rather than undermine each other's work."),
    (15, Dimension::Excellence, "Lessons learned are fed back into how work is done."),
];

/// All questions in id order
pub fn questions() -> Vec<Question> {
    QUESTIONS
        .iter()
        .map(|(id, dimension, text)| Question {
            id: *id,
            dimension: *dimension,
            text: text.to_string(),
        })
        .collect()
}

pub fn question_count() -> usize {
    QUESTIONS.len()
}

/// Number of questions tagged with a dimension
pub fn questions_in(dimension: Dimension) -> usize {
    QUESTIONS.iter().filter(|(_, d, _)| *d == dimension).count()
}

pub fn dimension_of(question_id: u32) -> Option<Dimension> {
    QUESTIONS
        .iter()
        .find(|(id, _, _)| *id == question_id)
        .map(|(_, d, _)| *d)
}

pub fn contains(question_id: u32) -> bool {
    dimension_of(question_id).is_some()
}

/// Check a score is on the 1-5 scale
pub fn validate_score(question_id: u32, score: u8) -> Result<(), EngineError> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(EngineError::InvalidResponse(format!(
            "question {} scored {}, expected {}..={}",
            question_id, score, MIN_SCORE, MAX_SCORE
        )));
    }
    Ok(())
}

/// Check a stored response against the questionnaire
pub fn validate_response(response: &Response) -> Result<(), EngineError> {
    match dimension_of(response.question_id) {
        None => Err(EngineError::InvalidResponse(format!(
            "unknown question {}",
            response.question_id
        ))),
        Some(dimension) if dimension != response.dimension => {
            Err(EngineError::InvalidResponse(format!(
                "question {} belongs to {}, tagged {}",
                response.question_id, dimension, response.dimension
            )))
        }
        Some(_) => validate_score(response.question_id, response.score),
    }
}

/// Turn raw submissions into dimension-tagged responses
///
/// Rejects unknown question ids and out-of-range scores. Blank comments are dropped.
pub fn resolve(submissions: &[ResponseSubmission]) -> Result<Vec<Response>, EngineError> {
    submissions
        .iter()
        .map(|s| {
            let dimension = dimension_of(s.question_id).ok_or_else(|| {
                EngineError::InvalidResponse(format!("unknown question {}", s.question_id))
            })?;
            validate_score(s.question_id, s.score)?;

            let comment = s
                .comment
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);

            Ok(Response {
                question_id: s.question_id,
                score: s.score,
                comment,
                dimension,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_questions_per_dimension() {
        assert_eq!(question_count(), 15);
        for dim in Dimension::ALL {
            assert_eq!(questions_in(dim), 5, "{} should have 5 questions", dim);
        }
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let ids: Vec<u32> = questions().iter().map(|q| q.id).collect();
        let expected: Vec<u32> = (1..=15).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_resolve_assigns_dimension_and_trims_comment() {
        let responses = resolve(&[
            ResponseSubmission {
                question_id: 1,
                score: 2,
                comment: Some("  we applied a quick fix ".into()),
            },
            ResponseSubmission {
                question_id: 13,
                score: 4,
                comment: Some("   ".into()),
            },
        ])
        .unwrap();

        assert_eq!(responses[0].dimension, Dimension::Efficiency);
        assert_eq!(responses[0].comment.as_deref(), Some("we applied a quick fix"));
        assert_eq!(responses[1].dimension, Dimension::Excellence);
        assert!(responses[1].comment.is_none());
    }

    #[test]
    fn test_resolve_rejects_unknown_question() {
        let err = resolve(&[ResponseSubmission {
            question_id: 99,
            score: 3,
            comment: None,
        }])
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidResponse(_)));
    }

    #[test]
    fn test_resolve_rejects_out_of_range_scores() {
        for score in [0u8, 6, 255] {
            let result = resolve(&[ResponseSubmission {
                question_id: 2,
                score,
                comment: None,
            }]);
            assert!(result.is_err(), "score {} should be rejected", score);
        }
    }
}
