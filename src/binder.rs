//! Recommendation Binder
//!
//! Turns archetype matches into system quick wins. Each template attached to
//! a matched archetype becomes one quick win in that match's dimension. If
//! nothing in the catalog applies, a fixed pair of general recommendations is
//! returned so a finished assessment never comes back empty-handed.

use crate::types::{
    ArchetypeMatch, Dimension, ImpactLevel, QuickWin, QuickWinSource, QuickWinStatus,
    QuickWinTemplate,
};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

/// Bind templates to matches for one user
///
/// Output follows match order, then template order. A template that would
/// produce the same title in the same dimension twice is only bound once.
pub fn bind(
    user_id: &str,
    matches: &[ArchetypeMatch],
    templates: &[QuickWinTemplate],
) -> Vec<QuickWin> {
    let mut seen: HashSet<(String, Dimension)> = HashSet::new();
    let mut quick_wins = Vec::new();

    for m in matches {
        for template in templates.iter().filter(|t| t.archetype_name == m.archetype_name) {
            if !seen.insert((template.title.clone(), m.source_dimension)) {
                continue;
            }
            quick_wins.push(QuickWin {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                title: template.title.clone(),
                description: template.description.clone(),
                source: QuickWinSource::System,
                archetype: Some(m.archetype_name.clone()),
                dimension: m.source_dimension,
                impact_level: template.impact_level,
                status: QuickWinStatus::ToDo,
            });
        }
    }

    if quick_wins.is_empty() {
        warn!(
            user_id,
            matches = matches.len(),
            "No templates for matched archetypes, using general quick wins"
        );
        return fallback_quick_wins(user_id);
    }

    quick_wins
}

/// The two general recommendations, one Efficiency and one Excellence
pub fn fallback_quick_wins(user_id: &str) -> Vec<QuickWin> {
    [
        (
            "Map one core process end to end",
            "Walk a single piece of work from request to delivery with the people who touch it and mark every wait and hand-off.",
            Dimension::Efficiency,
        ),
        (
            "Hold a blameless retrospective",
            "Review a recent setback with the team, focusing on how the system produced it rather than who was at fault, and pick one change to try.",
            Dimension::Excellence,
        ),
    ]
    .into_iter()
    .map(|(title, description, dimension)| QuickWin {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        source: QuickWinSource::System,
        archetype: None,
        dimension,
        impact_level: ImpactLevel::Medium,
        status: QuickWinStatus::ToDo,
    })
    .collect()
}
