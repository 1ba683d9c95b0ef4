//! Archetype Catalog: the hand-authored table of systemic dysfunctions
//!
//! Each archetype names the questions whose low scores are evidence for it
//! and the phrases that tend to show up in comments when it is present.
//! Quick-win templates hang off archetypes by name.
//!
//! The table is validated once when it is built. Anything that would make
//! scoring ill-defined (an empty diagnostic list, a template pointing at an
//! archetype that does not exist) is rejected here rather than skipped later.

use crate::error::CatalogError;
use crate::questionnaire;
use crate::types::{ImpactLevel, QuickWinTemplate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// A systemic archetype and how to recognise it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeDefinition {
    pub name: String,
    pub description: String,
    /// Lower-cased, matched as substrings of the first diagnostic answer's comment
    pub symptom_keywords: Vec<String>,
    /// Non-empty; the first entry is the one whose comment is searched for symptoms
    pub diagnostic_question_ids: Vec<u32>,
    pub key_pattern: String,
}

/// On-disk shape of a catalog file
#[derive(Debug, Deserialize)]
struct CatalogFile {
    archetypes: Vec<ArchetypeDefinition>,
    #[serde(default)]
    quick_wins: Vec<QuickWinTemplate>,
}

/// A validated catalog. Archetype order is priority order for tie-breaks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchetypeCatalog {
    archetypes: Vec<ArchetypeDefinition>,
    quick_wins: Vec<QuickWinTemplate>,
}

impl ArchetypeCatalog {
    /// Validate and normalize a catalog
    pub fn new(
        archetypes: Vec<ArchetypeDefinition>,
        quick_wins: Vec<QuickWinTemplate>,
    ) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        let mut normalized = Vec::with_capacity(archetypes.len());

        for (position, mut def) in archetypes.into_iter().enumerate() {
            def.name = def.name.trim().to_string();
            if def.name.is_empty() {
                return Err(CatalogError::BlankName { position });
            }
            if !names.insert(def.name.clone()) {
                return Err(CatalogError::DuplicateArchetype(def.name));
            }
            if def.diagnostic_question_ids.is_empty() {
                return Err(CatalogError::EmptyDiagnostics(def.name));
            }

            let mut seen = HashSet::new();
            for &question_id in &def.diagnostic_question_ids {
                if !seen.insert(question_id) {
                    return Err(CatalogError::DuplicateDiagnosticQuestion {
                        archetype: def.name,
                        question_id,
                    });
                }
                if !questionnaire::contains(question_id) {
                    return Err(CatalogError::UnknownQuestion {
                        archetype: def.name,
                        question_id,
                    });
                }
            }

            def.symptom_keywords = normalize_keywords(&def.name, &def.symptom_keywords)?;
            normalized.push(def);
        }

        for template in &quick_wins {
            if !names.contains(template.archetype_name.as_str()) {
                return Err(CatalogError::UnknownArchetype {
                    title: template.title.clone(),
                    archetype: template.archetype_name.clone(),
                });
            }
            if template.title.trim().is_empty() {
                return Err(CatalogError::BlankTemplateTitle(
                    template.archetype_name.clone(),
                ));
            }
        }

        Ok(Self {
            archetypes: normalized,
            quick_wins,
        })
    }

    /// Catalog with archetypes only; templates are supplied separately
    pub fn from_archetypes(archetypes: Vec<ArchetypeDefinition>) -> Result<Self, CatalogError> {
        Self::new(archetypes, Vec::new())
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.archetypes, file.quick_wins)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The built-in catalog
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(builtin_archetypes(), builtin_quick_wins())
    }

    pub fn archetypes(&self) -> &[ArchetypeDefinition] {
        &self.archetypes
    }

    pub fn quick_wins(&self) -> &[QuickWinTemplate] {
        &self.quick_wins
    }

    pub fn get(&self, name: &str) -> Option<&ArchetypeDefinition> {
        self.archetypes.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.archetypes.iter().map(|a| a.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Templates for the named archetypes, in catalog order
    pub fn templates_for(&self, names: &[String]) -> Vec<QuickWinTemplate> {
        self.quick_wins
            .iter()
            .filter(|t| names.iter().any(|n| *n == t.archetype_name))
            .cloned()
            .collect()
    }

    /// Check templates loaded from elsewhere against this catalog
    pub fn check_templates(&self, templates: &[QuickWinTemplate]) -> Result<(), CatalogError> {
        match templates.iter().find(|t| !self.contains(&t.archetype_name)) {
            Some(t) => Err(CatalogError::UnknownArchetype {
                title: t.title.clone(),
                archetype: t.archetype_name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Short SHA-256 of the catalog contents, recorded with each detection run
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for def in &self.archetypes {
            hasher.update(def.name.as_bytes());
            hasher.update([0]);
            hasher.update(def.key_pattern.as_bytes());
            hasher.update([0]);
            for id in &def.diagnostic_question_ids {
                hasher.update(id.to_le_bytes());
            }
            for keyword in &def.symptom_keywords {
                hasher.update(keyword.as_bytes());
                hasher.update([0]);
            }
        }
        for template in &self.quick_wins {
            hasher.update(template.archetype_name.as_bytes());
            hasher.update([0]);
            hasher.update(template.title.as_bytes());
            hasher.update([0]);
            hasher.update(template.impact_level.as_str().as_bytes());
        }
        hex::encode(&hasher.finalize()[..8])
    }
}

fn normalize_keywords(archetype: &str, keywords: &[String]) -> Result<Vec<String>, CatalogError> {
    let mut out: Vec<String> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let k = keyword.trim().to_lowercase();
        if k.is_empty() {
            return Err(CatalogError::BlankKeyword(archetype.to_string()));
        }
        if !out.contains(&k) {
            out.push(k);
        }
    }
    Ok(out)
}

// ============================================================================
// BUILT-IN TABLE
// ============================================================================

pub fn builtin_archetypes() -> Vec<ArchetypeDefinition> {
    vec![
        shifting_the_burden(),
        fixes_that_fail(),
        limits_to_growth(),
        escalation(),
        success_to_the_successful(),
        tragedy_of_the_commons(),
        eroding_goals(),
        growth_and_underinvestment(),
        accidental_adversaries(),
    ]
}

fn archetype(
    name: &str,
    description: &str,
    key_pattern: &str,
    keywords: &[&str],
    diagnostic_question_ids: &[u32],
) -> ArchetypeDefinition {
    ArchetypeDefinition {
        name: name.to_string(),
        description: description.to_string(),
        symptom_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        diagnostic_question_ids: diagnostic_question_ids.to_vec(),
        key_pattern: key_pattern.to_string(),
    }
}

fn shifting_the_burden() -> ArchetypeDefinition {
    archetype(
        "Shifting the Burden",
        "A symptomatic solution relieves the problem quickly, so the fundamental solution is never built and the organization grows dependent on the workaround.",
        "Short-term fixes are used repeatedly while the underlying cause goes unaddressed.",
        &["quick fix", "temporary solution", "symptom treatment", "dependency"],
        &[1, 4, 9, 13],
    )
}

fn fixes_that_fail() -> ArchetypeDefinition {
    archetype(
        "Fixes that Fail",
        "A fix works at first, but its unintended consequences feed back and make the original problem worse over time.",
        "The same problem keeps coming back after each fix, often bigger than before.",
        &["side effect", "came back", "recurring", "workaround", "unintended"],
        &[9, 1, 15],
    )
}

fn limits_to_growth() -> ArchetypeDefinition {
    archetype(
        "Limits to Growth",
        "A reinforcing growth process runs into a balancing constraint that slows it, and pushing harder on growth only makes the limit bite sooner.",
        "Early success stalls even though effort keeps increasing.",
        &["plateau", "bottleneck", "capacity", "slowing down", "stalled"],
        &[11, 2, 8],
    )
}

fn escalation() -> ArchetypeDefinition {
    archetype(
        "Escalation",
        "Two parties each see the other's actions as a threat and respond in kind, driving a cycle of retaliation neither wanted.",
        "Each side's defensive move provokes a bigger move from the other.",
        &["competition", "retaliation", "arms race", "us versus them", "blame"],
        &[7, 14, 3],
    )
}

fn success_to_the_successful() -> ArchetypeDefinition {
    archetype(
        "Success to the Successful",
        "Whoever does well early receives more resources, which widens the gap and starves alternatives regardless of their potential.",
        "Resources flow to past winners while other efforts wither.",
        &["favoritism", "starved", "winner", "unequal", "neglected"],
        &[10, 7],
    )
}

fn tragedy_of_the_commons() -> ArchetypeDefinition {
    archetype(
        "Tragedy of the Commons",
        "Individuals draw on a shared resource for their own gain until the resource is depleted for everyone.",
        "A shared resource degrades because nobody owns its upkeep.",
        &["overuse", "shared resource", "depleted", "nobody owns", "exhausted"],
        &[5, 10, 3],
    )
}

fn eroding_goals() -> ArchetypeDefinition {
    archetype(
        "Eroding Goals",
        "When performance falls short, the goal is lowered instead of performance being raised, and standards drift downward.",
        "Targets quietly move to match results.",
        &["lowered target", "good enough", "standards slip", "moved the goalposts", "compromise"],
        &[6, 12, 15],
    )
}

fn growth_and_underinvestment() -> ArchetypeDefinition {
    archetype(
        "Growth and Underinvestment",
        "Demand grows but capacity investment lags, service quality falls, and the falling quality is used to justify not investing.",
        "Investment waits for proof that only the investment could provide.",
        &["underinvestment", "understaffed", "backlog", "delayed investment", "overloaded"],
        &[8, 2, 11],
    )
}

fn accidental_adversaries() -> ArchetypeDefinition {
    archetype(
        "Accidental Adversaries",
        "Partners who benefit from cooperating each take local actions that unintentionally undermine the other, eroding the partnership.",
        "Well-meant local moves keep hurting a partner.",
        &["misunderstanding", "undermine", "friction", "conflicting priorities", "silo"],
        &[14, 7, 3],
    )
}

fn quick_win(
    archetype: &str,
    title: &str,
    description: &str,
    impact_level: ImpactLevel,
) -> QuickWinTemplate {
    QuickWinTemplate {
        archetype_name: archetype.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        impact_level,
    }
}

pub fn builtin_quick_wins() -> Vec<QuickWinTemplate> {
    vec![
        quick_win(
            "Shifting the Burden",
            "Run a root cause session on the top recurring issue",
            "Pick the workaround used most often last quarter and spend one hour with the people involved tracing it back to its cause.",
            ImpactLevel::High,
        ),
        quick_win(
            "Shifting the Burden",
            "Pair an expert with an internal owner",
            "For the next external engagement, name an internal owner who shadows the work and documents it so the capability stays in house.",
            ImpactLevel::Medium,
        ),
        quick_win(
            "Fixes that Fail",
            "Add a side-effect check to change reviews",
            "Before approving a fix, ask what it could make worse in three months and note who will check.",
            ImpactLevel::Medium,
        ),
        quick_win(
            "Fixes that Fail",
            "Track recurrence of fixed problems",
            "Tag resolved incidents and review monthly which ones came back.",
            ImpactLevel::High,
        ),
        quick_win(
            "Limits to Growth",
            "Name the current constraint",
            "Identify the single step or resource that most limits throughput today and make it visible on the team board.",
            ImpactLevel::High,
        ),
        quick_win(
            "Limits to Growth",
            "Pause one growth push",
            "Redirect the effort from one growth initiative to relieving the named constraint for two weeks.",
            ImpactLevel::Medium,
        ),
        quick_win(
            "Escalation",
            "Hold a joint goal-setting meeting",
            "Bring the competing groups together to agree one shared metric for the next quarter.",
            ImpactLevel::High,
        ),
        quick_win(
            "Escalation",
            "Agree a de-escalation rule",
            "Agree that disputes between the groups go to a shared lead within a day instead of being answered in kind.",
            ImpactLevel::Low,
        ),
        quick_win(
            "Success to the Successful",
            "Review resource allocation criteria",
            "Write down how budget and people are assigned and check it against potential, not past wins.",
            ImpactLevel::Medium,
        ),
        quick_win(
            "Success to the Successful",
            "Ring-fence a budget for neglected work",
            "Reserve a fixed share of next quarter's capacity for projects that have been starved of resources.",
            ImpactLevel::High,
        ),
        quick_win(
            "Tragedy of the Commons",
            "Give each shared resource an owner",
            "List the shared resources and assign a named owner responsible for their upkeep.",
            ImpactLevel::High,
        ),
        quick_win(
            "Tragedy of the Commons",
            "Publish usage of shared resources",
            "Show each team how much of the shared resource it consumes so the cost becomes visible.",
            ImpactLevel::Low,
        ),
        quick_win(
            "Eroding Goals",
            "Freeze targets for one quarter",
            "Commit that targets will not be lowered this quarter and review the gaps openly instead.",
            ImpactLevel::Medium,
        ),
        quick_win(
            "Eroding Goals",
            "Benchmark against an external standard",
            "Compare your key quality measure to an outside reference rather than last year's result.",
            ImpactLevel::Medium,
        ),
        quick_win(
            "Growth and Underinvestment",
            "Forecast capacity against demand",
            "Chart demand growth against current capacity for the next two quarters and share it with decision makers.",
            ImpactLevel::High,
        ),
        quick_win(
            "Growth and Underinvestment",
            "Fund one small capacity investment now",
            "Approve the cheapest investment that relieves the growing backlog without waiting for more evidence.",
            ImpactLevel::Medium,
        ),
        quick_win(
            "Accidental Adversaries",
            "Map how each side's actions affect the other",
            "Sit down with the partner team and draw how each group's routine decisions land on the other.",
            ImpactLevel::Medium,
        ),
        quick_win(
            "Accidental Adversaries",
            "Set up a regular partner check-in",
            "Schedule a short fortnightly check-in to surface friction before it turns into conflict.",
            ImpactLevel::Low,
        ),
    ]
}
