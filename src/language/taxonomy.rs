//! Grammatical role taxonomy.
//!
//! Roles form a closed set shared by every language; each language's
//! taxonomy lists the subset it uses, with a colour, a description and the
//! complexity tier at which the role is introduced. Tiers are cumulative.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Learner level a card is generated for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Beginner => "beginner",
            Complexity::Intermediate => "intermediate",
            Complexity::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Complexity::Beginner),
            "intermediate" => Ok(Complexity::Intermediate),
            "advanced" => Ok(Complexity::Advanced),
            other => Err(format!(
                "unknown complexity '{}' (expected beginner, intermediate or advanced)",
                other
            )),
        }
    }
}

/// Part-of-speech-like category used to colour and explain a word.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GrammaticalRole {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Preposition,
    Postposition,
    Conjunction,
    Interjection,
    Article,
    Determiner,
    Particle,
    AspectParticle,
    Classifier,
    AuxiliaryVerb,
    Numeral,
    ProperNoun,
    Other,
}

impl GrammaticalRole {
    pub const ALL: [GrammaticalRole; 18] = [
        GrammaticalRole::Noun,
        GrammaticalRole::Verb,
        GrammaticalRole::Adjective,
        GrammaticalRole::Adverb,
        GrammaticalRole::Pronoun,
        GrammaticalRole::Preposition,
        GrammaticalRole::Postposition,
        GrammaticalRole::Conjunction,
        GrammaticalRole::Interjection,
        GrammaticalRole::Article,
        GrammaticalRole::Determiner,
        GrammaticalRole::Particle,
        GrammaticalRole::AspectParticle,
        GrammaticalRole::Classifier,
        GrammaticalRole::AuxiliaryVerb,
        GrammaticalRole::Numeral,
        GrammaticalRole::ProperNoun,
        GrammaticalRole::Other,
    ];

    /// Identifier used in prompts, YAML keys and CSS classes.
    pub fn as_str(&self) -> &'static str {
        match self {
            GrammaticalRole::Noun => "noun",
            GrammaticalRole::Verb => "verb",
            GrammaticalRole::Adjective => "adjective",
            GrammaticalRole::Adverb => "adverb",
            GrammaticalRole::Pronoun => "pronoun",
            GrammaticalRole::Preposition => "preposition",
            GrammaticalRole::Postposition => "postposition",
            GrammaticalRole::Conjunction => "conjunction",
            GrammaticalRole::Interjection => "interjection",
            GrammaticalRole::Article => "article",
            GrammaticalRole::Determiner => "determiner",
            GrammaticalRole::Particle => "particle",
            GrammaticalRole::AspectParticle => "aspect_particle",
            GrammaticalRole::Classifier => "classifier",
            GrammaticalRole::AuxiliaryVerb => "auxiliary_verb",
            GrammaticalRole::Numeral => "numeral",
            GrammaticalRole::ProperNoun => "proper_noun",
            GrammaticalRole::Other => "other",
        }
    }

    /// Parse an exact identifier (as produced by `as_str`).
    pub fn from_id(id: &str) -> Option<GrammaticalRole> {
        GrammaticalRole::ALL
            .into_iter()
            .find(|role| role.as_str() == id)
    }

    /// Roles that carry lexical content; at least one is expected per sentence.
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            GrammaticalRole::Noun
                | GrammaticalRole::Verb
                | GrammaticalRole::ProperNoun
                | GrammaticalRole::AuxiliaryVerb
        )
    }
}

impl fmt::Display for GrammaticalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour used for words whose role cannot be resolved.
pub const OTHER_COLOR: &str = "#808080";

/// One taxonomy entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub tier: Complexity,
    /// Role to fall back to when this one is unavailable at a tier.
    #[serde(default)]
    pub parent: Option<GrammaticalRole>,
}

fn default_color() -> String {
    OTHER_COLOR.to_string()
}

/// Per-language, read-only mapping from role to its entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxonomy {
    roles: BTreeMap<GrammaticalRole, RoleInfo>,
}

impl Taxonomy {
    /// Build a taxonomy, making sure `other` is always present at the lowest tier.
    pub fn new(mut roles: BTreeMap<GrammaticalRole, RoleInfo>) -> Self {
        roles
            .entry(GrammaticalRole::Other)
            .or_insert_with(|| RoleInfo {
                description: "Word whose role could not be determined".to_string(),
                color: OTHER_COLOR.to_string(),
                tier: Complexity::Beginner,
                parent: None,
            });
        Self { roles }
    }

    pub fn get(&self, role: GrammaticalRole) -> Option<&RoleInfo> {
        self.roles.get(&role)
    }

    pub fn contains(&self, role: GrammaticalRole) -> bool {
        self.roles.contains_key(&role)
    }

    /// Replace or add a single entry.
    pub fn insert(&mut self, role: GrammaticalRole, info: RoleInfo) {
        self.roles.insert(role, info);
    }

    /// Roles usable at `complexity`, including every lower tier.
    pub fn allowed_roles(&self, complexity: Complexity) -> Vec<GrammaticalRole> {
        self.roles
            .iter()
            .filter(|(_, info)| info.tier <= complexity)
            .map(|(role, _)| *role)
            .collect()
    }

    /// Map a role onto the closest one available at `complexity`.
    ///
    /// Follows the parent chain and ends at `other`. Roles the taxonomy does
    /// not list at all use a built-in parent.
    pub fn resolve(&self, role: GrammaticalRole, complexity: Complexity) -> GrammaticalRole {
        let mut current = role;
        // Parent chains are short; the bound guards against cycles in user YAML.
        for _ in 0..GrammaticalRole::ALL.len() {
            match self.roles.get(&current) {
                Some(info) if info.tier <= complexity => return current,
                Some(info) => match info.parent {
                    Some(parent) => current = parent,
                    None => return GrammaticalRole::Other,
                },
                None => match builtin_parent(current) {
                    Some(parent) => current = parent,
                    None => return GrammaticalRole::Other,
                },
            }
        }
        GrammaticalRole::Other
    }

    /// Colour of `role` once resolved at `complexity`.
    pub fn color(&self, role: GrammaticalRole, complexity: Complexity) -> &str {
        let resolved = self.resolve(role, complexity);
        self.roles
            .get(&resolved)
            .map(|info| info.color.as_str())
            .unwrap_or(OTHER_COLOR)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GrammaticalRole, &RoleInfo)> {
        self.roles.iter()
    }
}

fn builtin_parent(role: GrammaticalRole) -> Option<GrammaticalRole> {
    match role {
        GrammaticalRole::AspectParticle => Some(GrammaticalRole::Particle),
        GrammaticalRole::AuxiliaryVerb => Some(GrammaticalRole::Verb),
        GrammaticalRole::ProperNoun => Some(GrammaticalRole::Noun),
        GrammaticalRole::Article => Some(GrammaticalRole::Determiner),
        GrammaticalRole::Determiner => Some(GrammaticalRole::Adjective),
        GrammaticalRole::Classifier => Some(GrammaticalRole::Particle),
        GrammaticalRole::Postposition => Some(GrammaticalRole::Preposition),
        GrammaticalRole::Preposition => Some(GrammaticalRole::Particle),
        GrammaticalRole::Particle => Some(GrammaticalRole::Adverb),
        _ => None,
    }
}
