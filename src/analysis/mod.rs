//! Grammar analysis pipeline stages.
//!
//! - `prompt`: renders the instruction sent to the LLM
//! - `parser`: turns raw LLM text into one `SentenceAnalysis` per sentence
//! - `validator`: confidence scoring with per-language plausibility checks
//! - `checks`: the language-specific structural checks
//! - `fallback`: rule-based recovery when the model keeps failing
//! - `roles`: normalisation of free-form role labels

pub mod checks;
pub mod fallback;
pub mod parser;
pub mod prompt;
pub mod roles;
pub mod validator;

use crate::language::{Complexity, GrammaticalRole, Taxonomy};
use serde::{Deserialize, Serialize};

/// Input to one card-generation step.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub sentences: Vec<String>,
    pub target_word: String,
    pub complexity: Complexity,
    pub native_language: String,
}

impl AnalysisRequest {
    pub fn new(
        sentences: Vec<String>,
        target_word: impl Into<String>,
        complexity: Complexity,
        native_language: impl Into<String>,
    ) -> Self {
        Self {
            sentences,
            target_word: target_word.into(),
            complexity,
            native_language: native_language.into(),
        }
    }
}

/// One word of a sentence with its gloss and role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordExplanation {
    pub word: String,
    pub meaning: String,
    pub role: GrammaticalRole,
    pub color: String,
    /// Stand-in for a token the model left out.
    #[serde(default)]
    pub placeholder: bool,
}

impl WordExplanation {
    /// Explanation whose role is resolved against the taxonomy at `complexity`.
    pub fn resolved(
        word: impl Into<String>,
        meaning: impl Into<String>,
        role: GrammaticalRole,
        taxonomy: &Taxonomy,
        complexity: Complexity,
    ) -> Self {
        let role = taxonomy.resolve(role, complexity);
        Self {
            word: word.into(),
            meaning: meaning.into(),
            role,
            color: taxonomy.color(role, complexity).to_string(),
            placeholder: false,
        }
    }

    pub fn placeholder(word: impl Into<String>, taxonomy: &Taxonomy, complexity: Complexity) -> Self {
        Self {
            placeholder: true,
            ..Self::resolved(word, "", GrammaticalRole::Other, taxonomy, complexity)
        }
    }
}

/// Where an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Parsed from an LLM response.
    Model,
    /// The response had no entry for this sentence.
    Placeholder,
    /// Rebuilt by the rule-based fallback engine.
    Fallback,
}

/// Analysis of one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceAnalysis {
    pub sentence: String,
    pub words: Vec<WordExplanation>,
    pub confidence: f32,
    pub issues: Vec<String>,
    pub source: AnalysisSource,
    pub complexity: Complexity,
}

impl SentenceAnalysis {
    pub fn new(
        sentence: impl Into<String>,
        words: Vec<WordExplanation>,
        source: AnalysisSource,
        complexity: Complexity,
    ) -> Self {
        Self {
            sentence: sentence.into(),
            words,
            confidence: 0.0,
            issues: Vec::new(),
            source,
            complexity,
        }
    }

    /// Words the model or fallback actually explained.
    pub fn analysed_words(&self) -> impl Iterator<Item = &WordExplanation> {
        self.words.iter().filter(|w| !w.placeholder)
    }

    pub fn placeholder_count(&self) -> usize {
        self.words.iter().filter(|w| w.placeholder).count()
    }

    pub fn is_fallback(&self) -> bool {
        self.source == AnalysisSource::Fallback
    }

    /// Whether this analysis may go into a deck.
    pub fn is_deliverable(&self, threshold: f32) -> bool {
        self.confidence >= threshold || self.is_fallback()
    }
}

/// Analyses for a request, in the order the sentences were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    analyses: Vec<SentenceAnalysis>,
}

impl BatchResult {
    pub fn new(analyses: Vec<SentenceAnalysis>) -> Self {
        Self { analyses }
    }

    /// Analysis for the first occurrence of `sentence`.
    pub fn get(&self, sentence: &str) -> Option<&SentenceAnalysis> {
        self.analyses.iter().find(|a| a.sentence == sentence)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SentenceAnalysis> {
        self.analyses.iter()
    }

    pub fn len(&self) -> usize {
        self.analyses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyses.is_empty()
    }

    pub fn extend(&mut self, analyses: impl IntoIterator<Item = SentenceAnalysis>) {
        self.analyses.extend(analyses);
    }

    pub fn into_vec(self) -> Vec<SentenceAnalysis> {
        self.analyses
    }

    /// Lowest confidence in the result, or 0 when empty.
    pub fn min_confidence(&self) -> f32 {
        self.analyses
            .iter()
            .map(|a| a.confidence)
            .reduce(f32::min)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{Language, LanguageProfile};

    fn analysis(confidence: f32, source: AnalysisSource) -> SentenceAnalysis {
        let mut analysis = SentenceAnalysis::new("x", vec![], source, Complexity::Beginner);
        analysis.confidence = confidence;
        analysis
    }

    #[test]
    fn test_placeholder_word_is_other_and_flagged() {
        let profile = LanguageProfile::builtin(Language::Chinese).unwrap();
        let word = WordExplanation::placeholder("吃", &profile.taxonomy, Complexity::Beginner);
        assert!(word.placeholder);
        assert_eq!(word.role, GrammaticalRole::Other);
        assert!(word.meaning.is_empty());
        assert_eq!(word.color, "#808080");
    }

    #[test]
    fn test_resolved_word_takes_role_color() {
        let profile = LanguageProfile::builtin(Language::Chinese).unwrap();
        let word = WordExplanation::resolved(
            "了",
            "completed action",
            GrammaticalRole::AspectParticle,
            &profile.taxonomy,
            Complexity::Beginner,
        );
        assert_eq!(word.role, GrammaticalRole::Particle);
        assert_eq!(word.color, "#9B59B6");
    }

    #[test]
    fn test_deliverable_requires_threshold_or_fallback() {
        assert!(analysis(0.9, AnalysisSource::Model).is_deliverable(0.85));
        assert!(!analysis(0.6, AnalysisSource::Model).is_deliverable(0.85));
        assert!(analysis(0.2, AnalysisSource::Fallback).is_deliverable(0.85));
        assert!(!analysis(0.0, AnalysisSource::Placeholder).is_deliverable(0.85));
    }

    #[test]
    fn test_batch_result_min_confidence() {
        let result = BatchResult::new(vec![
            analysis(0.9, AnalysisSource::Model),
            analysis(0.4, AnalysisSource::Fallback),
        ]);
        assert_eq!(result.min_confidence(), 0.4);
        assert_eq!(BatchResult::default().min_confidence(), 0.0);
    }
}
