//! Confidence scoring for parsed analyses.
//!
//! Scoring starts at 1.0 and applies penalties in a fixed order. A sentence
//! mostly written outside the language's script is a hard failure. A low
//! score is an ordinary outcome, never an error.

use crate::analysis::SentenceAnalysis;
use crate::language::tokenize::{letters, unit_count};
use crate::language::{GrammaticalRole, LanguageProfile, Script};

const MAX_WORD_COUNT_PENALTY: f32 = 0.5;
const NO_CONTENT_WORD_PENALTY: f32 = 0.25;
const MOSTLY_OTHER_PENALTY: f32 = 0.1;

/// Confidence and the issues that lowered it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub confidence: f32,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn passes(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

/// Validator for grammar analyses.
pub struct AnalysisValidator;

impl AnalysisValidator {
    /// Score `analysis` against the sentence it claims to describe.
    ///
    /// Pure: only the analysis' words and complexity are read, so scoring an
    /// already scored analysis gives the same report.
    pub fn validate(
        analysis: &SentenceAnalysis,
        original_sentence: &str,
        profile: &LanguageProfile,
    ) -> ValidationReport {
        let mut issues = Vec::new();
        let language = profile.language;

        // Script conformance
        let share = script_share(original_sentence, profile.script());
        if share < profile.script_floor {
            issues.push(format!(
                "only {:.0}% of letters are in {} script (minimum {:.0}%)",
                share * 100.0,
                profile.script().name(),
                profile.script_floor * 100.0
            ));
            return ValidationReport {
                confidence: 0.0,
                issues,
            };
        }

        let mut confidence = 1.0_f32;

        // Word count. Uncovered units count even when extra words hide the gap.
        let expected = unit_count(original_sentence, language);
        let analysed: usize = analysis
            .analysed_words()
            .map(|w| unit_count(&w.word, language))
            .sum();
        let uncovered: usize = analysis
            .words
            .iter()
            .filter(|w| w.placeholder)
            .map(|w| unit_count(&w.word, language))
            .sum();
        let delta = analysed.abs_diff(expected).max(uncovered);
        if delta > 0 {
            let penalty = (MAX_WORD_COUNT_PENALTY * delta as f32 / expected.max(1) as f32)
                .min(MAX_WORD_COUNT_PENALTY);
            confidence -= penalty;
        }
        if analysed != expected {
            issues.push(format!(
                "analysis covers {} units but the sentence has {}",
                analysed, expected
            ));
        }
        let placeholders = analysis.placeholder_count();
        if placeholders > 0 {
            issues.push(format!("{} word(s) left unanalysed", placeholders));
        }

        // Role plausibility
        let words: Vec<_> = analysis.analysed_words().collect();
        if !words.iter().any(|w| w.role.is_content()) {
            confidence -= NO_CONTENT_WORD_PENALTY;
            issues.push("no noun or verb in the analysis".to_string());
        }
        let other = words
            .iter()
            .filter(|w| w.role == GrammaticalRole::Other)
            .count();
        if !words.is_empty() && other * 2 > words.len() {
            confidence -= MOSTLY_OTHER_PENALTY;
            issues.push(format!(
                "{} of {} words have no recognised role",
                other,
                words.len()
            ));
        }

        // Language-specific structure
        for check in &profile.checks {
            if let Some(issue) = check.run(analysis, &profile.taxonomy) {
                confidence -= check.penalty();
                issues.push(issue);
            }
        }

        ValidationReport {
            confidence: confidence.clamp(0.0, 1.0),
            issues,
        }
    }

    /// Validate `analysis` against its own sentence and store the result on it.
    pub fn apply(analysis: &mut SentenceAnalysis, profile: &LanguageProfile) -> ValidationReport {
        let report = Self::validate(analysis, &analysis.sentence, profile);
        analysis.confidence = report.confidence;
        analysis.issues = report.issues.clone();
        report
    }
}

/// Share of the letters in `text` that belong to `script`; 0 without letters.
pub fn script_share(text: &str, script: Script) -> f32 {
    let (inside, total) = letters(text).fold((0usize, 0usize), |(inside, total), c| {
        (inside + usize::from(script.contains(c)), total + 1)
    });
    if total == 0 {
        0.0
    } else {
        inside as f32 / total as f32
    }
}
