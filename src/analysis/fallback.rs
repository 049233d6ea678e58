//! Rule-based recovery for sentences the model could not analyse.
//!
//! `recover` never fails: every token ends up with some role, in the worst
//! case `other` with the word itself as its meaning.

use crate::analysis::validator::AnalysisValidator;
use crate::analysis::{AnalysisSource, SentenceAnalysis, WordExplanation};
use crate::language::tokenize::{normalize_word, tokenize, Token};
use crate::language::{Complexity, Dictionary, GrammaticalRole, Language, LanguageProfile};
use tracing::debug;

/// Longest dictionary word tried for Chinese, in characters.
const MAX_HAN_WORD: usize = 4;

pub struct FallbackEngine<'a> {
    profile: &'a LanguageProfile,
    learned: Option<&'a Dictionary>,
}

impl<'a> FallbackEngine<'a> {
    pub fn new(profile: &'a LanguageProfile) -> Self {
        Self {
            profile,
            learned: None,
        }
    }

    /// Also consult words learned from accepted analyses.
    pub fn with_learned(mut self, learned: &'a Dictionary) -> Self {
        self.learned = Some(learned);
        self
    }

    /// Rebuild an analysis for `sentence`, reusing what `partial` got right.
    pub fn recover(
        &self,
        sentence: &str,
        complexity: Complexity,
        partial: Option<&SentenceAnalysis>,
    ) -> SentenceAnalysis {
        let tokens = tokenize(sentence, self.profile.language);
        let mut salvage: Vec<Option<&WordExplanation>> = partial
            .map(|p| {
                p.analysed_words()
                    .filter(|w| w.role != GrammaticalRole::Other)
                    .map(Some)
                    .collect()
            })
            .unwrap_or_default();

        let max_span = match self.profile.language {
            Language::Chinese => MAX_HAN_WORD,
            _ => 1,
        };

        let mut words = Vec::with_capacity(tokens.len());
        let (mut salvaged, mut looked_up, mut matched) = (0usize, 0usize, 0usize);
        let mut i = 0;
        while i < tokens.len() {
            if let Some((span, word)) = self.take_salvage(sentence, &tokens, i, max_span, &mut salvage) {
                words.push(WordExplanation::resolved(
                    word.word.clone(),
                    word.meaning.clone(),
                    word.role,
                    &self.profile.taxonomy,
                    complexity,
                ));
                salvaged += 1;
                i += span;
                continue;
            }

            if let Some((span, text, meaning, role)) = self.lookup(sentence, &tokens, i, max_span) {
                words.push(WordExplanation::resolved(
                    text,
                    meaning,
                    role,
                    &self.profile.taxonomy,
                    complexity,
                ));
                looked_up += 1;
                i += span;
                continue;
            }

            let token = &tokens[i];
            let (meaning, role) = match self.profile.match_pattern(&token.text) {
                Some(pattern) => {
                    matched += 1;
                    (
                        pattern.meaning.clone().unwrap_or_else(|| token.text.clone()),
                        pattern.role,
                    )
                }
                None => (token.text.clone(), GrammaticalRole::Other),
            };
            words.push(WordExplanation::resolved(
                token.text.clone(),
                meaning,
                role,
                &self.profile.taxonomy,
                complexity,
            ));
            i += 1;
        }

        debug!(
            "Recovered '{}': {} salvaged, {} from dictionary, {} from patterns, {} unknown",
            sentence,
            salvaged,
            looked_up,
            matched,
            words.len() - salvaged - looked_up - matched
        );

        let mut analysis =
            SentenceAnalysis::new(sentence, words, AnalysisSource::Fallback, complexity);
        AnalysisValidator::apply(&mut analysis, self.profile);
        analysis
    }

    /// Longest unused partial word matching the tokens starting at `i`.
    fn take_salvage<'p>(
        &self,
        sentence: &str,
        tokens: &[Token],
        i: usize,
        max_span: usize,
        salvage: &mut [Option<&'p WordExplanation>],
    ) -> Option<(usize, &'p WordExplanation)> {
        for span in (1..=max_span).rev() {
            let Some(text) = span_text(sentence, tokens, i, span) else {
                continue;
            };
            let key = normalize_word(text);
            let found = salvage
                .iter()
                .position(|w| w.is_some_and(|w| normalize_word(&w.word) == key));
            if let Some(pos) = found {
                return salvage[pos].take().map(|w| (span, w));
            }
        }
        None
    }

    /// Dictionary entry for the longest span starting at `i`.
    fn lookup(
        &self,
        sentence: &str,
        tokens: &[Token],
        i: usize,
        max_span: usize,
    ) -> Option<(usize, String, String, GrammaticalRole)> {
        for span in (1..=max_span).rev() {
            let Some(text) = span_text(sentence, tokens, i, span) else {
                continue;
            };
            let entry = self
                .profile
                .dictionary
                .lookup(text)
                .or_else(|| self.learned.and_then(|learned| learned.lookup(text)));
            if let Some(entry) = entry {
                return Some((span, text.to_string(), entry.meaning.clone(), entry.role));
            }
        }
        None
    }
}

/// Sentence text covered by `span` adjacent tokens starting at `i`.
fn span_text<'s>(sentence: &'s str, tokens: &[Token], i: usize, span: usize) -> Option<&'s str> {
    let window = tokens.get(i..i + span)?;
    if window.windows(2).any(|pair| pair[0].end() != pair[1].start) {
        return None;
    }
    let first = window.first()?;
    let last = window.last()?;
    sentence.get(first.start..last.end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser;
    use crate::language::DictionaryEntry;

    fn profile(language: Language) -> LanguageProfile {
        LanguageProfile::builtin(language).unwrap()
    }

    fn words(analysis: &SentenceAnalysis) -> Vec<&str> {
        analysis.words.iter().map(|w| w.word.as_str()).collect()
    }

    // ==================== Totality Tests ====================

    #[test]
    fn test_recover_covers_every_token() {
        for language in Language::ALL {
            let profile = profile(language);
            let sentence = match language {
                Language::Arabic => "الطالب يقرأ الكتاب في البيت",
                Language::Hindi => "मैं घर जाता हूँ",
                Language::Chinese => "我吃了三个苹果。",
                Language::Spanish => "El gato come pescado.",
                Language::French => "Je ne sais pas.",
                Language::German => "Der Hund schläft.",
            };
            let analysis = FallbackEngine::new(&profile).recover(sentence, Complexity::Beginner, None);
            assert_eq!(analysis.source, AnalysisSource::Fallback);
            assert_eq!(analysis.words.len(), tokenize(sentence, language).len(), "{}", language);
            assert!(analysis.words.iter().all(|w| !w.placeholder));
            assert!((0.0..=1.0).contains(&analysis.confidence));
        }
    }

    #[test]
    fn test_recover_empty_sentence() {
        let profile = profile(Language::German);
        let analysis = FallbackEngine::new(&profile).recover("", Complexity::Beginner, None);
        assert!(analysis.words.is_empty());
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.is_deliverable(0.85));
    }

    #[test]
    fn test_unknown_word_echoes_literal() {
        let profile = profile(Language::German);
        let analysis = FallbackEngine::new(&profile).recover("Quxfoo", Complexity::Beginner, None);
        assert_eq!(analysis.words[0].role, GrammaticalRole::Other);
        assert_eq!(analysis.words[0].meaning, "Quxfoo");
    }

    // ==================== Source Priority Tests ====================

    #[test]
    fn test_patterns_tag_function_words() {
        let profile = profile(Language::Chinese);
        let analysis = FallbackEngine::new(&profile).recover("我吃了", Complexity::Intermediate, None);
        let roles: Vec<GrammaticalRole> = analysis.words.iter().map(|w| w.role).collect();
        assert_eq!(
            roles,
            vec![GrammaticalRole::Pronoun, GrammaticalRole::Verb, GrammaticalRole::AspectParticle]
        );
    }

    #[test]
    fn test_dictionary_beats_pattern() {
        let mut profile = profile(Language::Spanish);
        profile.dictionary.insert(
            "come",
            DictionaryEntry {
                meaning: "eats".to_string(),
                role: GrammaticalRole::Verb,
            },
        );
        let analysis = FallbackEngine::new(&profile).recover("El gato come", Complexity::Beginner, None);
        assert_eq!(analysis.words[2].meaning, "eats");
    }

    #[test]
    fn test_learned_words_are_used() {
        let profile = profile(Language::German);
        let mut learned = Dictionary::new();
        learned.insert(
            "Hund",
            DictionaryEntry {
                meaning: "dog".to_string(),
                role: GrammaticalRole::Noun,
            },
        );
        let analysis = FallbackEngine::new(&profile)
            .with_learned(&learned)
            .recover("Der Hund", Complexity::Beginner, None);
        assert_eq!(analysis.words[1].meaning, "dog");
        assert_eq!(analysis.words[1].role, GrammaticalRole::Noun);
    }

    #[test]
    fn test_chinese_greedy_longest_match() {
        let mut profile = profile(Language::Chinese);
        profile.dictionary.insert(
            "苹果",
            DictionaryEntry {
                meaning: "apple".to_string(),
                role: GrammaticalRole::Noun,
            },
        );
        let analysis = FallbackEngine::new(&profile).recover("我吃苹果", Complexity::Beginner, None);
        assert_eq!(words(&analysis), vec!["我", "吃", "苹果"]);
        assert_eq!(analysis.words[2].meaning, "apple");
    }

    #[test]
    fn test_salvages_partial_analysis() {
        let profile = profile(Language::Chinese);
        let raw = r#"{"words":[{"word":"我们","individual_meaning":"we","grammatical_role":"pronoun"}]}"#;
        let sentences = vec!["我们吃了".to_string()];
        let partial = parser::parse(raw, &sentences, &profile, Complexity::Beginner).unwrap();

        let analysis = FallbackEngine::new(&profile).recover("我们吃了", Complexity::Beginner, Some(&partial[0]));
        assert_eq!(words(&analysis), vec!["我们", "吃", "了"]);
        assert_eq!(analysis.words[0].meaning, "we");
        assert!(analysis.words.iter().all(|w| !w.placeholder));
    }

    #[test]
    fn test_partial_other_words_are_not_salvaged() {
        let profile = profile(Language::French);
        let raw = r#"{"words":[{"word":"Je","individual_meaning":"I","grammatical_role":"???"}]}"#;
        let sentences = vec!["Je".to_string()];
        let partial = parser::parse(raw, &sentences, &profile, Complexity::Beginner).unwrap();

        let analysis = FallbackEngine::new(&profile).recover("Je", Complexity::Beginner, Some(&partial[0]));
        assert_eq!(analysis.words[0].role, GrammaticalRole::Pronoun);
    }
}
