//! Language-specific structural plausibility checks.
//!
//! Each check is a small heuristic that looks for a well-known pattern of the
//! language and flags an analysis that tags it implausibly. A failing check
//! costs a small, fixed amount of confidence. Checks can be disabled per
//! language through the profile's `disabled_checks` key.

use crate::analysis::{SentenceAnalysis, WordExplanation};
use crate::language::tokenize::normalize_word;
use crate::language::{Complexity, GrammaticalRole, Language, Taxonomy};
use regex::Regex;
use std::sync::OnceLock;

use GrammaticalRole::*;

const STRUCTURAL_PENALTY: f32 = 0.05;

const ARABIC_PREPOSITIONS: &[&str] = &["في", "من", "إلى", "على", "عن", "مع"];
const HINDI_POSTPOSITIONS: &[&str] = &["ने", "को", "से", "में", "पर", "का", "की", "के", "तक"];
const HINDI_COPULAS: &[&str] = &["है", "हैं", "था", "थी", "थे", "हूँ", "हूं", "हो"];
const CHINESE_ASPECT_PARTICLES: &[&str] = &["了", "着", "过"];
const CHINESE_STRUCTURAL_PARTICLES: &[&str] = &["的", "地", "得"];
const SPANISH_ARTICLES: &[&str] = &["el", "la", "los", "las", "un", "una", "unos", "unas"];
const FRENCH_ARTICLES: &[&str] = &["le", "la", "les", "un", "une", "des", "du"];
const GERMAN_ARTICLES: &[&str] = &[
    "der", "die", "das", "den", "dem", "des", "ein", "eine", "einen", "einem", "einer", "eines",
];

// Nouns whose ending does not match their article's gender.
const SPANISH_GENDER_EXCEPTIONS: &[&str] = &[
    "mano", "foto", "moto", "radio", "día", "dia", "mapa", "problema", "programa", "sistema",
    "tema", "idioma", "clima", "planeta", "poema", "drama", "agua", "alma", "arma", "águila",
    "hacha", "área", "aula", "hambre",
];

static MEASURE_WORD_REGEX: OnceLock<Regex> = OnceLock::new();

fn measure_word_regex() -> &'static Regex {
    MEASURE_WORD_REGEX.get_or_init(|| {
        Regex::new(r"(?:[一二三四五六七八九十两几这那每]|\d+)(个|本|只|张|条|件|位|杯|辆|双|把|块|次)")
            .unwrap()
    })
}

/// A single named structural check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralCheck {
    ArabicDefiniteArticle,
    ArabicPrepositions,
    HindiPostpositions,
    HindiCopula,
    ChineseAspectParticle,
    ChineseStructuralParticle,
    ChineseMeasureWord,
    SpanishArticles,
    SpanishGenderAgreement,
    FrenchArticles,
    FrenchNegation,
    GermanArticles,
    GermanNounCapitalization,
}

impl StructuralCheck {
    /// All checks of a language, in the order they run.
    pub fn for_language(language: Language) -> Vec<StructuralCheck> {
        use StructuralCheck::*;
        match language {
            Language::Arabic => vec![ArabicDefiniteArticle, ArabicPrepositions],
            Language::Hindi => vec![HindiPostpositions, HindiCopula],
            Language::Chinese => vec![
                ChineseAspectParticle,
                ChineseStructuralParticle,
                ChineseMeasureWord,
            ],
            Language::Spanish => vec![SpanishArticles, SpanishGenderAgreement],
            Language::French => vec![FrenchArticles, FrenchNegation],
            Language::German => vec![GermanArticles, GermanNounCapitalization],
        }
    }

    /// Identifier used in `disabled_checks`.
    pub fn id(&self) -> &'static str {
        use StructuralCheck::*;
        match self {
            ArabicDefiniteArticle => "definite_article",
            ArabicPrepositions => "prepositions",
            HindiPostpositions => "postpositions",
            HindiCopula => "copula",
            ChineseAspectParticle => "aspect_particle",
            ChineseStructuralParticle => "structural_particle",
            ChineseMeasureWord => "measure_word",
            SpanishArticles | FrenchArticles | GermanArticles => "articles",
            SpanishGenderAgreement => "gender_agreement",
            FrenchNegation => "negation",
            GermanNounCapitalization => "noun_capitalization",
        }
    }

    pub fn penalty(&self) -> f32 {
        STRUCTURAL_PENALTY
    }

    /// Run the check. Returns an issue when the analysis fails it.
    pub fn run(&self, analysis: &SentenceAnalysis, taxonomy: &Taxonomy) -> Option<String> {
        let words: Vec<&WordExplanation> = analysis.analysed_words().collect();
        let tagging = Tagging {
            taxonomy,
            complexity: analysis.complexity,
        };

        use StructuralCheck::*;
        let offenders: Vec<String> = match self {
            ArabicDefiniteArticle => words
                .iter()
                .filter(|w| {
                    let form = normalize_word(&w.word);
                    form.starts_with("ال")
                        && form.chars().count() > 3
                        && matches!(w.role, Verb | AuxiliaryVerb)
                })
                .map(|w| w.word.clone())
                .collect(),
            ArabicPrepositions => tagging.mistagged(&words, ARABIC_PREPOSITIONS, &[Preposition, Particle]),
            HindiPostpositions => {
                tagging.mistagged(&words, HINDI_POSTPOSITIONS, &[Postposition, Particle])
            }
            HindiCopula => match words.last() {
                Some(last)
                    if HINDI_COPULAS.contains(&normalize_word(&last.word).as_str())
                        && !tagging.accepts(last.role, &[AuxiliaryVerb, Verb]) =>
                {
                    vec![last.word.clone()]
                }
                _ => Vec::new(),
            },
            ChineseAspectParticle => words
                .windows(2)
                .filter(|pair| {
                    let (prev, word) = (pair[0], pair[1]);
                    matches!(prev.role, Verb | AuxiliaryVerb)
                        && CHINESE_ASPECT_PARTICLES.contains(&word.word.trim())
                        && !tagging.accepts(word.role, &[AspectParticle, Particle])
                })
                .map(|pair| pair[1].word.clone())
                .collect(),
            ChineseStructuralParticle => {
                tagging.mistagged(&words, CHINESE_STRUCTURAL_PARTICLES, &[Particle])
            }
            ChineseMeasureWord => measure_word_offenders(analysis, &words, &tagging),
            SpanishArticles => {
                tagging.mistagged(&words, SPANISH_ARTICLES, &[Article, Determiner, Pronoun])
            }
            SpanishGenderAgreement => gender_disagreements(&words),
            FrenchArticles => {
                tagging.mistagged(&words, FRENCH_ARTICLES, &[Article, Determiner, Pronoun])
            }
            FrenchNegation => words
                .iter()
                .filter(|w| matches!(normalize_word(&w.word).as_str(), "ne" | "n'"))
                .filter(|w| !tagging.accepts(w.role, &[Adverb, Particle]))
                .map(|w| w.word.clone())
                .collect(),
            GermanArticles => {
                tagging.mistagged(&words, GERMAN_ARTICLES, &[Article, Determiner, Pronoun])
            }
            GermanNounCapitalization => words
                .iter()
                .filter(|w| matches!(w.role, Noun | ProperNoun))
                .filter(|w| {
                    w.word
                        .trim_start_matches(crate::language::tokenize::is_punctuation)
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_lowercase())
                })
                .map(|w| w.word.clone())
                .collect(),
        };

        if offenders.is_empty() {
            None
        } else {
            Some(format!("{}: {}", self.describe(), offenders.join(", ")))
        }
    }

    fn describe(&self) -> &'static str {
        use StructuralCheck::*;
        match self {
            ArabicDefiniteArticle => "al- prefixed word tagged as a verb",
            ArabicPrepositions => "preposition not tagged as preposition or particle",
            HindiPostpositions => "postposition not tagged as postposition or particle",
            HindiCopula => "sentence-final copula not tagged as a verb",
            ChineseAspectParticle => "aspect marker after a verb not tagged as a particle",
            ChineseStructuralParticle => "structural particle not tagged as a particle",
            ChineseMeasureWord => "measure word after a number not tagged as a classifier",
            SpanishArticles | FrenchArticles | GermanArticles => {
                "article not tagged as article or determiner"
            }
            SpanishGenderAgreement => "article and noun gender look mismatched",
            FrenchNegation => "negation 'ne' not tagged as adverb or particle",
            GermanNounCapitalization => "noun not capitalised",
        }
    }
}

/// Role matching at the analysis' complexity tier.
struct Tagging<'a> {
    taxonomy: &'a Taxonomy,
    complexity: Complexity,
}

impl Tagging<'_> {
    /// Whether `role` is one of `expected` once those are resolved at this tier.
    ///
    /// Expected roles that collapse into `other` at this tier cannot be
    /// asked of the model, so a word tagged `other` then passes.
    fn accepts(&self, role: GrammaticalRole, expected: &[GrammaticalRole]) -> bool {
        let resolved: Vec<GrammaticalRole> = expected
            .iter()
            .map(|r| self.taxonomy.resolve(*r, self.complexity))
            .filter(|r| *r != Other)
            .collect();
        resolved.is_empty() || resolved.contains(&role)
    }

    fn mistagged(
        &self,
        words: &[&WordExplanation],
        forms: &[&str],
        expected: &[GrammaticalRole],
    ) -> Vec<String> {
        words
            .iter()
            .filter(|w| forms.contains(&normalize_word(&w.word).as_str()))
            .filter(|w| !self.accepts(w.role, expected))
            .map(|w| w.word.clone())
            .collect()
    }
}

fn measure_word_offenders(
    analysis: &SentenceAnalysis,
    words: &[&WordExplanation],
    tagging: &Tagging<'_>,
) -> Vec<String> {
    let mut offenders = Vec::new();
    for caps in measure_word_regex().captures_iter(&analysis.sentence) {
        let Some(classifier) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let covering: Vec<&&WordExplanation> = words
            .iter()
            .filter(|w| w.word.contains(classifier))
            .collect();
        if covering.is_empty() {
            continue;
        }
        if !covering
            .iter()
            .any(|w| tagging.accepts(w.role, &[Classifier]))
        {
            offenders.push(classifier.to_string());
        }
    }
    offenders
}

fn gender_disagreements(words: &[&WordExplanation]) -> Vec<String> {
    words
        .windows(2)
        .filter_map(|pair| {
            let article = normalize_word(&pair[0].word);
            let noun = normalize_word(&pair[1].word);
            if pair[1].role != Noun || SPANISH_GENDER_EXCEPTIONS.contains(&noun.as_str()) {
                return None;
            }
            let mismatched = match article.as_str() {
                "la" | "una" => noun.ends_with('o'),
                "el" | "un" => noun.ends_with('a'),
                _ => false,
            };
            mismatched.then(|| format!("{} {}", pair[0].word, pair[1].word))
        })
        .collect()
}
