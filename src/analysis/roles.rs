//! Normalisation of free-form grammatical role labels.
//!
//! Models rarely stick to the exact identifiers they are given. Labels such
//! as "Noun (common)", "名词", "aux." or "adjetive" are mapped onto the closed
//! role set; anything unrecognisable becomes `other`.

use crate::language::GrammaticalRole;
use std::sync::OnceLock;

use GrammaticalRole::*;

const ALIASES: &[(&str, GrammaticalRole)] = &[
    ("noun", Noun),
    ("nouns", Noun),
    ("n", Noun),
    ("nn", Noun),
    ("common noun", Noun),
    ("substantive", Noun),
    ("sustantivo", Noun),
    ("nom", Noun),
    ("nomen", Noun),
    ("substantiv", Noun),
    ("proper noun", ProperNoun),
    ("proper name", ProperNoun),
    ("propn", ProperNoun),
    ("nom propre", ProperNoun),
    ("nombre propio", ProperNoun),
    ("eigenname", ProperNoun),
    ("verb", Verb),
    ("v", Verb),
    ("vb", Verb),
    ("main verb", Verb),
    ("lexical verb", Verb),
    ("verbe", Verb),
    ("verbo", Verb),
    ("infinitive", Verb),
    ("participle", Verb),
    ("auxiliary", AuxiliaryVerb),
    ("auxiliary verb", AuxiliaryVerb),
    ("aux", AuxiliaryVerb),
    ("copula", AuxiliaryVerb),
    ("modal", AuxiliaryVerb),
    ("modal verb", AuxiliaryVerb),
    ("helping verb", AuxiliaryVerb),
    ("light verb", AuxiliaryVerb),
    ("auxiliar", AuxiliaryVerb),
    ("auxiliaire", AuxiliaryVerb),
    ("hilfsverb", AuxiliaryVerb),
    ("adjective", Adjective),
    ("adj", Adjective),
    ("adjetivo", Adjective),
    ("adjectif", Adjective),
    ("adjektiv", Adjective),
    ("adverb", Adverb),
    ("adv", Adverb),
    ("adverbio", Adverb),
    ("adverbe", Adverb),
    ("pronoun", Pronoun),
    ("pron", Pronoun),
    ("prp", Pronoun),
    ("personal pronoun", Pronoun),
    ("possessive pronoun", Pronoun),
    ("reflexive pronoun", Pronoun),
    ("relative pronoun", Pronoun),
    ("demonstrative pronoun", Pronoun),
    ("pronombre", Pronoun),
    ("pronom", Pronoun),
    ("pronomen", Pronoun),
    ("preposition", Preposition),
    ("prep", Preposition),
    ("adposition", Preposition),
    ("adp", Preposition),
    ("coverb", Preposition),
    ("preposicion", Preposition),
    ("praposition", Preposition),
    ("postposition", Postposition),
    ("postp", Postposition),
    ("case marker", Postposition),
    ("case particle", Postposition),
    ("conjunction", Conjunction),
    ("conj", Conjunction),
    ("cconj", Conjunction),
    ("sconj", Conjunction),
    ("coordinating conjunction", Conjunction),
    ("subordinating conjunction", Conjunction),
    ("conjonction", Conjunction),
    ("conjuncion", Conjunction),
    ("konjunktion", Conjunction),
    ("interjection", Interjection),
    ("intj", Interjection),
    ("interj", Interjection),
    ("exclamation", Interjection),
    ("article", Article),
    ("art", Article),
    ("definite article", Article),
    ("indefinite article", Article),
    ("articulo", Article),
    ("artikel", Article),
    ("determiner", Determiner),
    ("det", Determiner),
    ("demonstrative", Determiner),
    ("possessive", Determiner),
    ("quantifier", Determiner),
    ("determinant", Determiner),
    ("determinante", Determiner),
    ("particle", Particle),
    ("part", Particle),
    ("prt", Particle),
    ("structural particle", Particle),
    ("modal particle", Particle),
    ("grammatical particle", Particle),
    ("question particle", Particle),
    ("emphatic particle", Particle),
    ("negative particle", Particle),
    ("negation", Particle),
    ("partikel", Particle),
    ("aspect particle", AspectParticle),
    ("aspectual particle", AspectParticle),
    ("aspect marker", AspectParticle),
    ("aspect", AspectParticle),
    ("perfective particle", AspectParticle),
    ("perfective marker", AspectParticle),
    ("experiential marker", AspectParticle),
    ("durative marker", AspectParticle),
    ("classifier", Classifier),
    ("measure word", Classifier),
    ("measure", Classifier),
    ("mw", Classifier),
    ("counter", Classifier),
    ("numeral", Numeral),
    ("num", Numeral),
    ("number", Numeral),
    ("cardinal", Numeral),
    ("cardinal number", Numeral),
    ("ordinal", Numeral),
    ("other", Other),
    ("unknown", Other),
    ("x", Other),
    ("punctuation", Other),
    ("punct", Other),
    ("symbol", Other),
];

/// Labels written in the analysed language itself.
const NATIVE_LABELS: &[(&str, GrammaticalRole)] = &[
    ("专有名词", ProperNoun),
    ("动态助词", AspectParticle),
    ("名词", Noun),
    ("动词", Verb),
    ("形容词", Adjective),
    ("副词", Adverb),
    ("代词", Pronoun),
    ("量词", Classifier),
    ("助词", Particle),
    ("介词", Preposition),
    ("连词", Conjunction),
    ("数词", Numeral),
    ("叹词", Interjection),
    ("حرف جر", Preposition),
    ("حرف عطف", Conjunction),
    ("اسم إشارة", Determiner),
    ("اسم", Noun),
    ("فعل", Verb),
    ("صفة", Adjective),
    ("ضمير", Pronoun),
    ("ظرف", Adverb),
    ("حرف", Particle),
    ("सहायक क्रिया", AuxiliaryVerb),
    ("क्रियाविशेषण", Adverb),
    ("संज्ञा", Noun),
    ("क्रिया", Verb),
    ("विशेषण", Adjective),
    ("सर्वनाम", Pronoun),
    ("परसर्ग", Postposition),
];

struct AliasEntry {
    words: Vec<&'static str>,
    phrase: &'static str,
    role: GrammaticalRole,
}

static PHRASES: OnceLock<Vec<AliasEntry>> = OnceLock::new();

// Longest phrases first so "auxiliary verb" wins over "verb".
fn phrases() -> &'static [AliasEntry] {
    PHRASES.get_or_init(|| {
        let mut entries: Vec<AliasEntry> = ALIASES
            .iter()
            .map(|(phrase, role)| AliasEntry {
                words: phrase.split(' ').collect(),
                phrase,
                role: *role,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.words
                .len()
                .cmp(&a.words.len())
                .then(b.phrase.len().cmp(&a.phrase.len()))
        });
        entries
    })
}

/// Map a free-form label to a role without consulting any taxonomy.
pub fn normalize_role_label(label: &str) -> GrammaticalRole {
    let words = clean_label(label);

    if !words.is_empty() {
        let joined = words.join(" ");

        if let Some((_, role)) = ALIASES.iter().find(|(alias, _)| *alias == joined) {
            return *role;
        }

        for entry in phrases() {
            if entry.phrase.len() >= 3 && contains_phrase(&words, &entry.words) {
                return entry.role;
            }
        }

        if let Some(role) = fuzzy_match(&joined) {
            return role;
        }
    }

    let trimmed = label.trim();
    let mut natives: Vec<&(&str, GrammaticalRole)> = NATIVE_LABELS.iter().collect();
    natives.sort_by_key(|(native, _)| std::cmp::Reverse(native.chars().count()));
    natives
        .into_iter()
        .find(|(native, _)| trimmed.contains(native))
        .map(|(_, role)| *role)
        .unwrap_or(Other)
}

/// Lowercase ASCII words; everything else acts as a separator.
fn clean_label(label: &str) -> Vec<String> {
    let folded: String = label
        .chars()
        .map(|c| {
            let c = fold_accent(c);
            if c.is_ascii_alphabetic() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    folded.split_whitespace().map(str::to_string).collect()
}

// Accented Latin letters in Spanish/French/German role names.
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'Á' | 'À' | 'Â' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Î' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'Ó' | 'Ô' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Û' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other,
    }
}

fn contains_phrase(words: &[String], phrase: &[&str]) -> bool {
    words
        .windows(phrase.len())
        .any(|window| window.iter().zip(phrase).all(|(w, p)| w == p))
}

fn fuzzy_match(label: &str) -> Option<GrammaticalRole> {
    let max_distance = if label.len() >= 5 { 2 } else { 1 };
    ALIASES
        .iter()
        .filter(|(alias, _)| alias.len() >= 3)
        .map(|(alias, role)| (levenshtein_distance(label, alias), *role))
        .filter(|(distance, _)| *distance <= max_distance)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, role)| role)
}

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Exact and Alias Tests ====================

    #[test]
    fn test_exact_identifiers() {
        for role in GrammaticalRole::ALL {
            let label = role.as_str().replace('_', " ");
            assert_eq!(normalize_role_label(&label), role, "{}", label);
            assert_eq!(normalize_role_label(role.as_str()), role, "{}", role);
        }
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(normalize_role_label("NOUN"), Noun);
        assert_eq!(normalize_role_label("Verb"), Verb);
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(normalize_role_label("adj."), Adjective);
        assert_eq!(normalize_role_label("CONJ"), Conjunction);
        assert_eq!(normalize_role_label("MW"), Classifier);
    }

    // ==================== Glyph Stripping Tests ====================

    #[test]
    fn test_strips_native_glyphs_around_english_label() {
        assert_eq!(normalize_role_label("名词 (noun)"), Noun);
        assert_eq!(normalize_role_label("📘 Noun"), Noun);
        assert_eq!(normalize_role_label("فعل - verb"), Verb);
    }

    #[test]
    fn test_native_only_labels() {
        assert_eq!(normalize_role_label("量词"), Classifier);
        assert_eq!(normalize_role_label("动态助词"), AspectParticle);
        assert_eq!(normalize_role_label("حرف جر"), Preposition);
        assert_eq!(normalize_role_label("सहायक क्रिया"), AuxiliaryVerb);
        assert_eq!(normalize_role_label("संज्ञा"), Noun);
    }

    // ==================== Phrase Tests ====================

    #[test]
    fn test_longest_phrase_wins() {
        assert_eq!(normalize_role_label("auxiliary verb"), AuxiliaryVerb);
        assert_eq!(normalize_role_label("Proper Noun"), ProperNoun);
        assert_eq!(normalize_role_label("aspect particle (perfective)"), AspectParticle);
        assert_eq!(normalize_role_label("verb (transitive)"), Verb);
    }

    #[test]
    fn test_whole_word_matching_only() {
        // "adverb" contains "verb" as a substring but not as a word
        assert_eq!(normalize_role_label("adverb of manner"), Adverb);
        assert_eq!(normalize_role_label("personal_pronoun"), Pronoun);
    }

    #[test]
    fn test_accented_labels() {
        assert_eq!(normalize_role_label("préposition"), Preposition);
        assert_eq!(normalize_role_label("Artículo"), Article);
    }

    // ==================== Fuzzy Tests ====================

    #[test]
    fn test_fuzzy_near_misses() {
        assert_eq!(normalize_role_label("adjetive"), Adjective);
        assert_eq!(normalize_role_label("pronuon"), Pronoun);
        assert_eq!(normalize_role_label("verbb"), Verb);
    }

    #[test]
    fn test_unmatched_is_other() {
        assert_eq!(normalize_role_label("gerundive construction"), Other);
        assert_eq!(normalize_role_label(""), Other);
        assert_eq!(normalize_role_label("???"), Other);
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("noun", "noun"), 0);
        assert_eq!(levenshtein_distance("nuon", "noun"), 2);
        assert_eq!(levenshtein_distance("", "verb"), 4);
    }
}
