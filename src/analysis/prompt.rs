//! Prompt rendering for grammar analysis requests.
//!
//! Prompts are pure functions of their inputs and the language profile.

use crate::language::{Complexity, Direction, GrammaticalRole, Language, LanguageProfile};
use std::fmt::Write;

/// Build the system prompt for a language.
pub fn build_system_prompt(profile: &LanguageProfile) -> String {
    format!(
        r#"You are an expert {language} linguist who writes grammar explanations for language learners.

## Output Rules
- Respond with JSON only. No commentary before or after it.
- Analyse every word of every sentence, in the order the words appear in the sentence.
- Copy each word exactly as it is written in the sentence, including accents and diacritics.
- Use only the grammatical roles you are given, spelled exactly as listed."#,
        language = profile.language.name()
    )
}

/// Build the user prompt for one sentence or a batch of sentences.
///
/// A single sentence asks for `{"words": [...]}`; several sentences ask for
/// one entry per sentence keyed by its 1-based `sentence_index`.
pub fn build_prompt(
    complexity: Complexity,
    sentences: &[String],
    target_word: &str,
    native_language: &str,
    allowed_roles: &[GrammaticalRole],
    profile: &LanguageProfile,
) -> String {
    let mut prompt = String::new();
    let language = profile.language;

    let _ = writeln!(
        prompt,
        "Analyse the grammar of the following {} sentence{} for a {} learner whose native language is {}.",
        language.name(),
        if sentences.len() == 1 { "" } else { "s" },
        complexity,
        native_language
    );
    if !target_word.trim().is_empty() {
        let _ = writeln!(
            prompt,
            "The sentences illustrate the word \"{}\".",
            target_word.trim()
        );
    }

    prompt.push_str("\n## Sentences\n");
    for (i, sentence) in sentences.iter().enumerate() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            let _ = writeln!(prompt, "{}. (empty)", i + 1);
        } else {
            let _ = writeln!(prompt, "{}. {}", i + 1, sentence);
        }
    }

    prompt.push_str("\n## Grammatical Roles\n");
    if allowed_roles.is_empty() {
        prompt.push_str("- other\n");
    }
    for role in allowed_roles {
        match profile.taxonomy.get(*role) {
            Some(info) if !info.description.is_empty() => {
                let _ = writeln!(prompt, "- {}: {}", role, info.description);
            }
            _ => {
                let _ = writeln!(prompt, "- {}", role);
            }
        }
    }

    prompt.push_str("\n## Instructions\n");
    let _ = writeln!(
        prompt,
        "- Give each word's meaning in {} as used in this sentence.",
        native_language
    );
    prompt.push_str("- Use \"other\" for any word that fits none of the roles.\n");
    prompt.push_str(language_notes(language, profile.direction()));
    if sentences.iter().any(|s| s.trim().is_empty()) {
        prompt.push_str("- For an empty sentence return an empty \"words\" array.\n");
    }

    prompt.push_str("\n## Response Format\n");
    if sentences.len() == 1 {
        prompt.push_str(
            r#"{"words": [{"word": "...", "individual_meaning": "...", "grammatical_role": "..."}]}"#,
        );
    } else {
        let _ = write!(
            prompt,
            r#"{{"sentences": [{{"sentence_index": 1, "words": [{{"word": "...", "individual_meaning": "...", "grammatical_role": "..."}}]}}]}}
Return exactly {} entries, one per sentence, with sentence_index from 1 to {}."#,
            sentences.len(),
            sentences.len()
        );
    }
    prompt.push('\n');

    prompt
}

fn language_notes(language: Language, direction: Direction) -> &'static str {
    match (language, direction) {
        (_, Direction::Rtl) => {
            "- The text is written right to left. List words in reading order, starting with the first word read (the rightmost).\n- Keep attached prefixes such as ال, و, ب as part of the word they are written with.\n"
        }
        (Language::Chinese, _) => {
            "- Segment the text into words. Multi-character words stay together; particles such as 了, 的 and measure words are separate words.\n"
        }
        (Language::Hindi, _) => {
            "- Treat postpositions (ने, को, से, में) and auxiliaries (है, था) as separate words.\n"
        }
        (Language::French, _) => {
            "- Keep elided forms such as l'homme or n'est as one word.\n"
        }
        (Language::German, _) => {
            "- Keep separable verb prefixes as their own word when they are written apart.\n"
        }
        _ => "",
    }
}
