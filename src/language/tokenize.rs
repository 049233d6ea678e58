//! Heuristic tokenisation shared by the parser, validator and fallback engine.
//!
//! This is deliberately simple: whitespace splitting for alphabetic
//! languages, one token per character for Han text.

use crate::language::{Language, Script};

/// A token and its byte offset in the source sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
}

impl Token {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Punctuation stripped from token edges or skipped entirely.
pub fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '،' | '؛'
                | '؟'
                | '।'
                | '॥'
                | '¿'
                | '¡'
                | '«'
                | '»'
                | '“'
                | '”'
                | '‘'
                | '’'
                | '…'
                | '。'
                | '，'
                | '！'
                | '？'
                | '、'
                | '；'
                | '：'
                | '（'
                | '）'
                | '《'
                | '》'
                | '「'
                | '」'
                | '—'
                | '–'
        )
}

/// Split `sentence` into the units a grammar analysis is expected to cover.
pub fn tokenize(sentence: &str, language: Language) -> Vec<Token> {
    if language.is_space_delimited() {
        tokenize_whitespace(sentence)
    } else {
        tokenize_han(sentence)
    }
}

fn tokenize_whitespace(sentence: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    for piece in sentence.split_whitespace() {
        // split_whitespace yields slices in order, so searching forward is exact
        let start = match sentence[offset..].find(piece) {
            Some(pos) => offset + pos,
            None => continue,
        };
        offset = start + piece.len();

        // Apostrophes inside a word (l'homme, aujourd'hui) stay; at the edges they go.
        let trimmed_start = piece.trim_start_matches(is_punctuation);
        let lead = piece.len() - trimmed_start.len();
        let trimmed = trimmed_start.trim_end_matches(is_punctuation);
        if trimmed.is_empty() {
            continue;
        }
        tokens.push(Token {
            text: trimmed.to_string(),
            start: start + lead,
        });
    }

    tokens
}

fn tokenize_han(sentence: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run: Option<(usize, String)> = None;

    for (idx, c) in sentence.char_indices() {
        if Script::Han.contains(c) {
            if let Some((start, text)) = run.take() {
                tokens.push(Token { text, start });
            }
            tokens.push(Token {
                text: c.to_string(),
                start: idx,
            });
        } else if c.is_whitespace() || is_punctuation(c) {
            if let Some((start, text)) = run.take() {
                tokens.push(Token { text, start });
            }
        } else {
            match run.as_mut() {
                Some((_, text)) => text.push(c),
                None => run = Some((idx, c.to_string())),
            }
        }
    }
    if let Some((start, text)) = run {
        tokens.push(Token { text, start });
    }

    tokens
}

/// Count word-count units: tokens, or Han characters plus other runs for Chinese.
pub fn unit_count(text: &str, language: Language) -> usize {
    tokenize(text, language).len()
}

/// Letters (alphabetic characters and combining marks) in `text`.
pub fn letters(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars()
        .filter(|c| c.is_alphabetic() || is_combining_mark(*c))
}

// Devanagari and Arabic vowel signs are marks, not alphabetic.
fn is_combining_mark(c: char) -> bool {
    let cp = c as u32;
    matches!(
        cp,
        0x0300..=0x036F | 0x0610..=0x061A | 0x064B..=0x065F | 0x0670 | 0x06D6..=0x06ED | 0x0900..=0x0903 | 0x093A..=0x094F | 0x0951..=0x0957 | 0x0962..=0x0963
    )
}

/// Lowercased form used for dictionary keys and word comparisons.
pub fn normalize_word(word: &str) -> String {
    word.trim_matches(is_punctuation).to_lowercase()
}
