//! Turns raw LLM output into one `SentenceAnalysis` per input sentence.
//!
//! Models wrap JSON in markdown fences, stop mid-object when they hit the
//! token limit and invent their own role names. All of that is repaired
//! here. The only failure is text with no JSON-like structure at all.

use crate::analysis::roles::normalize_role_label;
use crate::analysis::{AnalysisSource, SentenceAnalysis, WordExplanation};
use crate::error::ParseError;
use crate::language::tokenize::{is_punctuation, tokenize};
use crate::language::{Complexity, LanguageProfile, Script};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

const ENTRY_LIST_KEYS: &[&str] = &["sentences", "analyses", "results"];
const INDEX_KEYS: &[&str] = &["sentence_index", "index"];
const SENTENCE_KEYS: &[&str] = &["sentence", "text"];
const MEANING_KEYS: &[&str] = &["individual_meaning", "meaning", "translation"];
const ROLE_KEYS: &[&str] = &["grammatical_role", "role", "pos"];

static TRAILING_COMMA_REGEX: OnceLock<Regex> = OnceLock::new();

/// Parse `raw` into exactly one analysis per sentence, in input order.
///
/// Sentences the response does not cover come back as placeholder analyses.
/// Every analysis starts at confidence 0; scoring is the validator's job.
pub fn parse(
    raw: &str,
    sentences: &[String],
    profile: &LanguageProfile,
    complexity: Complexity,
) -> Result<Vec<SentenceAnalysis>, ParseError> {
    let value = extract_json(raw)?;

    let mut entries = Vec::new();
    collect_entries(&value, &mut entries);
    let slots = distribute(entries, sentences);

    let analyses = sentences
        .iter()
        .zip(slots)
        .map(|(sentence, entry)| match entry {
            Some(entry) => SentenceAnalysis::new(
                sentence.as_str(),
                align(sentence, raw_words(entry), profile, complexity),
                AnalysisSource::Model,
                complexity,
            ),
            None => placeholder_analysis(sentence, profile, complexity),
        })
        .collect();

    Ok(analyses)
}

/// Analysis made only of placeholder words.
pub fn placeholder_analysis(
    sentence: &str,
    profile: &LanguageProfile,
    complexity: Complexity,
) -> SentenceAnalysis {
    let words = tokenize(sentence, profile.language)
        .into_iter()
        .map(|token| WordExplanation::placeholder(token.text, &profile.taxonomy, complexity))
        .collect();
    SentenceAnalysis::new(sentence, words, AnalysisSource::Placeholder, complexity)
}

// ==================== JSON Extraction ====================

/// Find and repair the JSON in an LLM response.
///
/// Several consecutive top-level values are returned as one array. When the
/// text starts a JSON value but nothing complete can be recovered the result
/// is `Value::Null`.
pub fn extract_json(raw: &str) -> Result<Value, ParseError> {
    let text = strip_fences(raw);
    let start = text.find(is_open_bracket).ok_or(ParseError::NoJson)?;

    let mut values = Vec::new();
    let mut rest = &text[start..];
    loop {
        let scan = scan_value(rest);
        if !scan.complete {
            debug!("Repaired truncated JSON ({} bytes kept)", scan.text.len());
        }
        match parse_lenient(&scan.text) {
            Some(value) => values.push(value),
            None => debug!("Discarding unrepairable JSON value"),
        }
        if !scan.complete {
            break;
        }
        rest = rest[scan.consumed..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if !rest.starts_with(is_open_bracket) {
            break;
        }
    }

    Ok(match values.len() {
        0 => Value::Null,
        1 => values.remove(0),
        _ => Value::Array(values),
    })
}

fn is_open_bracket(c: char) -> bool {
    c == '{' || c == '['
}

/// Content of the first markdown code fence, or the whole text when there is
/// no fence or the fence holds no JSON.
fn strip_fences(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw;
    };
    let after = &raw[open + 3..];
    // Language tag such as `json`
    let body = after.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let body = body.strip_prefix("\r\n").or_else(|| body.strip_prefix('\n')).unwrap_or(body);
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };

    if body.contains(is_open_bracket) {
        body
    } else {
        raw
    }
}

struct Scan {
    text: String,
    /// Bytes of input covered by the scan.
    consumed: usize,
    complete: bool,
}

/// Bracket-matching scan of one value starting at `input[0]`.
///
/// Stray closing brackets are dropped. If the input ends inside the value,
/// the text is cut back to the last point where a container was opened or
/// closed and every still-open container is closed.
fn scan_value(input: &str) -> Scan {
    let mut out = String::with_capacity(input.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut checkpoint: (usize, Vec<char>) = (0, Vec::new());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in input.char_indices() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' | '[' => {
                stack.push(if c == '{' { '}' } else { ']' });
                out.push(c);
                checkpoint = (out.len(), stack.clone());
            }
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                    out.push(c);
                    if stack.is_empty() {
                        return Scan {
                            text: out,
                            consumed: idx + c.len_utf8(),
                            complete: true,
                        };
                    }
                    checkpoint = (out.len(), stack.clone());
                }
            }
            _ => out.push(c),
        }
    }

    let (len, open) = checkpoint;
    out.truncate(len);
    out.extend(open.iter().rev());
    Scan {
        text: out,
        consumed: input.len(),
        complete: false,
    }
}

fn parse_lenient(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let regex = TRAILING_COMMA_REGEX.get_or_init(|| Regex::new(r",\s*([}\]])").unwrap());
    let cleaned = regex.replace_all(text, "$1");
    serde_json::from_str(&cleaned).ok()
}

// ==================== Response Shapes ====================

/// Collect per-sentence entries: objects carrying `words`, or bare word arrays.
fn collect_entries<'v>(value: &'v Value, out: &mut Vec<&'v Value>) {
    match value {
        Value::Object(map) => {
            let list = ENTRY_LIST_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array));
            if let Some(list) = list {
                for entry in list {
                    collect_entries(entry, out);
                }
            } else if map.contains_key("words") {
                out.push(value);
            }
        }
        Value::Array(items) => {
            if items.iter().any(is_word_object) {
                out.push(value);
            } else {
                for item in items {
                    collect_entries(item, out);
                }
            }
        }
        _ => {}
    }
}

fn is_word_object(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("word") && !map.contains_key("words"))
}

/// Assign entries to sentence slots: by explicit index, then by sentence
/// text, then positionally.
fn distribute<'v>(entries: Vec<&'v Value>, sentences: &[String]) -> Vec<Option<&'v Value>> {
    let mut slots: Vec<Option<&Value>> = vec![None; sentences.len()];
    let mut unplaced = Vec::new();

    for (position, entry) in entries.into_iter().enumerate() {
        let by_index = entry_index(entry)
            .filter(|idx| (1..=sentences.len()).contains(idx))
            .map(|idx| idx - 1)
            .filter(|slot| slots[*slot].is_none());
        let slot = by_index.or_else(|| {
            let text = entry_sentence(entry)?;
            sentences
                .iter()
                .enumerate()
                .position(|(i, s)| slots[i].is_none() && s.trim() == text.trim())
        });

        match slot {
            Some(slot) => slots[slot] = Some(entry),
            None => unplaced.push((position, entry)),
        }
    }

    for (position, entry) in unplaced {
        let slot = if position < slots.len() && slots[position].is_none() {
            Some(position)
        } else {
            slots.iter().position(Option::is_none)
        };
        match slot {
            Some(slot) => slots[slot] = Some(entry),
            None => debug!("Dropping response entry with no matching sentence"),
        }
    }

    slots
}

fn entry_index(entry: &Value) -> Option<usize> {
    let map = entry.as_object()?;
    INDEX_KEYS.iter().find_map(|key| match map.get(*key)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn entry_sentence(entry: &Value) -> Option<&str> {
    let map = entry.as_object()?;
    SENTENCE_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
}

struct RawWord {
    word: String,
    meaning: String,
    role: String,
}

fn raw_words(entry: &Value) -> Vec<RawWord> {
    let items = match entry {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("words").and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => &[],
        },
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| {
            let map = item.as_object()?;
            let word = map.get("word")?.as_str()?.trim().to_string();
            Some(RawWord {
                word,
                meaning: first_string(map, MEANING_KEYS),
                role: first_string(map, ROLE_KEYS),
            })
        })
        .collect()
}

fn first_string(map: &serde_json::Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
        .to_string()
}

// ==================== Alignment ====================

/// Order words by their position in the sentence and pad uncovered tokens.
///
/// Logical order is reading order for both LTR and RTL scripts. Words the
/// sentence does not contain stay right after the previous located word.
fn align(
    sentence: &str,
    words: Vec<RawWord>,
    profile: &LanguageProfile,
    complexity: Complexity,
) -> Vec<WordExplanation> {
    let taxonomy = &profile.taxonomy;
    let mut placed: Vec<(usize, WordExplanation)> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut cursor = 0;
    let mut last_key = 0;

    for raw in words {
        if raw.word.is_empty() {
            continue;
        }
        let role = normalize_role_label(&raw.role);
        let (key, text) = match locate(sentence, &raw.word, cursor) {
            Some((pos, end, forward)) => {
                if forward {
                    cursor = end;
                }
                spans.push((pos, end));
                last_key = pos;
                (pos, sentence[pos..end].to_string())
            }
            None => (last_key, raw.word),
        };
        placed.push((
            key,
            WordExplanation::resolved(text, raw.meaning, role, taxonomy, complexity),
        ));
    }

    for token in tokenize(sentence, profile.language) {
        let covered = spans
            .iter()
            .any(|(start, end)| *start < token.end() && token.start < *end);
        if !covered {
            placed.push((
                token.start,
                WordExplanation::placeholder(token.text, taxonomy, complexity),
            ));
        }
    }

    // Stable: ties keep response order, placeholders after located words.
    placed.sort_by_key(|(key, _)| *key);
    placed.into_iter().map(|(_, word)| word).collect()
}

/// Byte span of `word` in `sentence`, searching forward from `from` first.
/// The flag says whether the match was found by the forward search.
fn locate(sentence: &str, word: &str, from: usize) -> Option<(usize, usize, bool)> {
    find_from(sentence, word, from)
        .map(|(start, end)| (start, end, true))
        .or_else(|| find_from(sentence, word, 0).map(|(start, end)| (start, end, false)))
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    let tail = haystack.get(from..)?;
    find_word(tail, needle)
        .map(|pos| (pos, pos + needle.len()))
        .or_else(|| find_word_folded(tail, needle))
        .map(|(start, end)| (from + start, from + end))
}

fn at_boundary(haystack: &str, pos: usize) -> bool {
    haystack[..pos]
        .chars()
        .next_back()
        .map_or(true, |c| c.is_whitespace() || is_punctuation(c) || Script::Han.contains(c))
}

/// First occurrence starting on a word boundary, else the first occurrence.
fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    let mut first = None;
    for (pos, _) in haystack.match_indices(needle) {
        if at_boundary(haystack, pos) {
            return Some(pos);
        }
        first.get_or_insert(pos);
    }
    first
}

/// Case-insensitive `find_word`. Spans are offsets into `haystack`, so the
/// sentence keeps its own spelling ("Él", "Über").
fn find_word_folded(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let mut first = None;
    for (pos, _) in haystack.char_indices() {
        let Some(len) = folded_prefix_len(&haystack[pos..], needle) else {
            continue;
        };
        if at_boundary(haystack, pos) {
            return Some((pos, pos + len));
        }
        first.get_or_insert((pos, pos + len));
    }
    first
}

/// Byte length of the prefix of `text` equal to `needle` ignoring case.
fn folded_prefix_len(text: &str, needle: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    for expected in needle.chars() {
        let (_, c) = chars.next()?;
        if !c.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    Some(chars.next().map_or(text.len(), |(end, _)| end))
}
