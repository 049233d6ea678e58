//! Word list to deck entries: generation, analysis and media per word.

use crate::analysis::{AnalysisRequest, SentenceAnalysis};
use crate::deck::DeckEntry;
use crate::error::PipelineError;
use crate::generator::ContentGenerator;
use crate::language::tokenize::normalize_word;
use crate::language::{Complexity, LanguageProfile};
use crate::llm::CompletionClient;
use crate::media::{slugify, MediaGenerator};
use crate::metrics::MetricsReport;
use crate::orchestrator::{BatchOrchestrator, PipelineSettings};
use std::collections::HashSet;
use tracing::{info, warn};

/// One line of the input word list.
#[derive(Debug, Clone, PartialEq)]
pub struct WordInput {
    pub word: String,
    /// Example sentences given in the input; generated when empty
    pub sentences: Vec<String>,
}

/// Parse `word` or `word<TAB>sentence|sentence` lines.
///
/// Blank lines and `#` comments are skipped.
pub fn parse_word_list(text: &str) -> Vec<WordInput> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (word, sentences) = match line.split_once('\t') {
                Some((word, rest)) => (
                    word.trim(),
                    rest.split('|')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                ),
                None => (line, Vec::new()),
            };
            (!word.is_empty()).then(|| WordInput {
                word: word.to_string(),
                sentences,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub complexity: Complexity,
    pub native_language: String,
    pub sentences_per_word: usize,
}

/// Outcome of a run. `error` is set when a fatal error stopped it early;
/// `entries` then holds the cards finished before that.
#[derive(Debug)]
pub struct DeckRun {
    pub entries: Vec<DeckEntry>,
    pub skipped: Vec<String>,
    pub error: Option<PipelineError>,
    pub metrics: MetricsReport,
}

/// Build deck entries for `words`, one word at a time.
pub async fn build_deck<C: CompletionClient>(
    client: &C,
    profile: &LanguageProfile,
    settings: PipelineSettings,
    media: &MediaGenerator,
    words: &[WordInput],
    options: &RunOptions,
) -> DeckRun {
    let mut orchestrator = BatchOrchestrator::new(client, profile, settings);
    let generator = ContentGenerator::new(client, profile.language, options.native_language.as_str());
    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    let mut error = None;
    let mut slugs = HashSet::new();

    for (i, input) in words.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, words.len(), input.word);
        let slug = unique_slug(&mut slugs, &input.word);
        let result =
            build_entry(&mut orchestrator, &generator, profile, media, input, &slug, options).await;
        match result {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => skipped.push(input.word.clone()),
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    orchestrator.metrics().log_report();
    DeckRun {
        entries,
        skipped,
        error,
        metrics: orchestrator.metrics().report(),
    }
}

async fn build_entry<C: CompletionClient>(
    orchestrator: &mut BatchOrchestrator<'_, C>,
    generator: &ContentGenerator<'_, C>,
    profile: &LanguageProfile,
    media: &MediaGenerator,
    input: &WordInput,
    slug: &str,
    options: &RunOptions,
) -> Result<Option<DeckEntry>, PipelineError> {
    let (sentences, meaning, ipa) = if input.sentences.is_empty() {
        let content = generator
            .generate(&input.word, options.complexity, options.sentences_per_word)
            .await?;
        (content.sentences, content.meaning, content.ipa)
    } else {
        (input.sentences.clone(), String::new(), String::new())
    };

    if sentences.is_empty() {
        warn!("No example sentences for '{}', skipping", input.word);
        return Ok(None);
    }

    let request = AnalysisRequest::new(
        sentences,
        input.word.as_str(),
        options.complexity,
        options.native_language.as_str(),
    );
    let analyses = orchestrator.analyze(&request).await?.into_vec();

    let meaning = if meaning.is_empty() {
        target_meaning(&analyses, &input.word).unwrap_or_default()
    } else {
        meaning
    };

    let mut entry = DeckEntry::new(&input.word, meaning, ipa, &analyses, profile.language);
    entry.audio = media.audio(slug, &entry.sentences).await?;
    entry.image = media.image(slug, &input.word).await?;
    Ok(Some(entry))
}

/// Media file stem for `word`, suffixed when an earlier word in the run
/// already slugified the same way ("Arm" and "arm").
fn unique_slug(used: &mut HashSet<String>, word: &str) -> String {
    let base = slugify(word);
    let mut slug = base.clone();
    let mut n = 1;
    while !used.insert(slug.clone()) {
        n += 1;
        slug = format!("{}_{}", base, n);
    }
    slug
}

/// Meaning the analyses give for the target word itself.
fn target_meaning(analyses: &[SentenceAnalysis], word: &str) -> Option<String> {
    let key = normalize_word(word);
    analyses
        .iter()
        .flat_map(|a| a.analysed_words())
        .find(|w| normalize_word(&w.word) == key && !w.meaning.trim().is_empty())
        .map(|w| w.meaning.clone())
}
