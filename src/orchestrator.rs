//! Batch orchestration: submit, validate, retry, fall back.
//!
//! Batches run strictly one after another. Each sentence moves through
//! `Pending -> AwaitingResponse -> Validating` and ends `Accepted`, either
//! from model output at or above the threshold or from the rule-based
//! engine once its attempts are used up. Only fatal service errors and
//! batches that never produced JSON leave this module as errors.

use crate::analysis::fallback::FallbackEngine;
use crate::analysis::parser;
use crate::analysis::prompt::{build_prompt, build_system_prompt};
use crate::analysis::validator::AnalysisValidator;
use crate::analysis::{AnalysisRequest, AnalysisSource, BatchResult, SentenceAnalysis};
use crate::error::PipelineError;
use crate::language::{Dictionary, DictionaryEntry, GrammaticalRole, LanguageProfile};
use crate::llm::CompletionClient;
use crate::metrics::PipelineMetrics;
use crate::retry::RetryConfig;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Tunables for one run of the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Minimum per-sentence confidence for model output to be accepted
    pub confidence_threshold: f32,
    /// Overrides the language profile's batch size when set
    pub batch_size: Option<usize>,
    /// Attempts per sentence and the backoff between them
    pub retry: RetryConfig,
    /// Wait before a sentence's individual call
    pub fallback_delay: Duration,
    /// Wait between consecutive batches
    pub inter_batch_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            batch_size: None,
            retry: RetryConfig::llm_batch(),
            fallback_delay: Duration::from_secs(5),
            inter_batch_delay: Duration::from_secs(1),
        }
    }
}

/// Where a sentence is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    AwaitingResponse,
    Validating,
    Accepted,
    NeedsRetry,
    NeedsFallback,
}

/// Per-sentence bookkeeping inside one batch.
#[derive(Debug)]
struct Slot {
    sentence: String,
    state: BatchState,
    attempts: u32,
    tried_alone: bool,
    accepted: Option<SentenceAnalysis>,
    /// Highest scoring model analysis so far, used for salvage.
    best: Option<SentenceAnalysis>,
}

impl Slot {
    fn new(sentence: &str) -> Self {
        Self {
            sentence: sentence.to_string(),
            state: BatchState::Pending,
            attempts: 0,
            tried_alone: false,
            accepted: None,
            best: None,
        }
    }

    fn transition(&mut self, state: BatchState) {
        debug!("'{}': {:?} -> {:?}", self.sentence, self.state, state);
        self.state = state;
    }

    /// Record a validated model analysis. Returns true when it was accepted.
    fn offer(&mut self, analysis: SentenceAnalysis, threshold: f32) -> bool {
        self.transition(BatchState::Validating);
        if analysis.source == AnalysisSource::Model && analysis.confidence >= threshold {
            self.accepted = Some(analysis);
            self.transition(BatchState::Accepted);
            return true;
        }

        if analysis.source == AnalysisSource::Model
            && self
                .best
                .as_ref()
                .map_or(true, |best| analysis.confidence > best.confidence)
        {
            self.best = Some(analysis);
        }
        self.transition(BatchState::NeedsRetry);
        false
    }
}

/// What came back from one submission.
enum Submission {
    Parsed(Vec<SentenceAnalysis>),
    NoJson,
    Failed,
}

pub struct BatchOrchestrator<'a, C: CompletionClient> {
    client: &'a C,
    profile: &'a LanguageProfile,
    settings: PipelineSettings,
    system_prompt: String,
    learned: Dictionary,
    metrics: PipelineMetrics,
}

impl<'a, C: CompletionClient> BatchOrchestrator<'a, C> {
    pub fn new(client: &'a C, profile: &'a LanguageProfile, settings: PipelineSettings) -> Self {
        Self {
            client,
            profile,
            settings,
            system_prompt: build_system_prompt(profile),
            learned: Dictionary::new(),
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Words learned from accepted analyses during this run.
    pub fn learned(&self) -> &Dictionary {
        &self.learned
    }

    fn batch_size(&self) -> usize {
        self.settings
            .batch_size
            .unwrap_or(self.profile.batch_size)
            .max(1)
    }

    /// Analyse every sentence of `request`, one batch at a time.
    ///
    /// The result holds exactly one analysis per input sentence, in input
    /// order, each either accepted from the model or rebuilt by the fallback
    /// engine. A fatal error discards the analyses of earlier batches too;
    /// the caller drops the whole word.
    pub async fn analyze(&mut self, request: &AnalysisRequest) -> Result<BatchResult, PipelineError> {
        let batch_size = self.batch_size();
        let batches = request.sentences.len().div_ceil(batch_size);
        let mut result = BatchResult::default();

        for (index, chunk) in request.sentences.chunks(batch_size).enumerate() {
            if index > 0 && !self.settings.inter_batch_delay.is_zero() {
                sleep(self.settings.inter_batch_delay).await;
            }
            debug!(
                "Batch {}/{}: {} sentence(s) for '{}'",
                index + 1,
                batches,
                chunk.len(),
                request.target_word
            );
            result.extend(self.process_batch(request, chunk).await?);
        }

        Ok(result)
    }

    async fn process_batch(
        &mut self,
        request: &AnalysisRequest,
        chunk: &[String],
    ) -> Result<Vec<SentenceAnalysis>, PipelineError> {
        let threshold = self.settings.confidence_threshold;
        let max_attempts = self.settings.retry.max_attempts.max(1);
        let mut slots: Vec<Slot> = chunk.iter().map(|s| Slot::new(s)).collect();
        let mut pending: Vec<usize> = (0..slots.len()).collect();
        let (mut submissions, mut no_json) = (0u32, 0u32);

        for attempt in 0..max_attempts {
            if pending.is_empty() {
                break;
            }
            if attempt > 0 {
                self.metrics.record_retry();
                let delay = self.settings.retry.delay_for_attempt(attempt);
                info!(
                    "Retrying {} of {} sentence(s) below {:.2} (attempt {}/{}, waiting {:?})",
                    pending.len(),
                    slots.len(),
                    threshold,
                    attempt + 1,
                    max_attempts,
                    delay
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }

            let sentences: Vec<String> = pending.iter().map(|&i| slots[i].sentence.clone()).collect();
            for &i in &pending {
                slots[i].transition(BatchState::AwaitingResponse);
                slots[i].attempts += 1;
                slots[i].tried_alone |= sentences.len() == 1;
            }

            submissions += 1;
            match self.submit(request, &sentences).await? {
                Submission::Parsed(analyses) => {
                    for (&i, analysis) in pending.iter().zip(analyses) {
                        slots[i].offer(analysis, threshold);
                    }
                }
                Submission::NoJson => no_json += 1,
                Submission::Failed => {}
            }

            pending.retain(|&i| slots[i].accepted.is_none());
        }

        if submissions > 0 && no_json == submissions {
            return Err(PipelineError::NoStructuredOutput {
                attempts: submissions,
                sentences: chunk.len(),
            });
        }

        let accepted_now = slots.len() - pending.len();
        if accepted_now > 0 {
            info!(
                "Accepted {}/{} sentence(s) from the model",
                accepted_now,
                slots.len()
            );
        }

        for &i in &pending {
            self.finish_sentence(request, &mut slots[i]).await?;
        }

        let analyses: Vec<SentenceAnalysis> = slots
            .into_iter()
            .filter_map(|slot| slot.accepted)
            .collect();

        let accepted_from_model: Vec<&SentenceAnalysis> = analyses
            .iter()
            .filter(|a| a.source == AnalysisSource::Model)
            .collect();
        self.metrics.record_accepted(accepted_from_model.len());
        for analysis in accepted_from_model {
            learn(&mut self.learned, analysis);
        }

        Ok(analyses)
    }

    /// Individual call if the sentence was never sent alone, then fallback.
    async fn finish_sentence(
        &mut self,
        request: &AnalysisRequest,
        slot: &mut Slot,
    ) -> Result<(), PipelineError> {
        let threshold = self.settings.confidence_threshold;
        slot.transition(BatchState::NeedsFallback);

        if !slot.tried_alone {
            if !self.settings.fallback_delay.is_zero() {
                sleep(self.settings.fallback_delay).await;
            }
            self.metrics.record_individual_call();
            slot.tried_alone = true;
            slot.attempts += 1;
            let sentences = vec![slot.sentence.clone()];
            if let Submission::Parsed(analyses) = self.submit(request, &sentences).await? {
                if let Some(analysis) = analyses.into_iter().next() {
                    if slot.offer(analysis, threshold) {
                        return Ok(());
                    }
                }
            }
        }

        let recovered = FallbackEngine::new(self.profile)
            .with_learned(&self.learned)
            .recover(&slot.sentence, request.complexity, slot.best.as_ref());
        warn!(
            "Using rule-based analysis for '{}' after {} attempt(s) (confidence {:.2})",
            slot.sentence, slot.attempts, recovered.confidence
        );
        self.metrics.record_recovered();
        slot.accepted = Some(recovered);
        slot.transition(BatchState::Accepted);
        Ok(())
    }

    /// Send one prompt and validate whatever comes back.
    ///
    /// Non-fatal call failures and unparseable responses are reported as a
    /// failed submission; fatal service errors abort.
    async fn submit(
        &mut self,
        request: &AnalysisRequest,
        sentences: &[String],
    ) -> Result<Submission, PipelineError> {
        let prompt = build_prompt(
            request.complexity,
            sentences,
            &request.target_word,
            &request.native_language,
            &self.profile.allowed_roles(request.complexity),
            self.profile,
        );

        self.metrics.record_llm_call();
        let raw = match self.client.complete(&self.system_prompt, &prompt).await {
            Ok(raw) => raw,
            Err(e) if e.is_fatal() => {
                self.metrics.record_llm_failure();
                return Err(PipelineError::Fatal(e));
            }
            Err(e) => {
                self.metrics.record_llm_failure();
                warn!("Analysis call for {} sentence(s) failed: {}", sentences.len(), e);
                return Ok(Submission::Failed);
            }
        };

        let mut analyses = match parser::parse(&raw, sentences, self.profile, request.complexity) {
            Ok(analyses) => analyses,
            Err(e) => {
                self.metrics.record_llm_failure();
                warn!("Discarding analysis response: {}", e);
                debug!("Raw response: {}", raw);
                return Ok(Submission::NoJson);
            }
        };

        for analysis in &mut analyses {
            let report = AnalysisValidator::apply(analysis, self.profile);
            if !report.issues.is_empty() {
                debug!(
                    "'{}' scored {:.2}: {}",
                    analysis.sentence,
                    report.confidence,
                    report.issues.join("; ")
                );
            }
        }
        Ok(Submission::Parsed(analyses))
    }
}

/// Remember the explained words of an accepted analysis.
fn learn(lexicon: &mut Dictionary, analysis: &SentenceAnalysis) {
    for word in analysis.analysed_words() {
        if word.role == GrammaticalRole::Other || word.meaning.trim().is_empty() {
            continue;
        }
        if lexicon.lookup(&word.word).is_none() {
            lexicon.insert(
                &word.word,
                DictionaryEntry {
                    meaning: word.meaning.clone(),
                    role: word.role,
                },
            );
        }
    }
}
