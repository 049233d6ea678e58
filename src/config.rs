use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::orchestrator::PipelineSettings;
use crate::retry::RetryConfig;

const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";
const DEFAULT_PIXABAY_API_URL: &str = "https://pixabay.com/api/";

#[derive(Debug, Clone)]
pub struct Config {
    // OpenAI
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_api_url: String,
    pub llm_max_tokens: u32,

    // Text-to-speech
    pub openai_tts_url: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_speed: f32,

    // Images
    pub pixabay_api_key: Option<String>,
    pub pixabay_api_url: String,

    // Language profiles
    pub language_config_dir: Option<PathBuf>,

    // Pipeline
    pub confidence_threshold: f32,
    pub batch_size: Option<usize>,
    pub batch_max_attempts: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub fallback_delay_secs: u64,
    pub inter_batch_delay_ms: u64,
    pub sentences_per_word: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let confidence_threshold = env_parse("CONFIDENCE_THRESHOLD", 0.85_f32);
        if !(0.0..=1.0).contains(&confidence_threshold) {
            bail!(
                "CONFIDENCE_THRESHOLD must be between 0.0 and 1.0, got {}",
                confidence_threshold
            );
        }
        let tts_speed = env_parse("TTS_SPEED", 1.0_f32);
        if !tts_speed.is_finite() {
            bail!("TTS_SPEED must be a finite number, got {}", tts_speed);
        }

        Ok(Self {
            // OpenAI
            openai_api_key: std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?,
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_api_url: env_or("OPENAI_API_URL", DEFAULT_OPENAI_API_URL),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", 4000),

            // Text-to-speech
            openai_tts_url: env_or("OPENAI_TTS_URL", DEFAULT_OPENAI_TTS_URL),
            tts_model: env_or("TTS_MODEL", "tts-1"),
            tts_voice: env_or("TTS_VOICE", "alloy"),
            tts_speed: tts_speed.clamp(0.25, 4.0),

            // Images
            pixabay_api_key: std::env::var("PIXABAY_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            pixabay_api_url: env_or("PIXABAY_API_URL", DEFAULT_PIXABAY_API_URL),

            // Language profiles
            language_config_dir: std::env::var("LANGUAGE_CONFIG_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),

            // Pipeline
            confidence_threshold,
            batch_size: std::env::var("BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|size: &usize| *size > 0),
            batch_max_attempts: env_parse("BATCH_MAX_ATTEMPTS", 2_u32).max(1),
            backoff_initial_ms: env_parse("BACKOFF_INITIAL_MS", 1000),
            backoff_max_ms: env_parse("BACKOFF_MAX_MS", 30_000),
            fallback_delay_secs: env_parse("FALLBACK_DELAY_SECS", 5),
            inter_batch_delay_ms: env_parse("INTER_BATCH_DELAY_MS", 1000),
            sentences_per_word: env_parse("SENTENCES_PER_WORD", 3_usize).max(1),
        })
    }

    /// Orchestrator settings derived from this configuration.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            confidence_threshold: self.confidence_threshold,
            batch_size: self.batch_size,
            retry: RetryConfig::new(
                self.batch_max_attempts,
                Duration::from_millis(self.backoff_initial_ms),
            )
            .with_max_delay(Duration::from_millis(self.backoff_max_ms)),
            fallback_delay: Duration::from_secs(self.fallback_delay_secs),
            inter_batch_delay: Duration::from_millis(self.inter_batch_delay_ms),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
