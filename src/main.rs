use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use grammar_deck::config::Config;
use grammar_deck::deck::DeckExporter;
use grammar_deck::language::{Complexity, Language, LanguageProfile};
use grammar_deck::llm::OpenAiClient;
use grammar_deck::media::MediaGenerator;
use grammar_deck::pipeline::{build_deck, parse_word_list, RunOptions};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Generate a colour-coded grammar flashcard deck from a word list
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Word list: one `word` or `word<TAB>sentence|sentence` per line
    input: PathBuf,

    /// Language code (ar, hi, zh, es, fr, de)
    #[arg(short, long)]
    language: String,

    /// Learner level: beginner, intermediate or advanced
    #[arg(short, long, default_value = "beginner")]
    complexity: Complexity,

    /// Language meanings are written in
    #[arg(short, long, default_value = "English")]
    native_language: String,

    /// Output directory for deck.tsv, deck.zip and media/
    #[arg(short, long, default_value = "deck")]
    output: PathBuf,

    /// Skip text-to-speech
    #[arg(long)]
    no_audio: bool,

    /// Skip image search
    #[arg(long)]
    no_images: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables come from the environment)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("grammar_deck=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let language = Language::from_code(&args.language)?;
    let profile = LanguageProfile::load(language, config.language_config_dir.as_deref())
        .with_context(|| format!("Failed to load the {} profile", language.name()))?;

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let words = parse_word_list(&text);
    if words.is_empty() {
        bail!("{} contains no words", args.input.display());
    }

    info!(
        "Building a {} {} deck for {} word(s)",
        args.complexity,
        language.name(),
        words.len()
    );

    let http = reqwest::Client::new();
    let client = OpenAiClient::from_config(http.clone(), &config);
    let media = MediaGenerator::from_config(
        http,
        &args.output,
        &config,
        !args.no_audio,
        !args.no_images,
    );
    let options = RunOptions {
        complexity: args.complexity,
        native_language: args.native_language.clone(),
        sentences_per_word: config.sentences_per_word,
    };

    let run = build_deck(
        &client,
        &profile,
        config.pipeline_settings(),
        &media,
        &words,
        &options,
    )
    .await;

    // Whatever finished is exported, even when the run stopped early
    let files = DeckExporter::new(&args.output).export(&run.entries)?;
    let report = serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "language": language.code(),
        "complexity": args.complexity,
        "cards": run.entries.len(),
        "skipped": run.skipped,
        "stopped_early": run.error.as_ref().map(|e| e.to_string()),
        "metrics": run.metrics,
    });
    let report_path = args.output.join("report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    if !run.skipped.is_empty() {
        warn!("Skipped {} word(s): {}", run.skipped.len(), run.skipped.join(", "));
    }

    if let Some(e) = run.error {
        error!(
            "Stopped after {} of {} word(s); partial deck written to {}",
            run.entries.len(),
            words.len(),
            files.zip.display()
        );
        return Err(e.into());
    }

    info!("Deck written to {}", files.zip.display());
    Ok(())
}
