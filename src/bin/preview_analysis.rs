//! Preview binary - analyses one sentence and prints the result as JSON
//!
//! Usage:
//!   cargo run --bin preview -- --language zh "我吃了三个苹果。"
//!   cargo run --bin preview -- -l ar -c intermediate "الطالب يقرأ الكتاب"
//!
//! Required environment variables:
//! - OPENAI_API_KEY
//!
//! Optional:
//! - OPENAI_MODEL (defaults to gpt-4o-mini)
//! - LANGUAGE_CONFIG_DIR
//! - CONFIDENCE_THRESHOLD (defaults to 0.85)

use anyhow::{Context, Result};
use clap::Parser;
use grammar_deck::analysis::AnalysisRequest;
use grammar_deck::config::Config;
use grammar_deck::deck::render_grammar_html;
use grammar_deck::language::{Complexity, Language, LanguageProfile};
use grammar_deck::llm::OpenAiClient;
use grammar_deck::orchestrator::BatchOrchestrator;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Analyse one sentence and print the grammar analysis as JSON")]
struct Args {
    /// Sentence to analyse
    sentence: String,

    /// Language code (ar, hi, zh, es, fr, de)
    #[arg(short, long)]
    language: String,

    /// Learner level: beginner, intermediate or advanced
    #[arg(short, long, default_value = "beginner")]
    complexity: Complexity,

    /// Language meanings are written in
    #[arg(short, long, default_value = "English")]
    native_language: String,

    /// Also print the grammar HTML
    #[arg(long)]
    html: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("grammar_deck=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let language = Language::from_code(&args.language)?;
    let profile = LanguageProfile::load(language, config.language_config_dir.as_deref())
        .with_context(|| format!("Failed to load the {} profile", language.name()))?;

    let client = OpenAiClient::from_config(reqwest::Client::new(), &config);
    let mut orchestrator = BatchOrchestrator::new(&client, &profile, config.pipeline_settings());
    let request = AnalysisRequest::new(
        vec![args.sentence.clone()],
        "",
        args.complexity,
        args.native_language.as_str(),
    );

    info!("Analysing with {}", config.openai_model);
    let result = orchestrator.analyze(&request).await?;

    for analysis in result.iter() {
        println!("{}", serde_json::to_string_pretty(analysis)?);
        if args.html {
            println!("{}", render_grammar_html(analysis, language));
        }
    }

    orchestrator.metrics().log_report();
    Ok(())
}
