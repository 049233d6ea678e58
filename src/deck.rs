//! Deck export: grammar HTML, Anki-importable TSV and a ZIP package.

use crate::analysis::SentenceAnalysis;
use crate::language::Language;
use crate::media::MEDIA_DIR;
use anyhow::{Context, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const TSV_FILE: &str = "deck.tsv";
pub const ZIP_FILE: &str = "deck.zip";

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

/// One flashcard.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckEntry {
    pub word: String,
    pub meaning: String,
    pub ipa: String,
    pub sentences: Vec<String>,
    pub grammar_html: String,
    /// Audio file name inside the media directory
    pub audio: Option<String>,
    /// Image file name inside the media directory
    pub image: Option<String>,
    /// Lowest confidence over the entry's sentences
    pub confidence: f32,
    /// Whether any sentence was rebuilt by the rule-based engine
    pub fallback: bool,
}

impl DeckEntry {
    /// Entry for `word` built from the analyses of its sentences.
    pub fn new(
        word: impl Into<String>,
        meaning: impl Into<String>,
        ipa: impl Into<String>,
        analyses: &[SentenceAnalysis],
        language: Language,
    ) -> Self {
        let grammar_html = analyses
            .iter()
            .map(|analysis| render_grammar_html(analysis, language))
            .collect::<Vec<_>>()
            .join("");

        Self {
            word: word.into(),
            meaning: meaning.into(),
            ipa: ipa.into(),
            sentences: analyses.iter().map(|a| a.sentence.clone()).collect(),
            grammar_html,
            audio: None,
            image: None,
            confidence: analyses
                .iter()
                .map(|a| a.confidence)
                .reduce(f32::min)
                .unwrap_or(0.0),
            fallback: analyses.iter().any(SentenceAnalysis::is_fallback),
        }
    }

    /// Fields in deck column order.
    fn columns(&self) -> [String; 6] {
        let meaning = if self.ipa.is_empty() {
            self.meaning.clone()
        } else {
            format!("{} /{}/", self.meaning, self.ipa)
        };
        [
            self.word.clone(),
            meaning,
            self.sentences
                .iter()
                .map(|s| html_escape::encode_text(s).into_owned())
                .collect::<Vec<_>>()
                .join("<br>"),
            self.grammar_html.clone(),
            self.audio
                .as_ref()
                .map(|file| format!("[sound:{}]", file))
                .unwrap_or_default(),
            self.image
                .as_ref()
                .map(|file| format!("<img src=\"{}\">", html_escape::encode_double_quoted_attribute(file)))
                .unwrap_or_default(),
        ]
    }

    fn media_files(&self) -> impl Iterator<Item = &str> {
        self.audio.iter().chain(self.image.iter()).map(String::as_str)
    }
}

/// Colour-coded HTML for one analysed sentence.
///
/// Words stay in the sentence's logical order; `dir` lets the browser lay
/// out right-to-left scripts.
pub fn render_grammar_html(analysis: &SentenceAnalysis, language: Language) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<div class="grammar" dir="{}" lang="{}" data-confidence="{:.2}""#,
        language.direction().as_html(),
        language.code(),
        analysis.confidence
    );
    if analysis.is_fallback() {
        html.push_str(r#" data-fallback="true""#);
    }
    html.push('>');

    let separator = if language.is_space_delimited() { " " } else { "" };
    let spans: Vec<String> = analysis
        .words
        .iter()
        .map(|word| {
            format!(
                r#"<span class="word role-{}" style="color: {}" title="{}">{}</span>"#,
                word.role.as_str(),
                html_escape::encode_double_quoted_attribute(&word.color),
                html_escape::encode_double_quoted_attribute(&word.meaning),
                html_escape::encode_text(&word.word)
            )
        })
        .collect();
    html.push_str(&spans.join(separator));
    html.push_str("</div>");
    html
}

/// Text content of grammar HTML: tags removed, entities decoded.
pub fn strip_markup(html: &str) -> String {
    let regex = TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));
    html_escape::decode_html_entities(&regex.replace_all(html, "")).into_owned()
}

fn sanitize_field(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

/// Render entries as an Anki-importable TSV document.
pub fn render_tsv(entries: &[DeckEntry]) -> String {
    let mut tsv = String::from("#separator:tab\n#html:true\n#columns:Word\tMeaning\tSentence\tGrammar\tAudio\tImage\n");
    for entry in entries {
        let row: Vec<String> = entry.columns().iter().map(|f| sanitize_field(f)).collect();
        tsv.push_str(&row.join("\t"));
        tsv.push('\n');
    }
    tsv
}

/// Paths written by an export.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckFiles {
    pub tsv: PathBuf,
    pub zip: PathBuf,
}

/// Writes `deck.tsv` and `deck.zip` into an output directory.
pub struct DeckExporter {
    output_dir: PathBuf,
}

impl DeckExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn export(&self, entries: &[DeckEntry]) -> Result<DeckFiles> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        let tsv_path = self.output_dir.join(TSV_FILE);
        let tsv = render_tsv(entries);
        std::fs::write(&tsv_path, &tsv)
            .with_context(|| format!("Failed to write {}", tsv_path.display()))?;

        let zip_path = self.output_dir.join(ZIP_FILE);
        self.write_zip(&zip_path, &tsv, entries)
            .with_context(|| format!("Failed to write {}", zip_path.display()))?;

        let fallback = entries.iter().filter(|e| e.fallback).count();
        info!(
            "Exported {} card(s) to {} ({} with rule-based grammar)",
            entries.len(),
            self.output_dir.display(),
            fallback
        );

        Ok(DeckFiles {
            tsv: tsv_path,
            zip: zip_path,
        })
    }

    fn write_zip(&self, path: &Path, tsv: &str, entries: &[DeckEntry]) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(TSV_FILE, options)?;
        zip.write_all(tsv.as_bytes())?;

        let media_dir = self.output_dir.join(MEDIA_DIR);
        let mut added = std::collections::HashSet::new();
        for name in entries.iter().flat_map(DeckEntry::media_files) {
            if !added.insert(name) {
                continue;
            }
            let source = media_dir.join(name);
            let content = match std::fs::read(&source) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Leaving {} out of the package: {}", source.display(), e);
                    continue;
                }
            };
            zip.start_file(format!("{}/{}", MEDIA_DIR, name), options)?;
            zip.write_all(&content)?;
        }

        zip.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisSource, WordExplanation};
    use crate::language::tokenize::tokenize;
    use crate::language::{Complexity, GrammaticalRole, LanguageProfile};
    use std::io::Read;

    fn analysis(language: Language, sentence: &str, words: &[(&str, &str, GrammaticalRole)]) -> SentenceAnalysis {
        let profile = LanguageProfile::builtin(language).unwrap();
        let words = words
            .iter()
            .map(|(w, m, r)| WordExplanation::resolved(*w, *m, *r, &profile.taxonomy, Complexity::Beginner))
            .collect();
        let mut analysis = SentenceAnalysis::new(sentence, words, AnalysisSource::Model, Complexity::Beginner);
        analysis.confidence = 0.93;
        analysis
    }

    // ==================== HTML Tests ====================

    #[test]
    fn test_rtl_round_trip_keeps_word_order() {
        let sentence = "الطالب يقرأ الكتاب";
        let analysis = analysis(
            Language::Arabic,
            sentence,
            &[
                ("الطالب", "the student", GrammaticalRole::Noun),
                ("يقرأ", "reads", GrammaticalRole::Verb),
                ("الكتاب", "the book", GrammaticalRole::Noun),
            ],
        );
        let html = render_grammar_html(&analysis, Language::Arabic);
        assert!(html.starts_with(r#"<div class="grammar" dir="rtl" lang="ar" data-confidence="0.93">"#));

        let stripped = strip_markup(&html);
        let words: Vec<String> = stripped.split_whitespace().map(str::to_string).collect();
        let expected: Vec<String> = tokenize(sentence, Language::Arabic).into_iter().map(|t| t.text).collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn test_chinese_has_no_separator() {
        let analysis = analysis(
            Language::Chinese,
            "我吃了",
            &[
                ("我", "I", GrammaticalRole::Pronoun),
                ("吃", "eat", GrammaticalRole::Verb),
                ("了", "done", GrammaticalRole::AspectParticle),
            ],
        );
        let html = render_grammar_html(&analysis, Language::Chinese);
        assert_eq!(strip_markup(&html), "我吃了");
        assert!(html.contains(r#"dir="ltr""#));
    }

    #[test]
    fn test_html_is_escaped() {
        let analysis = analysis(
            Language::French,
            "l'homme",
            &[("l'homme", "the \"man\" <m>", GrammaticalRole::Noun)],
        );
        let html = render_grammar_html(&analysis, Language::French);
        assert!(html.contains("&quot;man&quot;"));
        assert!(!html.contains("<m>"));
        assert_eq!(strip_markup(&html), "l'homme");
    }

    #[test]
    fn test_fallback_flag_and_role_class() {
        let mut analysis = analysis(Language::German, "Hund", &[("Hund", "dog", GrammaticalRole::Noun)]);
        analysis.source = AnalysisSource::Fallback;
        let html = render_grammar_html(&analysis, Language::German);
        assert!(html.contains(r#"data-fallback="true""#));
        assert!(html.contains(r#"class="word role-noun""#));
        assert!(html.contains("style=\"color: #FFAA00\""));
    }

    // ==================== Entry Tests ====================

    #[test]
    fn test_entry_quality_flags() {
        let good = analysis(Language::German, "Der Hund.", &[("Hund", "dog", GrammaticalRole::Noun)]);
        let mut recovered = good.clone();
        recovered.confidence = 0.4;
        recovered.source = AnalysisSource::Fallback;

        let entry = DeckEntry::new("Hund", "dog", "hʊnt", &[good, recovered], Language::German);
        assert_eq!(entry.sentences.len(), 2);
        assert_eq!(entry.confidence, 0.4);
        assert!(entry.fallback);
        assert_eq!(entry.grammar_html.matches("<div").count(), 2);
    }

    // ==================== TSV Tests ====================

    #[test]
    fn test_tsv_header_and_row() {
        let mut entry = DeckEntry::new(
            "Hund",
            "dog",
            "hʊnt",
            &[analysis(Language::German, "Der\tHund.", &[("Hund", "dog", GrammaticalRole::Noun)])],
            Language::German,
        );
        entry.audio = Some("hund.mp3".to_string());
        entry.image = Some("hund.jpg".to_string());

        let tsv = render_tsv(&[entry]);
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines[0], "#separator:tab");
        assert_eq!(lines[1], "#html:true");
        assert_eq!(lines[2], "#columns:Word\tMeaning\tSentence\tGrammar\tAudio\tImage");

        let fields: Vec<&str> = lines[3].split('\t').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[0], "Hund");
        assert_eq!(fields[1], "dog /hʊnt/");
        assert_eq!(fields[2], "Der Hund.");
        assert_eq!(fields[4], "[sound:hund.mp3]");
        assert_eq!(fields[5], r#"<img src="hund.jpg">"#);
    }

    // ==================== Export Tests ====================

    #[test]
    fn test_export_writes_tsv_and_zip_with_media() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(MEDIA_DIR)).unwrap();
        std::fs::write(dir.path().join("media/hund.mp3"), b"mp3").unwrap();

        let mut entry = DeckEntry::new(
            "Hund",
            "dog",
            "",
            &[analysis(Language::German, "Hund", &[("Hund", "dog", GrammaticalRole::Noun)])],
            Language::German,
        );
        entry.audio = Some("hund.mp3".to_string());
        entry.image = Some("missing.jpg".to_string());

        let files = DeckExporter::new(dir.path()).export(&[entry]).unwrap();
        assert!(files.tsv.exists());

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&files.zip).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["deck.tsv", "media/hund.mp3"]);

        let mut tsv = String::new();
        archive.by_name("deck.tsv").unwrap().read_to_string(&mut tsv).unwrap();
        assert!(tsv.contains("[sound:hund.mp3]"));
    }

    #[test]
    fn test_export_empty_deck() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let files = DeckExporter::new(&out).export(&[]).unwrap();
        let tsv = std::fs::read_to_string(files.tsv).unwrap();
        assert_eq!(tsv.lines().count(), 3);
    }
}
