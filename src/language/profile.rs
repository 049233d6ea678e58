//! Language profiles: everything the pipeline needs to know about one language.
//!
//! Built-in profiles are embedded from `config/languages/<code>.yaml`. A
//! directory of overrides can replace any key of a built-in profile and add a
//! `<code>.json` word dictionary. Profiles are built once and then shared
//! read-only by reference.

use crate::analysis::checks::StructuralCheck;
use crate::analysis::roles::normalize_role_label;
use crate::error::ConfigError;
use crate::language::tokenize::normalize_word;
use crate::language::{Complexity, Direction, GrammaticalRole, Language, RoleInfo, Script, Taxonomy};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

/// Profile file contents. Every key is optional so that override files only
/// need to name what they change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileFile {
    pub script_floor: Option<f32>,
    pub batch_size: Option<usize>,
    pub disabled_checks: Option<Vec<String>>,
    pub roles: Option<BTreeMap<String, RoleInfo>>,
    pub patterns: Option<Vec<PatternEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    pub role: String,
    #[serde(default)]
    pub meaning: Option<String>,
}

impl ProfileFile {
    pub fn from_yaml(language: Language, yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            language: language.code().to_string(),
            source,
        })
    }

    /// Apply `other` on top of `self`: roles merge per role, other keys replace.
    pub fn merge(mut self, other: ProfileFile) -> ProfileFile {
        if other.script_floor.is_some() {
            self.script_floor = other.script_floor;
        }
        if other.batch_size.is_some() {
            self.batch_size = other.batch_size;
        }
        if other.disabled_checks.is_some() {
            self.disabled_checks = other.disabled_checks;
        }
        if other.patterns.is_some() {
            self.patterns = other.patterns;
        }
        if let Some(extra) = other.roles {
            let roles = self.roles.get_or_insert_with(BTreeMap::new);
            roles.extend(extra);
        }
        self
    }
}

/// Regex-based role guess used by the fallback engine.
#[derive(Debug, Clone)]
pub struct FallbackPattern {
    pub regex: Regex,
    pub role: GrammaticalRole,
    pub meaning: Option<String>,
}

/// Known word with a cached meaning and role.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryEntry {
    pub meaning: String,
    pub role: GrammaticalRole,
}

#[derive(Debug, Deserialize)]
struct RawDictionaryEntry {
    meaning: String,
    role: String,
}

/// Word → entry map keyed by the normalised word form.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: HashMap<String, DictionaryEntry>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{ "word": { "meaning": "...", "role": "noun" } }`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, RawDictionaryEntry> = serde_json::from_str(json)?;
        let mut dictionary = Dictionary::new();
        for (word, entry) in raw {
            dictionary.insert(
                &word,
                DictionaryEntry {
                    meaning: entry.meaning,
                    role: normalize_role_label(&entry.role),
                },
            );
        }
        Ok(dictionary)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Dictionary::from_json(&json).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn insert(&mut self, word: &str, entry: DictionaryEntry) {
        let key = normalize_word(word);
        if !key.is_empty() {
            self.entries.insert(key, entry);
        }
    }

    pub fn lookup(&self, word: &str) -> Option<&DictionaryEntry> {
        self.entries.get(&normalize_word(word))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable per-language configuration.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub language: Language,
    pub taxonomy: Taxonomy,
    /// Minimum share of letters that must fall in the language's script.
    pub script_floor: f32,
    pub batch_size: usize,
    /// Enabled structural checks, in the order they run.
    pub checks: Vec<StructuralCheck>,
    pub patterns: Vec<FallbackPattern>,
    pub dictionary: Dictionary,
}

const DEFAULT_SCRIPT_FLOOR: f32 = 0.5;
const DEFAULT_BATCH_SIZE: usize = 8;

fn builtin_yaml(language: Language) -> &'static str {
    match language {
        Language::Arabic => include_str!("../../config/languages/ar.yaml"),
        Language::Hindi => include_str!("../../config/languages/hi.yaml"),
        Language::Chinese => include_str!("../../config/languages/zh.yaml"),
        Language::Spanish => include_str!("../../config/languages/es.yaml"),
        Language::French => include_str!("../../config/languages/fr.yaml"),
        Language::German => include_str!("../../config/languages/de.yaml"),
    }
}

impl LanguageProfile {
    /// Profile from the embedded defaults only.
    pub fn builtin(language: Language) -> Result<Self, ConfigError> {
        let file = ProfileFile::from_yaml(language, builtin_yaml(language))?;
        Self::from_file(language, file, Dictionary::new())
    }

    /// Profile from the embedded defaults plus optional overrides in `dir`.
    ///
    /// `<dir>/<code>.yaml` overrides profile keys; `<dir>/<code>.json` supplies
    /// the dictionary. Missing files are not an error.
    pub fn load(language: Language, dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut file = ProfileFile::from_yaml(language, builtin_yaml(language))?;
        let mut dictionary = Dictionary::new();

        if let Some(dir) = dir {
            let yaml_path = dir.join(format!("{}.yaml", language.code()));
            if yaml_path.exists() {
                let yaml = std::fs::read_to_string(&yaml_path).map_err(|source| {
                    ConfigError::Io {
                        path: yaml_path.clone(),
                        source,
                    }
                })?;
                debug!("Applying profile overrides from {}", yaml_path.display());
                file = file.merge(ProfileFile::from_yaml(language, &yaml)?);
            }

            let dict_path = dir.join(format!("{}.json", language.code()));
            if dict_path.exists() {
                dictionary = Dictionary::load(&dict_path)?;
                debug!(
                    "Loaded {} dictionary entries from {}",
                    dictionary.len(),
                    dict_path.display()
                );
            }
        }

        Self::from_file(language, file, dictionary)
    }

    /// Build a profile from already-merged file contents.
    pub fn from_file(
        language: Language,
        file: ProfileFile,
        dictionary: Dictionary,
    ) -> Result<Self, ConfigError> {
        let script_floor = file.script_floor.unwrap_or(DEFAULT_SCRIPT_FLOOR);
        if !(0.0..=1.0).contains(&script_floor) {
            return Err(ConfigError::Invalid {
                key: "script_floor".to_string(),
                message: format!("{} is outside 0.0..=1.0", script_floor),
            });
        }

        let batch_size = file.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let mut roles = BTreeMap::new();
        for (name, info) in file.roles.unwrap_or_default() {
            match GrammaticalRole::from_id(&name) {
                Some(role) => {
                    roles.insert(role, info);
                }
                None => warn!(
                    "Skipping unknown role '{}' in {} profile",
                    name,
                    language.name()
                ),
            }
        }

        let disabled = file.disabled_checks.unwrap_or_default();
        for id in &disabled {
            if !StructuralCheck::for_language(language)
                .iter()
                .any(|check| check.id() == id)
            {
                warn!(
                    "Unknown check '{}' in disabled_checks for {}",
                    id,
                    language.name()
                );
            }
        }
        let checks = StructuralCheck::for_language(language)
            .into_iter()
            .filter(|check| !disabled.iter().any(|id| id == check.id()))
            .collect();

        let mut patterns = Vec::new();
        for entry in file.patterns.unwrap_or_default() {
            let regex = Regex::new(&entry.pattern).map_err(|source| ConfigError::Pattern {
                pattern: entry.pattern.clone(),
                source,
            })?;
            patterns.push(FallbackPattern {
                regex,
                role: normalize_role_label(&entry.role),
                meaning: entry.meaning,
            });
        }

        Ok(Self {
            language,
            taxonomy: Taxonomy::new(roles),
            script_floor,
            batch_size,
            checks,
            patterns,
            dictionary,
        })
    }

    pub fn direction(&self) -> Direction {
        self.language.direction()
    }

    pub fn script(&self) -> Script {
        self.language.script()
    }

    /// Roles a prompt may offer at `complexity`.
    pub fn allowed_roles(&self, complexity: Complexity) -> Vec<GrammaticalRole> {
        self.taxonomy.allowed_roles(complexity)
    }

    /// First fallback pattern matching `word`.
    pub fn match_pattern(&self, word: &str) -> Option<&FallbackPattern> {
        self.patterns.iter().find(|p| p.regex.is_match(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== Built-in Profile Tests ====================

    #[test]
    fn test_every_builtin_profile_loads() {
        for language in Language::ALL {
            let profile = LanguageProfile::builtin(language)
                .unwrap_or_else(|e| panic!("{} profile failed: {}", language, e));
            assert_eq!(profile.language, language);
            assert!(profile.batch_size >= 8 && profile.batch_size <= 16);
            assert!(!profile.patterns.is_empty());
            assert!(!profile.checks.is_empty());
        }
    }

    #[test]
    fn test_builtin_beginner_tier_has_content_roles() {
        for language in Language::ALL {
            let profile = LanguageProfile::builtin(language).unwrap();
            let beginner = profile.allowed_roles(Complexity::Beginner);
            assert!(beginner.contains(&GrammaticalRole::Noun), "{}", language);
            assert!(beginner.contains(&GrammaticalRole::Verb), "{}", language);
            assert!(beginner.contains(&GrammaticalRole::Other), "{}", language);
        }
    }

    #[test]
    fn test_chinese_aspect_particle_is_intermediate() {
        let profile = LanguageProfile::builtin(Language::Chinese).unwrap();
        assert!(!profile
            .allowed_roles(Complexity::Beginner)
            .contains(&GrammaticalRole::AspectParticle));
        assert!(profile
            .allowed_roles(Complexity::Intermediate)
            .contains(&GrammaticalRole::AspectParticle));
    }

    #[test]
    fn test_match_pattern_first_wins() {
        let profile = LanguageProfile::builtin(Language::Chinese).unwrap();
        let pattern = profile.match_pattern("了").unwrap();
        assert_eq!(pattern.role, GrammaticalRole::AspectParticle);
        assert!(profile.match_pattern("猫").is_none());
    }

    // ==================== Merge Tests ====================

    #[test]
    fn test_merge_replaces_present_keys_only() {
        let base = ProfileFile::from_yaml(Language::German, builtin_yaml(Language::German)).unwrap();
        let overrides = ProfileFile::from_yaml(
            Language::German,
            "batch_size: 4\nroles:\n  noun:\n    color: \"#000000\"\n    tier: beginner\n",
        )
        .unwrap();

        let merged = base.merge(overrides);
        assert_eq!(merged.batch_size, Some(4));
        assert_eq!(merged.script_floor, Some(0.5));
        let roles = merged.roles.unwrap();
        assert_eq!(roles["noun"].color, "#000000");
        assert!(roles.contains_key("verb"));
    }

    #[test]
    fn test_unknown_role_is_skipped() {
        let file = ProfileFile::from_yaml(
            Language::Spanish,
            "roles:\n  gerundio:\n    color: \"#123456\"\n  noun:\n    color: \"#654321\"\n",
        )
        .unwrap();
        let profile = LanguageProfile::from_file(Language::Spanish, file, Dictionary::new()).unwrap();
        assert_eq!(profile.taxonomy.get(GrammaticalRole::Noun).unwrap().color, "#654321");
    }

    #[test]
    fn test_disabled_checks_are_removed() {
        let file = ProfileFile::from_yaml(
            Language::German,
            "disabled_checks: [noun_capitalization]\n",
        )
        .unwrap();
        let profile = LanguageProfile::from_file(Language::German, file, Dictionary::new()).unwrap();
        assert!(profile
            .checks
            .iter()
            .all(|check| check.id() != "noun_capitalization"));
        assert!(profile.checks.iter().any(|check| check.id() == "articles"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let file = ProfileFile::from_yaml(
            Language::French,
            "patterns:\n  - { pattern: '(unclosed', role: noun }\n",
        )
        .unwrap();
        let result = LanguageProfile::from_file(Language::French, file, Dictionary::new());
        assert!(matches!(result, Err(ConfigError::Pattern { .. })));
    }

    #[test]
    fn test_invalid_script_floor_is_an_error() {
        let file = ProfileFile::from_yaml(Language::Hindi, "script_floor: 1.5\n").unwrap();
        assert!(LanguageProfile::from_file(Language::Hindi, file, Dictionary::new()).is_err());
    }

    // ==================== Directory Loading Tests ====================

    #[test]
    fn test_load_with_override_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ar.yaml"), "batch_size: 3\n").unwrap();
        std::fs::write(
            dir.path().join("ar.json"),
            r#"{"كتاب": {"meaning": "book", "role": "Noun"}}"#,
        )
        .unwrap();

        let profile = LanguageProfile::load(Language::Arabic, Some(dir.path())).unwrap();
        assert_eq!(profile.batch_size, 3);
        let entry = profile.dictionary.lookup("كتاب").unwrap();
        assert_eq!(entry.meaning, "book");
        assert_eq!(entry.role, GrammaticalRole::Noun);
    }

    #[test]
    fn test_load_without_files_matches_builtin() {
        let dir = TempDir::new().unwrap();
        let loaded = LanguageProfile::load(Language::Hindi, Some(dir.path())).unwrap();
        let builtin = LanguageProfile::builtin(Language::Hindi).unwrap();
        assert_eq!(loaded.batch_size, builtin.batch_size);
        assert_eq!(loaded.taxonomy, builtin.taxonomy);
        assert!(loaded.dictionary.is_empty());
    }

    #[test]
    fn test_bad_dictionary_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("zh.json"), "{not json").unwrap();
        let result = LanguageProfile::load(Language::Chinese, Some(dir.path()));
        assert!(matches!(result, Err(ConfigError::Json { .. })));
    }

    // ==================== Dictionary Tests ====================

    #[test]
    fn test_dictionary_lookup_is_case_insensitive() {
        let dictionary = Dictionary::from_json(r#"{"Haus": {"meaning": "house", "role": "noun"}}"#)
            .unwrap();
        assert_eq!(dictionary.lookup("haus").unwrap().meaning, "house");
        assert_eq!(dictionary.lookup("Haus.").unwrap().meaning, "house");
        assert!(dictionary.lookup("Maus").is_none());
    }
}
