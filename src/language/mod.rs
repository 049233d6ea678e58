//! Per-language configuration.
//!
//! # Architecture
//!
//! - `language`: the closed set of supported languages, their direction and script
//! - `taxonomy`: grammatical roles, complexity tiers and colours
//! - `profile`: YAML/JSON-backed profile bundling everything for one language
//! - `tokenize`: heuristic tokenisation shared by the analysis stages
//!
//! # Example
//!
//! ```rust,ignore
//! use grammar_deck::language::{Language, LanguageProfile};
//!
//! let chinese = Language::from_code("zh")?;
//! let profile = LanguageProfile::load(chinese, None)?;
//! ```

#[allow(clippy::module_inception)]
mod language;
mod profile;
mod taxonomy;
pub mod tokenize;

pub use language::{Direction, Language, Script};
pub use profile::{
    Dictionary, DictionaryEntry, FallbackPattern, LanguageProfile, PatternEntry, ProfileFile,
};
pub use taxonomy::{Complexity, GrammaticalRole, RoleInfo, Taxonomy, OTHER_COLOR};
