//! Language type: the closed set of languages with grammar analyzers.
//!
//! Each variant knows its code, its writing direction and the script whose
//! Unicode ranges the validator checks sentences against.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Arabic,
    Hindi,
    Chinese,
    Spanish,
    French,
    German,
}

/// Reading direction of a language's script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    /// Value for the HTML `dir` attribute.
    pub fn as_html(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Writing system with a defined set of Unicode ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Arabic,
    Devanagari,
    Han,
    Latin,
}

impl Script {
    /// Whether `c` falls inside one of this script's ranges.
    pub fn contains(&self, c: char) -> bool {
        let cp = c as u32;
        match self {
            Script::Arabic => matches!(
                cp,
                0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF
            ),
            Script::Devanagari => matches!(cp, 0x0900..=0x097F | 0xA8E0..=0xA8FF),
            Script::Han => matches!(cp, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF),
            Script::Latin => {
                c.is_ascii_alphabetic() || (matches!(cp, 0x00C0..=0x024F) && c != '×' && c != '÷')
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Script::Arabic => "Arabic",
            Script::Devanagari => "Devanagari",
            Script::Han => "Han",
            Script::Latin => "Latin",
        }
    }
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Arabic,
        Language::Hindi,
        Language::Chinese,
        Language::Spanish,
        Language::French,
        Language::German,
    ];

    /// Create a Language from an ISO 639-1 code.
    pub fn from_code(code: &str) -> Result<Language, ConfigError> {
        let normalized = code.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == normalized)
            .ok_or_else(|| ConfigError::UnknownLanguage(code.to_string()))
    }

    /// ISO 639-1 code (e.g. "ar", "zh").
    pub fn code(&self) -> &'static str {
        match self {
            Language::Arabic => "ar",
            Language::Hindi => "hi",
            Language::Chinese => "zh",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
        }
    }

    /// English name of the language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Arabic => "Arabic",
            Language::Hindi => "Hindi",
            Language::Chinese => "Chinese",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Language::Arabic => Direction::Rtl,
            _ => Direction::Ltr,
        }
    }

    pub fn script(&self) -> Script {
        match self {
            Language::Arabic => Script::Arabic,
            Language::Hindi => Script::Devanagari,
            Language::Chinese => Script::Han,
            Language::Spanish | Language::French | Language::German => Script::Latin,
        }
    }

    /// Whether words are separated by whitespace.
    pub fn is_space_delimited(&self) -> bool {
        !matches!(self, Language::Chinese)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_code(s)
    }
}
