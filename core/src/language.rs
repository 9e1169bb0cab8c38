//! Language lookup table and the validated set of languages for a run

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no languages specified")]
    MissingLanguages,

    #[error("at least two languages must be specified, got {count}")]
    TooFewLanguages { count: usize },

    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("invalid setting {key}: {message}")]
    InvalidSetting { key: String, message: String },

    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Immutable name → language table, built once at startup
#[derive(Debug, Clone)]
pub struct LanguageTable<L> {
    by_name: BTreeMap<String, L>,
}

impl<L: Copy + Eq> LanguageTable<L> {
    pub fn new(entries: impl IntoIterator<Item = (String, L)>) -> Self {
        Self {
            by_name: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<L> {
        self.by_name.get(name).copied()
    }

    /// All known names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Resolve user-supplied names. Each entry may itself be a comma-separated
    /// list; surrounding whitespace and empty items are ignored, duplicates
    /// collapse.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<LanguageSet<L>, ConfigError> {
        let mut languages = Vec::new();
        let mut seen_any = false;
        for name in names
            .iter()
            .flat_map(|n| n.as_ref().split(','))
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            seen_any = true;
            let language = self
                .get(name)
                .ok_or_else(|| ConfigError::UnknownLanguage(name.to_string()))?;
            if !languages.contains(&language) {
                languages.push(language);
            }
        }
        if !seen_any {
            return Err(ConfigError::MissingLanguages);
        }
        LanguageSet::new(languages)
    }
}

/// Languages the detector may choose among. Always holds two or more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSet<L> {
    languages: Vec<L>,
}

impl<L: Copy + Eq> LanguageSet<L> {
    pub fn new(languages: Vec<L>) -> Result<Self, ConfigError> {
        let mut distinct: Vec<L> = Vec::with_capacity(languages.len());
        for language in languages {
            if !distinct.contains(&language) {
                distinct.push(language);
            }
        }
        if distinct.len() < 2 {
            return Err(ConfigError::TooFewLanguages {
                count: distinct.len(),
            });
        }
        Ok(Self {
            languages: distinct,
        })
    }

    pub fn as_slice(&self) -> &[L] {
        &self.languages
    }
}
