//! Language detection backed by the `lingua` crate

use ::lingua::LanguageDetectorBuilder;
use polyglot_core::{DetectedSpan, LanguageDetector, LanguageSet, LanguageTable};
use tracing::debug;

pub use ::lingua::Language;

/// Every language lingua knows, keyed by its English name (e.g. `French`)
pub fn language_table() -> LanguageTable<Language> {
    LanguageTable::new(
        Language::all()
            .into_iter()
            .map(|language| (format!("{:?}", language), language)),
    )
}

pub struct LinguaDetector {
    inner: ::lingua::LanguageDetector,
}

impl LinguaDetector {
    pub fn new(languages: &LanguageSet<Language>) -> Self {
        debug!(target: "detect", languages = ?languages.as_slice(), "Building language detector");
        let inner = LanguageDetectorBuilder::from_languages(languages.as_slice()).build();
        Self { inner }
    }
}

impl LanguageDetector for LinguaDetector {
    fn detect_spans(&self, line: &str) -> Vec<DetectedSpan> {
        self.inner
            .detect_multiple_languages_of(line)
            .into_iter()
            .map(|result| {
                DetectedSpan::new(
                    result.start_index(),
                    result.end_index(),
                    result.language().iso_code_639_1().to_string().to_lowercase(),
                )
            })
            .collect()
    }
}
