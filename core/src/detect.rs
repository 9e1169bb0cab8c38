//! Language detection contract

/// A single-language slice of one input line.
///
/// `start` and `end` are byte offsets into the line, half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedSpan {
    pub start: usize,
    pub end: usize,
    /// ISO 639-1 code handed to the backend's language switch
    pub language: String,
}

impl DetectedSpan {
    pub fn new(start: usize, end: usize, language: impl Into<String>) -> Self {
        Self {
            start,
            end,
            language: language.into(),
        }
    }

    /// Slice this span out of `line`, or `None` if the offsets do not land on
    /// character boundaries within the line.
    pub fn text<'a>(&self, line: &'a str) -> Option<&'a str> {
        if self.start > self.end {
            return None;
        }
        line.get(self.start..self.end)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait LanguageDetector: Send + Sync {
    fn detect_spans(&self, line: &str) -> Vec<DetectedSpan>;
}
