//! Segment pipeline: read a line, split it by language, speak each span in order
//!
//! Playback is strictly sequential. The next span's language switch and
//! speak request are only issued after the previous utterance has finished.

use crate::detect::{DetectedSpan, LanguageDetector};
use crate::session::{BackendError, Playback, SpeechSession};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("error reading input: {0}")]
    Read(#[source] std::io::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("detector returned span {start}..{end} outside line of {line_len} bytes")]
    InvalidSpan {
        start: usize,
        end: usize,
        line_len: usize,
    },

    #[error("playback did not finish within {0:?}")]
    PlaybackTimeout(Duration),
}

/// Counters reported when the pipeline ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines_read: u64,
    pub lines_spoken: u64,
    pub spans_spoken: u64,
    pub language_switches: u64,
}

pub struct SegmentPipeline<S, D: ?Sized> {
    session: Arc<S>,
    detector: Arc<D>,
    active_language: Option<String>,
    playback_timeout: Option<Duration>,
    stats: PipelineStats,
}

impl<S, D> SegmentPipeline<S, D>
where
    S: SpeechSession,
    D: LanguageDetector + ?Sized,
{
    pub fn new(session: Arc<S>, detector: Arc<D>) -> Self {
        Self {
            session,
            detector,
            active_language: None,
            playback_timeout: None,
            stats: PipelineStats::default(),
        }
    }

    /// Bound each completion wait. Unbounded unless set.
    pub fn with_playback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.playback_timeout = timeout;
        self
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Language most recently sent to the backend
    pub fn active_language(&self) -> Option<&str> {
        self.active_language.as_deref()
    }

    /// Consume `input` until end-of-stream or the first failure.
    pub async fn run<R>(&mut self, input: R) -> Result<PipelineStats, PipelineError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(target: "pipeline", error = %e, "Input read failed");
                    return Err(PipelineError::Read(e));
                }
            };
            self.stats.lines_read += 1;
            self.speak_line(&line).await?;
        }
        info!(
            target: "pipeline",
            lines = self.stats.lines_read,
            spans = self.stats.spans_spoken,
            switches = self.stats.language_switches,
            "Input exhausted"
        );
        Ok(self.stats)
    }

    /// Speak one line. Returns the number of spans spoken.
    pub async fn speak_line(&mut self, line: &str) -> Result<usize, PipelineError> {
        if line.trim().is_empty() {
            return Ok(0);
        }

        let mut spans = self.detector.detect_spans(line);
        // Document order, whatever order the detector produced
        spans.sort_by_key(|s| s.start);

        for span in &spans {
            self.speak_span(line, span).await?;
        }
        if !spans.is_empty() {
            self.stats.lines_spoken += 1;
        }
        Ok(spans.len())
    }

    async fn speak_span(&mut self, line: &str, span: &DetectedSpan) -> Result<(), PipelineError> {
        let text = span.text(line).ok_or(PipelineError::InvalidSpan {
            start: span.start,
            end: span.end,
            line_len: line.len(),
        })?;
        debug!(
            target: "pipeline",
            language = %span.language,
            text = %text,
            "Detected language for substring"
        );

        if self.active_language.as_deref() != Some(span.language.as_str()) {
            self.session.set_language(&span.language).await.map_err(|e| {
                warn!(
                    target: "pipeline",
                    language = %span.language,
                    error_code = e.code(),
                    error = %e,
                    "Language switch rejected"
                );
                e
            })?;
            self.active_language = Some(span.language.clone());
            self.stats.language_switches += 1;
        }

        let playback = self.session.speak(text).await?;
        let outcome = match self.playback_timeout {
            Some(limit) => tokio::time::timeout(limit, playback.wait())
                .await
                .map_err(|_| PipelineError::PlaybackTimeout(limit))??,
            None => playback.wait().await?,
        };
        debug!(target: "pipeline", outcome = ?outcome, "Playback finished");
        self.stats.spans_spoken += 1;
        Ok(())
    }
}
