// Polyglot Core Library
// Reads text lines, splits them by detected language and speaks each span in order

pub mod connect;
pub mod detect;
pub mod language;
pub mod lifecycle;
pub mod pipeline;
pub mod session;

// Export core types
pub use connect::{connect, ConnectionError, RetryPolicy};
pub use detect::{DetectedSpan, LanguageDetector};
pub use language::{ConfigError, LanguageSet, LanguageTable};
pub use lifecycle::{arm, termination_signals, GuardState, SessionGuard, Termination};
pub use pipeline::{PipelineError, PipelineStats, SegmentPipeline};
pub use session::{
    prepare_session, BackendError, ClientIdentity, Connector, Playback, PlaybackOutcome,
    SessionSettings, SpeechSession,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolyglotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Internal fault: {0}")]
    Fault(String),

    #[error("Terminated by {0} signal")]
    Terminated(Termination),
}

impl PolyglotError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PolyglotError::Config(_) => 2,
            PolyglotError::Connection(_) => 3,
            PolyglotError::Backend(_) => 4,
            PolyglotError::Pipeline(PipelineError::Read(_)) => 5,
            PolyglotError::Pipeline(_) => 4,
            PolyglotError::Fault(_) => 70,
            PolyglotError::Terminated(termination) => termination.exit_code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PolyglotError>;
