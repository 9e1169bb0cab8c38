// Backend implementations behind the polyglot-core traits

#[cfg(feature = "ssip")]
pub mod ssip;

#[cfg(feature = "ssip")]
pub use ssip::{SsipAddress, SsipConnector, SsipPlayback, SsipSession};

#[cfg(feature = "lingua")]
pub mod detection;

#[cfg(feature = "lingua")]
pub use detection::{language_table, Language, LinguaDetector};
