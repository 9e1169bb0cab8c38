// Speech Dispatcher client speaking SSIP over a Unix or TCP socket

mod address;
mod client;
mod reply;

pub use address::SsipAddress;
pub use client::{SsipConnector, SsipPlayback, SsipSession};
