// Session lifecycle: exactly-once release across normal exit, faults and signals

pub mod guard;
pub mod signal;

pub use guard::{GuardState, SessionGuard};
pub use signal::{arm, termination_signals, Termination};
