pub mod http;
pub mod scheduler;
pub mod session;
pub mod sinks;

pub use session::{FocusNotifier, Perception, ProctorSession, SessionError, SharedEngine};
