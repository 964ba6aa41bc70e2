mod engine;
mod timer;

pub use engine::{display_seconds, CountdownEngine, CountdownSnapshot, Session, SessionStatus};
pub use timer::{CompletionCallback, CountdownTimer};
