use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::SessionStatus;
use crate::rendezvous::{CommitStatus, OverlayState, RitualOutcome};

/// Every state change in the core produces an Event.
/// Presentation code renders from these; it never edits engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CountdownStarted {
        total_ms: u64,
        end_at_epoch_ms: u64,
        at: DateTime<Utc>,
    },
    /// The displayed whole-second value changed.
    CountdownTicked {
        remaining_ms: u64,
        display_seconds: u64,
        at: DateTime<Utc>,
    },
    CountdownPaused {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    CountdownResumed {
        remaining_ms: u64,
        end_at_epoch_ms: u64,
        at: DateTime<Utc>,
    },
    /// Fired exactly once per session.
    CountdownCompleted {
        total_ms: u64,
        at: DateTime<Utc>,
    },
    CountdownReset {
        total_ms: u64,
        at: DateTime<Utc>,
    },
    CountdownCancelled {
        status: SessionStatus,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    RitualBegan {
        timeline_ms: u64,
        at: DateTime<Utc>,
    },
    CommitStarted {
        attempt: u32,
        at: DateTime<Utc>,
    },
    CommitResolved {
        attempt: u32,
        status: CommitStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
        at: DateTime<Utc>,
    },
    OverlayChanged {
        from: OverlayState,
        to: OverlayState,
        at: DateTime<Utc>,
    },
    /// First terminal state of a ritual; the completion signal.
    Settled {
        state: OverlayState,
        at: DateTime<Utc>,
    },
    Dismissed {
        outcome: RitualOutcome,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::CountdownStarted { at, .. }
            | Event::CountdownTicked { at, .. }
            | Event::CountdownPaused { at, .. }
            | Event::CountdownResumed { at, .. }
            | Event::CountdownCompleted { at, .. }
            | Event::CountdownReset { at, .. }
            | Event::CountdownCancelled { at, .. }
            | Event::RitualBegan { at, .. }
            | Event::CommitStarted { at, .. }
            | Event::CommitResolved { at, .. }
            | Event::OverlayChanged { at, .. }
            | Event::Settled { at, .. }
            | Event::Dismissed { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::epoch_ms_to_datetime;

    #[test]
    fn serializes_with_snake_case_tag() {
        let event = Event::CountdownPaused {
            remaining_ms: 7_000,
            at: epoch_ms_to_datetime(3_000),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "countdown_paused");
        assert_eq!(json["remaining_ms"], 7_000);
    }

    #[test]
    fn resolved_success_omits_error_message() {
        let event = Event::CommitResolved {
            attempt: 1,
            status: CommitStatus::Success,
            error_message: None,
            at: epoch_ms_to_datetime(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("error_message").is_none());
        assert_eq!(json["status"], "success");
    }
}
