//! Rendezvous reconciler.
//!
//! Two independent completions feed this state: the fixed-length visual
//! timeline and the caller's commit operation. The overlay shown to the
//! user is always [`resolve_overlay`] of the two, never a function of which
//! one finished first.
//!
//! ```text
//! animation_complete  commit     overlay
//! false               any        Animating
//! true                Pending    Syncing
//! true                Success    Success
//! true                Error      Error
//! ```
//!
//! All methods take `now` (epoch ms) explicitly; the async
//! [`super::RendezvousController`] supplies it from its clock.

use serde::{Deserialize, Serialize};

use crate::clock::epoch_ms_to_datetime;
use crate::error::{CommitError, RendezvousError};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayState {
    Animating,
    Syncing,
    Success,
    Error,
}

impl OverlayState {
    pub fn is_terminal(self) -> bool {
        matches!(self, OverlayState::Success | OverlayState::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStatus {
    Pending,
    Success,
    Error,
}

/// The rendezvous table.
pub fn resolve_overlay(animation_complete: bool, commit: CommitStatus) -> OverlayState {
    match (animation_complete, commit) {
        (false, _) => OverlayState::Animating,
        (true, CommitStatus::Pending) => OverlayState::Syncing,
        (true, CommitStatus::Success) => OverlayState::Success,
        (true, CommitStatus::Error) => OverlayState::Error,
    }
}

/// One invocation of the commit operation. A retry builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAttempt {
    pub number: u32,
    pub status: CommitStatus,
    pub error_message: Option<String>,
    pub started_at_epoch_ms: u64,
}

impl CommitAttempt {
    fn new(number: u32, now: u64) -> Self {
        Self {
            number,
            status: CommitStatus::Pending,
            error_message: None,
            started_at_epoch_ms: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub duration_ms: u64,
    pub started_at_epoch_ms: u64,
    pub progress: f64,
    /// Monotonic: false -> true, once.
    pub animation_complete: bool,
}

impl Timeline {
    fn new(duration_ms: u64, now: u64) -> Self {
        Self {
            duration_ms,
            started_at_epoch_ms: now,
            progress: 0.0,
            animation_complete: false,
        }
    }

    pub fn end_at_epoch_ms(&self) -> u64 {
        self.started_at_epoch_ms.saturating_add(self.duration_ms)
    }

    fn advance(&mut self, now: u64) {
        if self.animation_complete {
            return;
        }
        let elapsed = now.saturating_sub(self.started_at_epoch_ms);
        let ratio = if self.duration_ms == 0 {
            1.0
        } else {
            (elapsed as f64 / self.duration_ms as f64).min(1.0)
        };
        self.progress = self.progress.max(ratio);
    }
}

/// What the user was left with when the overlay was dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RitualOutcome {
    Succeeded,
    Failed { message: String },
}

/// Render-ready view of the rendezvous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub state: OverlayState,
    pub error_message: Option<String>,
    /// Only true once `Syncing` has lasted past the spinner delay.
    pub show_spinner: bool,
    pub progress: f64,
    pub attempt: u32,
    pub navigation_locked: bool,
}

/// Timing knobs for one rendezvous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendezvousSettings {
    pub timeline_ms: u64,
    pub spinner_delay_ms: u64,
    pub generic_error_message: String,
}

impl Default for RendezvousSettings {
    fn default() -> Self {
        Self {
            timeline_ms: 4_500,
            spinner_delay_ms: 400,
            generic_error_message: "Something went wrong. Please try again.".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rendezvous {
    settings: RendezvousSettings,
    timeline: Option<Timeline>,
    attempt: Option<CommitAttempt>,
    navigation_locked: bool,
    /// The completion signal has been emitted.
    settled: bool,
    dismissed: bool,
    syncing_since_ms: Option<u64>,
    state: OverlayState,
}

impl Rendezvous {
    pub fn new(settings: RendezvousSettings) -> Self {
        Self {
            settings,
            timeline: None,
            attempt: None,
            navigation_locked: false,
            settled: false,
            dismissed: false,
            syncing_since_ms: None,
            state: OverlayState::Animating,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &RendezvousSettings {
        &self.settings
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn attempt(&self) -> Option<&CommitAttempt> {
        self.attempt.as_ref()
    }

    pub fn animation_complete(&self) -> bool {
        self.timeline
            .as_ref()
            .map(|t| t.animation_complete)
            .unwrap_or(false)
    }

    pub fn is_navigation_locked(&self) -> bool {
        self.navigation_locked
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed
    }

    /// Milliseconds until the syncing spinner becomes visible, if it is
    /// still waiting to appear.
    pub fn spinner_due_in(&self, now: u64) -> Option<u64> {
        let since = self.syncing_since_ms?;
        let due = since.saturating_add(self.settings.spinner_delay_ms);
        (now < due).then(|| due - now)
    }

    pub fn overlay(&self, now: u64) -> Overlay {
        let show_spinner = match self.syncing_since_ms {
            Some(since) => now.saturating_sub(since) >= self.settings.spinner_delay_ms,
            None => false,
        };
        Overlay {
            state: self.state,
            error_message: match self.state {
                OverlayState::Error => self.attempt.as_ref().and_then(|a| a.error_message.clone()),
                _ => None,
            },
            show_spinner,
            progress: self.timeline.as_ref().map(|t| t.progress).unwrap_or(0.0),
            attempt: self.attempt.as_ref().map(|a| a.number).unwrap_or(0),
            navigation_locked: self.navigation_locked,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start the timeline and the first commit attempt.
    ///
    /// Returns the attempt number the caller must invoke the commit for.
    pub fn begin(&mut self, now: u64) -> Result<(u32, Vec<Event>), RendezvousError> {
        if self.timeline.is_some() {
            return Err(RendezvousError::AlreadyBegun);
        }
        Ok(self.start(now))
    }

    /// A rendezvous that has already begun at `now`, with the attempt
    /// number to invoke and the opening events.
    pub fn started(settings: RendezvousSettings, now: u64) -> (Self, u32, Vec<Event>) {
        let mut rendezvous = Self::new(settings);
        let (attempt, events) = rendezvous.start(now);
        (rendezvous, attempt, events)
    }

    fn start(&mut self, now: u64) -> (u32, Vec<Event>) {
        let timeline = Timeline::new(self.settings.timeline_ms, now);
        self.timeline = Some(timeline);
        self.attempt = Some(CommitAttempt::new(1, now));
        self.navigation_locked = true;
        self.state = OverlayState::Animating;
        tracing::debug!(timeline_ms = self.settings.timeline_ms, "rendezvous began");

        let at = epoch_ms_to_datetime(now);
        (
            1,
            vec![
                Event::RitualBegan {
                    timeline_ms: self.settings.timeline_ms,
                    at,
                },
                Event::CommitStarted { attempt: 1, at },
            ],
        )
    }

    /// Update timeline progress. Does not complete the timeline.
    pub fn advance_timeline(&mut self, now: u64) -> f64 {
        match self.timeline.as_mut() {
            Some(timeline) => {
                timeline.advance(now);
                timeline.progress
            }
            None => 0.0,
        }
    }

    /// The timeline reached its end.
    pub fn complete_timeline(&mut self, now: u64) -> Vec<Event> {
        let Some(timeline) = self.timeline.as_mut() else {
            tracing::warn!("timeline completion ignored: rendezvous not begun");
            return Vec::new();
        };
        if timeline.animation_complete {
            return Vec::new();
        }
        timeline.progress = 1.0;
        timeline.animation_complete = true;
        self.reconcile(now)
    }

    /// Record the result of commit attempt `attempt`.
    ///
    /// Results from superseded or already-resolved attempts are dropped.
    pub fn resolve_commit(
        &mut self,
        attempt: u32,
        result: Result<(), CommitError>,
        now: u64,
    ) -> Vec<Event> {
        let fallback = &self.settings.generic_error_message;
        let Some(current) = self.attempt.as_mut() else {
            tracing::warn!(attempt, "commit result ignored: rendezvous not begun");
            return Vec::new();
        };
        if current.number != attempt || current.status != CommitStatus::Pending {
            tracing::debug!(attempt, current = current.number, "stale commit result ignored");
            return Vec::new();
        }

        match result {
            Ok(()) => {
                current.status = CommitStatus::Success;
                current.error_message = None;
            }
            Err(err) => {
                current.status = CommitStatus::Error;
                current.error_message = Some(err.user_message(fallback));
            }
        }
        tracing::debug!(attempt, status = ?current.status, "commit resolved");

        let mut events = vec![Event::CommitResolved {
            attempt,
            status: current.status,
            error_message: current.error_message.clone(),
            at: epoch_ms_to_datetime(now),
        }];
        events.extend(self.reconcile(now));
        events
    }

    /// Start a new commit attempt after a failure. The timeline is not
    /// replayed.
    pub fn retry(&mut self, now: u64) -> Result<(u32, Vec<Event>), RendezvousError> {
        if self.dismissed {
            return Err(RendezvousError::AlreadyDismissed);
        }
        let Some(current) = self.attempt.as_ref() else {
            return Err(RendezvousError::NotStarted);
        };
        if self.state != OverlayState::Error {
            if self.animation_complete() && current.status == CommitStatus::Pending {
                return Err(RendezvousError::CommitInFlight);
            }
            return Err(RendezvousError::RetryNotAllowed { state: self.state });
        }

        let number = current.number + 1;
        self.attempt = Some(CommitAttempt::new(number, now));
        tracing::debug!(attempt = number, "commit retry");

        let mut events = vec![Event::CommitStarted {
            attempt: number,
            at: epoch_ms_to_datetime(now),
        }];
        events.extend(self.reconcile(now));
        Ok((number, events))
    }

    /// Leave a terminal overlay and release the navigation lock.
    pub fn dismiss(&mut self, now: u64) -> Result<(RitualOutcome, Vec<Event>), RendezvousError> {
        if self.dismissed {
            return Err(RendezvousError::AlreadyDismissed);
        }
        if self.timeline.is_none() {
            return Err(RendezvousError::NotStarted);
        }
        let outcome = match self.state {
            OverlayState::Success => RitualOutcome::Succeeded,
            OverlayState::Error => RitualOutcome::Failed {
                message: self
                    .attempt
                    .as_ref()
                    .and_then(|a| a.error_message.clone())
                    .unwrap_or_else(|| self.settings.generic_error_message.clone()),
            },
            state => return Err(RendezvousError::DismissNotAllowed { state }),
        };
        self.dismissed = true;
        self.navigation_locked = false;
        tracing::info!(?outcome, "rendezvous dismissed");
        Ok((
            outcome.clone(),
            vec![Event::Dismissed {
                outcome,
                at: epoch_ms_to_datetime(now),
            }],
        ))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn reconcile(&mut self, now: u64) -> Vec<Event> {
        let Some(attempt) = self.attempt.as_ref() else {
            return Vec::new();
        };
        let next = resolve_overlay(self.animation_complete(), attempt.status);
        if next == self.state {
            return Vec::new();
        }

        let at = epoch_ms_to_datetime(now);
        let mut events = vec![Event::OverlayChanged {
            from: self.state,
            to: next,
            at,
        }];
        self.syncing_since_ms = (next == OverlayState::Syncing).then_some(now);
        self.state = next;

        if next.is_terminal() && !self.settled {
            self.settled = true;
            tracing::info!(state = ?next, "rendezvous settled");
            events.push(Event::Settled { state: next, at });
        }
        events
    }
}
