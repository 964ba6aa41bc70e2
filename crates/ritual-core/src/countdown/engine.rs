//! Countdown engine implementation.
//!
//! The countdown engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller (or [`super::CountdownTimer`]) is responsible
//! for calling `tick()` periodically.
//!
//! Remaining time is always recomputed as `end_at - now`, never by
//! decrementing per tick, so skipped or late ticks cannot accumulate drift.
//! Resuming re-anchors `end_at` to `now + remaining`, which excludes the
//! paused interval.
//!
//! ## State Transitions
//!
//! ```text
//! Running <-> Paused
//! Running -> Completed
//! Paused  -> Completed   (resume with nothing left, or finish)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CountdownEngine::new(SystemClock);
//! engine.start(25 * 60 * 1000);
//! // Every 250ms:
//! engine.tick(); // Returns Some(Event) when the displayed second changes or on completion
//! ```

use serde::{Deserialize, Serialize};

use crate::clock::{epoch_ms_to_datetime, Clock};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Paused,
    /// Terminal. Remaining time is pinned at zero.
    Completed,
}

/// One countdown attempt. Never reused: `reset` builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    total_duration_ms: u64,
    /// Instant the session would complete if never paused again.
    end_at_epoch_ms: u64,
    remaining_ms: u64,
    status: SessionStatus,
}

impl Session {
    fn new(total_duration_ms: u64, now_ms: u64) -> Self {
        Self {
            total_duration_ms,
            end_at_epoch_ms: now_ms.saturating_add(total_duration_ms),
            remaining_ms: total_duration_ms,
            status: SessionStatus::Running,
        }
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn end_at_epoch_ms(&self) -> u64 {
        self.end_at_epoch_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// 0.0 .. 1.0 elapsed share of the session.
    pub fn progress(&self) -> f64 {
        if self.total_duration_ms == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_ms as f64 / self.total_duration_ms as f64)
    }
}

/// Whole seconds shown to the user. Rounds up, so "0" only appears once
/// the session has actually completed.
pub fn display_seconds(remaining_ms: u64) -> u64 {
    remaining_ms.div_ceil(1000)
}

/// Point-in-time view handed to presentation code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountdownSnapshot {
    pub status: SessionStatus,
    pub total_ms: u64,
    pub remaining_ms: u64,
    pub display_seconds: u64,
    pub progress: f64,
}

impl From<&Session> for CountdownSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            status: session.status,
            total_ms: session.total_duration_ms,
            remaining_ms: session.remaining_ms,
            display_seconds: display_seconds(session.remaining_ms),
            progress: session.progress(),
        }
    }
}

/// Core countdown engine.
///
/// Misuse (double start, pausing while paused, ...) is a logged no-op:
/// commands return `None` and leave state untouched.
#[derive(Debug)]
pub struct CountdownEngine<C: Clock> {
    clock: C,
    session: Option<Session>,
    /// Set when `CountdownCompleted` has been emitted for the current session.
    completion_fired: bool,
    last_display_seconds: u64,
}

impl<C: Clock> CountdownEngine<C> {
    /// Create an idle engine. Call [`start`](Self::start) to begin a session.
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            session: None,
            completion_fired: false,
            last_display_seconds: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.session.as_ref().map(|s| s.status)
    }

    pub fn is_running(&self) -> bool {
        self.status() == Some(SessionStatus::Running)
    }

    pub fn remaining_ms(&self) -> u64 {
        self.session.as_ref().map(|s| s.remaining_ms).unwrap_or(0)
    }

    pub fn display_seconds(&self) -> u64 {
        display_seconds(self.remaining_ms())
    }

    pub fn progress(&self) -> f64 {
        self.session.as_ref().map(Session::progress).unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> Option<CountdownSnapshot> {
        self.session.as_ref().map(CountdownSnapshot::from)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, duration_ms: u64) -> Option<Event> {
        if duration_ms == 0 {
            tracing::warn!("countdown start ignored: duration must be positive");
            return None;
        }
        if let Some(session) = &self.session {
            tracing::warn!(status = ?session.status, "countdown start ignored: session already exists");
            return None;
        }
        Some(self.install(duration_ms, false))
    }

    /// Recompute remaining time from the wall clock.
    ///
    /// Returns `CountdownTicked` when the displayed second changes and
    /// `CountdownCompleted` (once) when time runs out.
    pub fn tick(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let session = self.session.as_mut()?;
        if session.status != SessionStatus::Running {
            return None;
        }

        // min() keeps remaining non-increasing if the wall clock steps back.
        let remaining = session
            .end_at_epoch_ms
            .saturating_sub(now)
            .min(session.remaining_ms);
        session.remaining_ms = remaining;

        if remaining == 0 {
            return self.complete(now);
        }

        let shown = display_seconds(remaining);
        if shown != self.last_display_seconds {
            self.last_display_seconds = shown;
            return Some(Event::CountdownTicked {
                remaining_ms: remaining,
                display_seconds: shown,
                at: epoch_ms_to_datetime(now),
            });
        }
        None
    }

    pub fn pause(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let Some(session) = self.session.as_mut() else {
            tracing::warn!("countdown pause ignored: no session");
            return None;
        };
        if session.status != SessionStatus::Running {
            tracing::debug!(status = ?session.status, "countdown pause ignored");
            return None;
        }

        session.remaining_ms = session
            .end_at_epoch_ms
            .saturating_sub(now)
            .min(session.remaining_ms);
        session.status = SessionStatus::Paused;
        self.last_display_seconds = display_seconds(session.remaining_ms);
        tracing::debug!(remaining_ms = session.remaining_ms, "countdown paused");
        Some(Event::CountdownPaused {
            remaining_ms: session.remaining_ms,
            at: epoch_ms_to_datetime(now),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let Some(session) = self.session.as_mut() else {
            tracing::warn!("countdown resume ignored: no session");
            return None;
        };
        if session.status != SessionStatus::Paused {
            tracing::debug!(status = ?session.status, "countdown resume ignored");
            return None;
        }

        if session.remaining_ms == 0 {
            return self.complete(now);
        }

        session.end_at_epoch_ms = now.saturating_add(session.remaining_ms);
        session.status = SessionStatus::Running;
        tracing::debug!(end_at = session.end_at_epoch_ms, "countdown resumed");
        Some(Event::CountdownResumed {
            remaining_ms: session.remaining_ms,
            end_at_epoch_ms: session.end_at_epoch_ms,
            at: epoch_ms_to_datetime(now),
        })
    }

    /// End the session now, e.g. when the user finishes early.
    ///
    /// Shares the once-only guard with `tick()`, so a final tick racing
    /// this call produces a single completion.
    pub fn finish(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        match self.session.as_ref().map(|s| s.status) {
            Some(SessionStatus::Running) | Some(SessionStatus::Paused) => self.complete(now),
            Some(SessionStatus::Completed) => None,
            None => {
                tracing::warn!("countdown finish ignored: no session");
                None
            }
        }
    }

    /// Discard the current session and start a fresh one.
    pub fn reset(&mut self, duration_ms: u64) -> Option<Event> {
        if duration_ms == 0 {
            tracing::warn!("countdown reset ignored: duration must be positive");
            return None;
        }
        Some(self.install(duration_ms, true))
    }

    /// Tear the session down without completing it.
    pub fn cancel(&mut self) -> Option<Event> {
        let session = self.session.take()?;
        self.completion_fired = false;
        tracing::debug!(status = ?session.status, "countdown cancelled");
        Some(Event::CountdownCancelled {
            status: session.status,
            remaining_ms: session.remaining_ms,
            at: epoch_ms_to_datetime(self.clock.now_ms()),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn install(&mut self, duration_ms: u64, is_reset: bool) -> Event {
        let now = self.clock.now_ms();
        let session = Session::new(duration_ms, now);
        let end_at = session.end_at_epoch_ms;
        self.session = Some(session);
        self.completion_fired = false;
        self.last_display_seconds = display_seconds(duration_ms);
        tracing::debug!(duration_ms, end_at, is_reset, "countdown session installed");

        let at = epoch_ms_to_datetime(now);
        if is_reset {
            Event::CountdownReset {
                total_ms: duration_ms,
                at,
            }
        } else {
            Event::CountdownStarted {
                total_ms: duration_ms,
                end_at_epoch_ms: end_at,
                at,
            }
        }
    }

    fn complete(&mut self, now: u64) -> Option<Event> {
        let session = self.session.as_mut()?;
        session.remaining_ms = 0;
        session.status = SessionStatus::Completed;
        self.last_display_seconds = 0;

        if self.completion_fired {
            return None;
        }
        self.completion_fired = true;
        tracing::debug!(total_ms = session.total_duration_ms, "countdown completed");
        Some(Event::CountdownCompleted {
            total_ms: session.total_duration_ms,
            at: epoch_ms_to_datetime(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use proptest::prelude::*;

    fn engine_at(start_ms: u64) -> (CountdownEngine<ManualClock>, ManualClock) {
        let clock = ManualClock::new(start_ms);
        (CountdownEngine::new(clock.clone()), clock)
    }

    #[test]
    fn start_pause_resume() {
        let (mut engine, clock) = engine_at(0);
        assert_eq!(engine.status(), None);

        assert!(engine.start(10_000).is_some());
        assert_eq!(engine.status(), Some(SessionStatus::Running));

        clock.advance(1_000);
        assert!(engine.pause().is_some());
        assert_eq!(engine.status(), Some(SessionStatus::Paused));
        assert_eq!(engine.remaining_ms(), 9_000);

        assert!(engine.resume().is_some());
        assert_eq!(engine.status(), Some(SessionStatus::Running));
    }

    #[test]
    fn double_start_is_ignored() {
        let (mut engine, clock) = engine_at(0);
        engine.start(10_000);
        clock.advance(2_000);
        engine.tick();
        assert!(engine.start(60_000).is_none());
        assert_eq!(engine.session().unwrap().total_duration_ms(), 10_000);
        assert_eq!(engine.remaining_ms(), 8_000);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let (mut engine, _) = engine_at(0);
        assert!(engine.start(0).is_none());
        assert!(engine.session().is_none());
    }

    #[test]
    fn pause_while_paused_is_noop() {
        let (mut engine, clock) = engine_at(0);
        engine.start(10_000);
        clock.advance(3_000);
        engine.pause();
        clock.advance(4_000);
        assert!(engine.pause().is_none());
        assert_eq!(engine.remaining_ms(), 7_000);
    }

    #[test]
    fn resume_while_running_is_noop() {
        let (mut engine, clock) = engine_at(0);
        engine.start(10_000);
        clock.advance(1_000);
        assert!(engine.resume().is_none());
        assert_eq!(engine.session().unwrap().end_at_epoch_ms(), 10_000);
    }

    #[test]
    fn display_rounds_up() {
        assert_eq!(display_seconds(0), 0);
        assert_eq!(display_seconds(1), 1);
        assert_eq!(display_seconds(999), 1);
        assert_eq!(display_seconds(1_000), 1);
        assert_eq!(display_seconds(1_001), 2);
    }

    #[test]
    fn tick_emits_only_on_display_change() {
        let (mut engine, clock) = engine_at(0);
        engine.start(3_000);

        clock.advance(250);
        assert!(engine.tick().is_none());
        clock.advance(750);
        match engine.tick() {
            Some(Event::CountdownTicked { display_seconds, remaining_ms, .. }) => {
                assert_eq!(display_seconds, 2);
                assert_eq!(remaining_ms, 2_000);
            }
            other => panic!("expected tick, got {other:?}"),
        }
        clock.advance(250);
        assert!(engine.tick().is_none());
    }

    #[test]
    fn late_tick_lands_on_exact_remaining() {
        let (mut engine, clock) = engine_at(500);
        engine.start(10_000);
        // A single tick arriving 6.3s late.
        clock.advance(6_300);
        engine.tick();
        assert_eq!(engine.remaining_ms(), 3_700);
        assert_eq!(engine.display_seconds(), 4);
    }

    #[test]
    fn completion_fires_once() {
        let (mut engine, clock) = engine_at(0);
        engine.start(1_000);
        clock.advance(1_000);
        assert!(matches!(engine.tick(), Some(Event::CountdownCompleted { .. })));
        assert!(engine.tick().is_none());
        assert!(engine.finish().is_none());
        assert_eq!(engine.status(), Some(SessionStatus::Completed));
        assert_eq!(engine.remaining_ms(), 0);
    }

    #[test]
    fn finish_then_tick_fires_once() {
        let (mut engine, clock) = engine_at(0);
        engine.start(5_000);
        clock.advance(4_999);
        assert!(matches!(engine.finish(), Some(Event::CountdownCompleted { .. })));
        clock.advance(10);
        assert!(engine.tick().is_none());
    }

    #[test]
    fn completed_never_runs_again() {
        let (mut engine, clock) = engine_at(0);
        engine.start(1_000);
        clock.advance(2_000);
        engine.tick();
        assert!(engine.resume().is_none());
        assert!(engine.pause().is_none());
        assert!(engine.start(1_000).is_none());
        assert_eq!(engine.status(), Some(SessionStatus::Completed));
    }

    #[test]
    fn resume_with_nothing_left_completes() {
        let (mut engine, clock) = engine_at(0);
        engine.start(2_000);
        clock.advance(2_500);
        // Paused before any tick noticed the zero crossing.
        engine.pause();
        assert_eq!(engine.remaining_ms(), 0);
        assert!(matches!(engine.resume(), Some(Event::CountdownCompleted { .. })));
        assert_eq!(engine.status(), Some(SessionStatus::Completed));
    }

    #[test]
    fn scenario_pause_excludes_paused_time() {
        let (mut engine, clock) = engine_at(100_000);
        engine.start(10_000);

        clock.set(103_000);
        engine.pause();
        clock.set(108_000);
        engine.resume();
        assert_eq!(engine.session().unwrap().end_at_epoch_ms(), 115_000);

        clock.set(113_000);
        assert!(!matches!(engine.tick(), Some(Event::CountdownCompleted { .. })));
        clock.set(114_999);
        assert!(!matches!(engine.tick(), Some(Event::CountdownCompleted { .. })));
        clock.set(115_000);
        assert!(matches!(engine.tick(), Some(Event::CountdownCompleted { .. })));
    }

    #[test]
    fn reset_starts_fresh_session() {
        let (mut engine, clock) = engine_at(0);
        engine.start(1_000);
        clock.advance(1_000);
        engine.tick();
        assert!(matches!(engine.reset(3_000), Some(Event::CountdownReset { .. })));
        assert_eq!(engine.status(), Some(SessionStatus::Running));
        assert_eq!(engine.remaining_ms(), 3_000);

        clock.advance(3_000);
        assert!(matches!(engine.tick(), Some(Event::CountdownCompleted { .. })));
    }

    #[test]
    fn cancel_clears_session_without_completion() {
        let (mut engine, clock) = engine_at(0);
        engine.start(1_000);
        assert!(engine.cancel().is_some());
        clock.advance(5_000);
        assert!(engine.tick().is_none());
        assert!(engine.cancel().is_none());
        assert!(engine.start(1_000).is_some());
    }

    #[test]
    fn backwards_clock_does_not_add_time() {
        let (mut engine, clock) = engine_at(50_000);
        engine.start(10_000);
        clock.set(54_000);
        engine.tick();
        clock.set(51_000);
        engine.tick();
        assert_eq!(engine.remaining_ms(), 6_000);
    }

    #[test]
    fn progress_is_monotonic() {
        let (mut engine, clock) = engine_at(0);
        engine.start(4_000);
        let mut last = engine.progress();
        for _ in 0..20 {
            clock.advance(250);
            engine.tick();
            let p = engine.progress();
            assert!(p >= last);
            assert!((0.0..=1.0).contains(&p));
            last = p;
        }
        assert_eq!(last, 1.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        /// Running time between start and completion equals the session
        /// length within one tick step, whatever the pauses were.
        #[test]
        fn pauses_never_drift(
            total in 1_000u64..60_000,
            step in 1u64..1_000,
            segments in prop::collection::vec((0u64..20_000, 0u64..100_000), 0..8),
        ) {
            let (mut engine, clock) = engine_at(1_700_000_000_000);
            engine.start(total);
            let mut running_ms = 0u64;
            let mut completed = false;

            let run_for = |engine: &mut CountdownEngine<ManualClock>, budget: Option<u64>, running_ms: &mut u64| -> bool {
                let mut left = budget;
                loop {
                    let dt = match left {
                        Some(0) => return false,
                        Some(l) => step.min(l),
                        None => step,
                    };
                    clock.advance(dt);
                    *running_ms += dt;
                    if let Some(l) = left.as_mut() {
                        *l -= dt;
                    }
                    if matches!(engine.tick(), Some(Event::CountdownCompleted { .. })) {
                        return true;
                    }
                }
            };

            for (run_ms, paused_ms) in segments {
                if run_for(&mut engine, Some(run_ms), &mut running_ms) {
                    completed = true;
                    break;
                }
                engine.pause();
                clock.advance(paused_ms);
                if matches!(engine.resume(), Some(Event::CountdownCompleted { .. })) {
                    completed = true;
                    break;
                }
            }
            if !completed {
                prop_assert!(run_for(&mut engine, None, &mut running_ms));
            }

            prop_assert!(running_ms >= total);
            prop_assert!(running_ms < total + step);
            prop_assert_eq!(engine.status(), Some(SessionStatus::Completed));
        }
    }
}
