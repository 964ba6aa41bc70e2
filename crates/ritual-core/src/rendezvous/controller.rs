//! Async rendezvous controller.
//!
//! An actor task owns the [`Rendezvous`] reconciler and serialises every
//! input through one `select!` loop: timeline frames, the timeline end,
//! commit results, the spinner delay and caller requests. Because only the
//! actor mutates state, both completion orders (and a tie) go through the
//! same code path.
//!
//! The commit runs in its own detached task. Dropping the controller stops
//! the actor but leaves that task alone, so the external effect still
//! happens; its result is simply discarded.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

use super::state::{Overlay, Rendezvous, RendezvousSettings, RitualOutcome};
use crate::clock::Clock;
use crate::error::{CommitError, RendezvousError};
use crate::events::Event;

pub type CommitFuture = Pin<Box<dyn Future<Output = Result<(), CommitError>> + Send>>;

/// The external operation. Called once per attempt.
pub type CommitFn = Arc<dyn Fn() -> CommitFuture + Send + Sync>;

/// Wrap an async closure as a [`CommitFn`].
pub fn commit_fn<F, Fut>(f: F) -> CommitFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CommitError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

const EVENT_CAPACITY: usize = 64;
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Terminal navigation callbacks, invoked on dismiss.
#[derive(Default)]
pub struct RitualCallbacks {
    on_success: Option<Box<dyn FnOnce() + Send>>,
    on_error: Option<Box<dyn FnOnce(String) + Send>>,
}

impl RitualCallbacks {
    pub fn on_success(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn deliver(self, outcome: &RitualOutcome) {
        match outcome {
            RitualOutcome::Succeeded => {
                if let Some(f) = self.on_success {
                    f();
                }
            }
            RitualOutcome::Failed { message } => {
                if let Some(f) = self.on_error {
                    f(message.clone());
                }
            }
        }
    }
}

enum Request {
    Retry(oneshot::Sender<Result<u32, RendezvousError>>),
    Dismiss(oneshot::Sender<Result<RitualOutcome, RendezvousError>>),
}

/// Handle to a running rendezvous.
pub struct RendezvousController {
    requests: mpsc::UnboundedSender<Request>,
    overlay: watch::Receiver<Overlay>,
    events: broadcast::Sender<Event>,
}

impl RendezvousController {
    /// Start the timeline and invoke `commit` concurrently.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin<C>(
        settings: RendezvousSettings,
        clock: C,
        commit: CommitFn,
        callbacks: RitualCallbacks,
    ) -> Self
    where
        C: Clock + 'static,
    {
        Self::begin_with_frames(settings, clock, commit, callbacks, DEFAULT_FRAME_INTERVAL)
    }

    /// Like [`begin`](Self::begin) with an explicit progress frame interval.
    pub fn begin_with_frames<C>(
        settings: RendezvousSettings,
        clock: C,
        commit: CommitFn,
        callbacks: RitualCallbacks,
        frame_interval: Duration,
    ) -> Self
    where
        C: Clock + 'static,
    {
        let now = clock.now_ms();
        let timeline_ms = settings.timeline_ms;
        let (state, attempt, initial_events) = Rendezvous::started(settings, now);

        let (requests, request_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (overlay_tx, overlay) = watch::channel(state.overlay(now));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        for event in initial_events {
            let _ = events.send(event);
        }

        let actor = Actor {
            state,
            clock,
            commit,
            requests: request_rx,
            results_tx,
            results_rx,
            overlay: overlay_tx,
            events: events.clone(),
            callbacks: Some(callbacks),
        };
        actor.launch_commit(attempt);
        tokio::spawn(actor.run(
            Instant::now() + Duration::from_millis(timeline_ms),
            frame_interval.max(Duration::from_millis(1)),
        ));

        Self {
            requests,
            overlay,
            events,
        }
    }

    /// Latest overlay.
    pub fn overlay(&self) -> Overlay {
        self.overlay.borrow().clone()
    }

    pub fn is_navigation_locked(&self) -> bool {
        self.overlay.borrow().navigation_locked
    }

    pub fn subscribe(&self) -> watch::Receiver<Overlay> {
        self.overlay.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Wait for the first terminal overlay.
    pub async fn settled(&self) -> Result<Overlay, RendezvousError> {
        let mut rx = self.overlay.clone();
        let overlay = rx
            .wait_for(|o| o.state.is_terminal())
            .await
            .map_err(|_| RendezvousError::ControllerGone)?;
        Ok(overlay.clone())
    }

    /// Re-invoke the commit after a failure. Returns the new attempt number.
    pub async fn retry(&self) -> Result<u32, RendezvousError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request::Retry(tx))
            .map_err(|_| RendezvousError::ControllerGone)?;
        rx.await.map_err(|_| RendezvousError::ControllerGone)?
    }

    /// Leave a terminal overlay, release the navigation lock and hand the
    /// outcome to the callbacks.
    pub async fn dismiss(&self) -> Result<RitualOutcome, RendezvousError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request::Dismiss(tx))
            .map_err(|_| RendezvousError::ControllerGone)?;
        rx.await.map_err(|_| RendezvousError::ControllerGone)?
    }
}

struct Actor<C: Clock> {
    state: Rendezvous,
    clock: C,
    commit: CommitFn,
    requests: mpsc::UnboundedReceiver<Request>,
    results_tx: mpsc::UnboundedSender<(u32, Result<(), CommitError>)>,
    results_rx: mpsc::UnboundedReceiver<(u32, Result<(), CommitError>)>,
    overlay: watch::Sender<Overlay>,
    events: broadcast::Sender<Event>,
    callbacks: Option<RitualCallbacks>,
}

impl<C: Clock> Actor<C> {
    async fn run(mut self, timeline_deadline: Instant, frame_interval: Duration) {
        let timeline_end = tokio::time::sleep_until(timeline_deadline);
        tokio::pin!(timeline_end);
        let mut frames = tokio::time::interval(frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let spinner_wait = self.state.spinner_due_in(self.clock.now_ms());

            tokio::select! {
                // Requests first: a dropped handle must stop the actor
                // before anything else is applied.
                biased;

                request = self.requests.recv() => {
                    match request {
                        Some(Request::Retry(reply)) => {
                            let result = self.retry();
                            let _ = reply.send(result);
                        }
                        Some(Request::Dismiss(reply)) => {
                            let now = self.clock.now_ms();
                            match self.state.dismiss(now) {
                                Ok((outcome, events)) => {
                                    self.publish(events);
                                    let _ = reply.send(Ok(outcome.clone()));
                                    if let Some(callbacks) = self.callbacks.take() {
                                        callbacks.deliver(&outcome);
                                    }
                                    break;
                                }
                                Err(err) => {
                                    let _ = reply.send(Err(err));
                                }
                            }
                        }
                        None => {
                            tracing::debug!("rendezvous handle dropped, stopping");
                            break;
                        }
                    }
                }
                Some((attempt, result)) = self.results_rx.recv() => {
                    let events = self.state.resolve_commit(attempt, result, self.clock.now_ms());
                    self.publish(events);
                }
                _ = &mut timeline_end, if !self.state.animation_complete() => {
                    let events = self.state.complete_timeline(self.clock.now_ms());
                    self.publish(events);
                }
                _ = frames.tick(), if !self.state.animation_complete() => {
                    self.state.advance_timeline(self.clock.now_ms());
                    self.publish(Vec::new());
                }
                _ = tokio::time::sleep(Duration::from_millis(spinner_wait.unwrap_or(0))), if spinner_wait.is_some() => {
                    self.publish(Vec::new());
                }
            }
        }
    }

    fn retry(&mut self) -> Result<u32, RendezvousError> {
        let (attempt, events) = self.state.retry(self.clock.now_ms())?;
        self.launch_commit(attempt);
        self.publish(events);
        Ok(attempt)
    }

    /// Invoke the commit without waiting for it.
    fn launch_commit(&self, attempt: u32) {
        let commit = self.commit.clone();
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            // The inner task turns a panicking commit into a JoinError.
            let result = match tokio::spawn(async move { commit().await }).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "commit task failed");
                    Err(CommitError::new(""))
                }
            };
            if results.send((attempt, result)).is_err() {
                tracing::debug!(attempt, "commit result dropped: controller gone");
            }
        });
    }

    fn publish(&self, events: Vec<Event>) {
        self.overlay
            .send_replace(self.state.overlay(self.clock.now_ms()));
        for event in events {
            let _ = self.events.send(event);
        }
    }
}
