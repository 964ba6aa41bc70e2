//! Async driver for [`CountdownEngine`].
//!
//! Owns the engine inside a tokio task, calls `tick()` on a fixed interval
//! and publishes snapshots on a `watch` channel. Presentation code only
//! talks to the [`CountdownTimer`] handle; dropping the handle tears the
//! task down and no update is applied afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::engine::{CountdownEngine, CountdownSnapshot};
use crate::clock::Clock;
use crate::events::Event;

/// Invoked once per session when it completes.
pub type CompletionCallback = Arc<dyn Fn(CountdownSnapshot) + Send + Sync>;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
enum Command {
    Pause,
    Resume,
    Reset(u64),
    Finish,
    Shutdown,
}

/// Handle to a running countdown task.
pub struct CountdownTimer {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<CountdownSnapshot>,
    events: broadcast::Sender<Event>,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    /// Start a session and spawn the task driving it.
    ///
    /// Returns `None` when `duration_ms` is zero. Must be called from
    /// within a tokio runtime.
    pub fn spawn<C, F>(
        clock: C,
        duration_ms: u64,
        tick_interval: Duration,
        on_complete: F,
    ) -> Option<Self>
    where
        C: Clock + 'static,
        F: Fn(CountdownSnapshot) + Send + Sync + 'static,
    {
        let mut engine = CountdownEngine::new(clock);
        let started = engine.start(duration_ms)?;
        let initial = engine.snapshot()?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let _ = events.send(started);

        let driver = Driver {
            engine,
            commands: command_rx,
            snapshots: snapshot_tx,
            events: events.clone(),
            on_complete: Arc::new(on_complete),
            tick_interval: tick_interval.max(Duration::from_millis(1)),
        };
        let task = tokio::spawn(driver.run());

        Some(Self {
            commands,
            snapshots,
            events,
            task,
        })
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    /// Replace the session with a fresh one of `duration_ms`.
    pub fn reset(&self, duration_ms: u64) {
        self.send(Command::Reset(duration_ms));
    }

    /// Complete the session now.
    pub fn finish(&self) {
        self.send(Command::Finish);
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> CountdownSnapshot {
        *self.snapshots.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Cancel the session and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }

    fn send(&self, command: Command) {
        // A closed channel means the task is gone; the command is moot.
        if self.commands.send(command).is_err() {
            tracing::debug!("countdown command dropped: task has exited");
        }
    }
}

struct Driver<C: Clock> {
    engine: CountdownEngine<C>,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<CountdownSnapshot>,
    events: broadcast::Sender<Event>,
    on_complete: CompletionCallback,
    tick_interval: Duration,
}

impl<C: Clock> Driver<C> {
    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // Commands first: a closed channel must win over a ready tick.
                biased;

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("countdown handle dropped, stopping");
                        break;
                    };
                    let event = match command {
                        Command::Pause => self.engine.pause(),
                        Command::Resume => {
                            interval.reset();
                            self.engine.resume()
                        }
                        Command::Reset(duration_ms) => {
                            interval.reset();
                            self.engine.reset(duration_ms)
                        }
                        Command::Finish => self.engine.finish(),
                        Command::Shutdown => {
                            if let Some(event) = self.engine.cancel() {
                                let _ = self.events.send(event);
                            }
                            break;
                        }
                    };
                    self.publish(event);
                }
                _ = interval.tick(), if self.engine.is_running() => {
                    let event = self.engine.tick();
                    self.publish(event);
                }
            }
        }
    }

    fn publish(&self, event: Option<Event>) {
        let Some(event) = event else {
            return;
        };
        let Some(snapshot) = self.engine.snapshot() else {
            return;
        };
        self.snapshots.send_replace(snapshot);
        let completed = matches!(event, Event::CountdownCompleted { .. });
        let _ = self.events.send(event);
        if completed {
            (self.on_complete)(snapshot);
        }
    }
}
