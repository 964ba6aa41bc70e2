//! # Ritual Core Library
//!
//! This library provides the timing core of the Ritual focus app: a
//! countdown that survives pause/resume without drift, and the release
//! ceremony that races a fixed animation against an asynchronous commit.
//! The `ritual-cli` binary is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Countdown Engine**: A wall-clock-based state machine that requires the
//!   caller to periodically invoke `tick()`; [`CountdownTimer`] drives it on a
//!   tokio interval
//! - **Rendezvous**: A pure reconciler over (animation complete, commit status)
//!   plus an actor task that owns the timeline, commit attempts and the
//!   navigation lock
//! - **Particles**: Deterministic, seeded particle field for the ceremony
//! - **Config**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`CountdownEngine`]: Core countdown state machine
//! - [`RendezvousController`]: Release ceremony driver
//! - [`Config`]: Application configuration management
//! - [`Clock`]: Time source seam shared by both engines

pub mod clock;
pub mod config;
pub mod countdown;
pub mod error;
pub mod events;
pub mod particles;
pub mod rendezvous;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::Config;
pub use countdown::{CountdownEngine, CountdownSnapshot, CountdownTimer, SessionStatus};
pub use error::{CommitError, ConfigError, CoreError, RendezvousError};
pub use events::Event;
pub use particles::{Particle, ParticleField, ParticleSpec};
pub use rendezvous::{
    commit_fn, CommitStatus, Overlay, OverlayState, Rendezvous, RendezvousController,
    RendezvousSettings, RitualCallbacks, RitualOutcome,
};
