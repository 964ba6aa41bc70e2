mod controller;
mod state;

pub use controller::{commit_fn, CommitFn, CommitFuture, RendezvousController, RitualCallbacks};
pub use state::{
    resolve_overlay, CommitAttempt, CommitStatus, Overlay, OverlayState, Rendezvous,
    RendezvousSettings, RitualOutcome, Timeline,
};
