use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use ritual_core::{
    commit_fn, CommitError, Config, Event, OverlayState, RendezvousController, RitualCallbacks,
    RitualOutcome, SystemClock,
};
use tokio::sync::broadcast;

use super::emit;

#[derive(Args)]
pub struct ReleaseArgs {
    /// How long the simulated commit takes, in milliseconds
    #[arg(long, default_value = "1500")]
    commit_ms: u64,
    /// Fail the first commit attempt with this message
    #[arg(long)]
    fail: Option<String>,
    /// Retry once after a failure
    #[arg(long)]
    retry: bool,
    /// Use the reduced-motion timeline
    #[arg(long)]
    reduced_motion: bool,
}

pub async fn run(args: ReleaseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let settings = config.rendezvous_settings(args.reduced_motion);

    let calls = Arc::new(AtomicU32::new(0));
    let commit_ms = args.commit_ms;
    let failure = args.fail;
    let commit = commit_fn(move || {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        let failure = failure.clone().filter(|_| call == 0);
        async move {
            tokio::time::sleep(Duration::from_millis(commit_ms)).await;
            match failure {
                Some(message) => Err(CommitError::new(message)),
                None => Ok(()),
            }
        }
    });

    let controller = RendezvousController::begin_with_frames(
        settings,
        SystemClock,
        commit,
        RitualCallbacks::default(),
        config.frame_interval(),
    );
    let mut events = controller.subscribe_events();

    let mut overlay = controller.settled().await?;
    drain(&mut events)?;

    if overlay.state == OverlayState::Error && args.retry {
        controller.retry().await?;
        overlay = controller
            .subscribe()
            .wait_for(|o| o.state.is_terminal())
            .await?
            .clone();
        drain(&mut events)?;
    }

    let outcome = controller.dismiss().await?;
    drain(&mut events)?;
    emit(&overlay)?;

    match outcome {
        RitualOutcome::Succeeded => Ok(()),
        RitualOutcome::Failed { message } => Err(format!("release failed: {message}").into()),
    }
}

fn drain(events: &mut broadcast::Receiver<Event>) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        match events.try_recv() {
            Ok(event) => emit(&event)?,
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "release output fell behind");
            }
            Err(_) => return Ok(()),
        }
    }
}
