use std::time::Duration;

use clap::Args;
use ritual_core::{Config, CountdownTimer, Event, SystemClock};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use super::emit;

#[derive(Args)]
pub struct FocusArgs {
    /// Session length in seconds (defaults to countdown.default_duration_secs)
    #[arg(long)]
    secs: Option<u64>,
    /// Pause this many seconds into the session
    #[arg(long, requires = "pause_for")]
    pause_at: Option<u64>,
    /// How long to stay paused, in seconds
    #[arg(long, requires = "pause_at")]
    pause_for: Option<u64>,
}

pub async fn run(args: FocusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let secs = args.secs.unwrap_or(config.countdown.default_duration_secs);
    if secs == 0 {
        return Err("session length must be at least one second".into());
    }

    let duration_ms = secs.saturating_mul(1_000);
    let timer = CountdownTimer::spawn(SystemClock, duration_ms, config.tick_interval(), |_| {})
        .ok_or("countdown did not start")?;
    let mut events = timer.subscribe_events();
    emit(&timer.snapshot())?;

    let started = Instant::now();
    let mut pause_plan = match (args.pause_at, args.pause_for) {
        (Some(at), Some(length)) => Some((
            started + Duration::from_secs(at),
            Duration::from_secs(length),
        )),
        _ => None,
    };

    loop {
        let pause_at = pause_plan.map(|(at, _)| at);
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    emit(&event)?;
                    if matches!(event, Event::CountdownCompleted { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "focus output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::time::sleep_until(pause_at.unwrap_or(started)), if pause_at.is_some() => {
                if let Some((_, length)) = pause_plan.take() {
                    timer.pause();
                    tokio::time::sleep(length).await;
                    timer.resume();
                }
            }
        }
    }

    emit(&timer.snapshot())?;
    timer.shutdown().await;
    Ok(())
}
