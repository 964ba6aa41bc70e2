//! Release ceremony scenarios through the public API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use ritual_core::clock::TokioClock;
use ritual_core::{
    commit_fn, CommitError, Config, Event, OverlayState, RendezvousController, RendezvousError,
    RendezvousSettings, RitualCallbacks, RitualOutcome,
};
use tokio::time::Instant;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn settings(timeline_ms: u64) -> RendezvousSettings {
    RendezvousSettings {
        timeline_ms,
        ..RendezvousSettings::default()
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn success_waits_for_full_timeline() {
    let controller = RendezvousController::begin(
        settings(4_500),
        TokioClock::anchored_at(0),
        commit_fn(|| async { Ok::<(), CommitError>(()) }),
        RitualCallbacks::default(),
    );
    let mut events = controller.subscribe_events();
    let started = Instant::now();

    let overlay = controller.settled().await.unwrap();
    assert_eq!(started.elapsed(), ms(4_500));
    assert_eq!(overlay.state, OverlayState::Success);
    assert!(overlay.navigation_locked);

    let seen = drain(&mut events);
    let settled: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, Event::Settled { .. }))
        .collect();
    assert_eq!(settled.len(), 1);
    assert!(!seen.iter().any(|e| matches!(
        e,
        Event::OverlayChanged {
            to: OverlayState::Syncing,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn blank_failure_uses_generic_message() {
    let controller = RendezvousController::begin(
        settings(1_000),
        TokioClock::anchored_at(0),
        commit_fn(|| async { Err::<(), _>(CommitError::new("")) }),
        RitualCallbacks::default(),
    );
    let overlay = controller.settled().await.unwrap();
    assert_eq!(overlay.state, OverlayState::Error);
    assert_eq!(
        overlay.error_message.as_deref(),
        Some("Something went wrong. Please try again.")
    );
    assert_eq!(
        controller.dismiss().await,
        Ok(RitualOutcome::Failed {
            message: "Something went wrong. Please try again.".into()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn retry_is_rejected_outside_error() {
    let controller = RendezvousController::begin(
        settings(1_000),
        TokioClock::anchored_at(0),
        commit_fn(|| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<(), CommitError>(())
        }),
        RitualCallbacks::default(),
    );
    assert_eq!(
        controller.retry().await,
        Err(RendezvousError::RetryNotAllowed {
            state: OverlayState::Animating
        })
    );
    controller.settled().await.unwrap();
    assert_eq!(
        controller.retry().await,
        Err(RendezvousError::RetryNotAllowed {
            state: OverlayState::Success
        })
    );
}

#[tokio::test(start_paused = true)]
async fn at_most_one_commit_in_flight() {
    let in_flight = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    let calls = Arc::new(AtomicU32::new(0));
    let commit = {
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        let calls = calls.clone();
        commit_fn(move || {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(300)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                if call < 2 {
                    Err(CommitError::new("still offline"))
                } else {
                    Ok(())
                }
            }
        })
    };
    let controller = RendezvousController::begin(
        settings(500),
        TokioClock::anchored_at(0),
        commit,
        RitualCallbacks::default(),
    );
    let mut overlays = controller.subscribe();

    for expected_attempt in 2..=3 {
        overlays
            .wait_for(|o| o.state == OverlayState::Error)
            .await
            .unwrap();
        let (first, second, third) =
            tokio::join!(controller.retry(), controller.retry(), controller.retry());
        let results = [first, second, third];
        assert_eq!(
            results.iter().filter(|r| **r == Ok(expected_attempt)).count(),
            1
        );
        assert_eq!(
            results
                .iter()
                .filter(|r| **r == Err(RendezvousError::CommitInFlight))
                .count(),
            2
        );
    }

    let overlay = overlays
        .wait_for(|o| o.state == OverlayState::Success)
        .await
        .unwrap()
        .clone();
    assert_eq!(overlay.attempt, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn config_reduced_motion_drives_short_timeline() {
    let mut config = Config::default();
    config.reduced_motion = true;
    let controller = RendezvousController::begin_with_frames(
        config.rendezvous_settings(false),
        TokioClock::anchored_at(0),
        commit_fn(|| async { Ok::<(), CommitError>(()) }),
        RitualCallbacks::default(),
        config.frame_interval(),
    );
    let started = Instant::now();
    controller.settled().await.unwrap();
    assert_eq!(started.elapsed(), ms(100));
}

#[tokio::test(start_paused = true)]
async fn dropped_controller_reports_gone_to_waiters() {
    let controller = RendezvousController::begin(
        settings(1_000),
        TokioClock::anchored_at(0),
        commit_fn(|| async {
            tokio::time::sleep(Duration::from_millis(60_000)).await;
            Ok::<(), CommitError>(())
        }),
        RitualCallbacks::default(),
    );
    let mut overlays = controller.subscribe();
    drop(controller);
    let result = overlays.wait_for(|o| o.state.is_terminal()).await;
    assert!(result.is_err());
}

/// Drive one rendezvous to its terminal state on a fresh paused runtime.
/// Returns (elapsed ms, terminal state, saw syncing, settled events).
fn run_case(timeline_ms: u64, delay_ms: u64, succeed: bool) -> (u64, OverlayState, bool, usize) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async move {
        let controller = RendezvousController::begin(
            settings(timeline_ms),
            TokioClock::anchored_at(0),
            commit_fn(move || async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                if succeed {
                    Ok(())
                } else {
                    Err(CommitError::new("rejected"))
                }
            }),
            RitualCallbacks::default(),
        );
        let mut events = controller.subscribe_events();
        let started = Instant::now();
        let overlay = controller.settled().await.unwrap();
        let elapsed = started.elapsed().as_millis() as u64;

        // Let anything else queued at this instant land.
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let seen = drain(&mut events);
        let saw_syncing = seen.iter().any(|e| {
            matches!(
                e,
                Event::OverlayChanged {
                    to: OverlayState::Syncing,
                    ..
                }
            )
        });
        let settled = seen
            .iter()
            .filter(|e| matches!(e, Event::Settled { .. }))
            .count();
        (elapsed, overlay.state, saw_syncing, settled)
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    #[test]
    fn outcome_is_order_independent(
        timeline_ms in 100u64..6_000,
        delay_ms in 0u64..8_000,
        succeed in any::<bool>(),
    ) {
        let (elapsed, state, saw_syncing, settled) = run_case(timeline_ms, delay_ms, succeed);

        let expected = if succeed { OverlayState::Success } else { OverlayState::Error };
        prop_assert_eq!(state, expected);
        prop_assert_eq!(settled, 1);
        prop_assert_eq!(elapsed, timeline_ms.max(delay_ms));
        if delay_ms < timeline_ms {
            prop_assert!(!saw_syncing);
        }
        if delay_ms > timeline_ms {
            prop_assert!(saw_syncing);
        }
    }
}
