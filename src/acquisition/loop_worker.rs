use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::notify::Notifier;
use crate::sensing::SensorReader;
use crate::vitals::{HrWindow, LiveFile, SessionLog, SleepState, VitalsStore};

use super::state::AcquisitionState;

// Set to false to silence per-cycle logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub(super) struct LoopCtx {
    pub state: Arc<Mutex<AcquisitionState>>,
    pub reader: Arc<Mutex<SensorReader>>,
    pub store: VitalsStore,
    pub log: SessionLog,
    pub live: LiveFile,
    pub stop_marker: PathBuf,
    pub period: Duration,
    pub notifier: Notifier,
}

/// Move a Running session to Idle and announce it. Safe to call from both
/// the controller and the loop: only the caller that actually performs the
/// transition sends the notification.
pub(super) async fn finalize_session(
    state: &Arc<Mutex<AcquisitionState>>,
    notifier: &Notifier,
) {
    let ended = state.lock().await.end_session();
    if let Some(session_id) = ended {
        log_info!("session {session_id} ended");
        notifier.send_background("Vitals monitoring session ended");
    }
}

/// The Running-state loop: one sensor poll every tick, fanned out to the
/// latest-sample slot, the durable logs, and the live readout.
pub(super) async fn acquisition_loop(mut ctx: LoopCtx, cancel: CancellationToken) {
    let mut ticker = interval(ctx.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut window = HrWindow::default();
    let mut last_label: Option<SleepState> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if stop_requested(&ctx.stop_marker) {
                    finalize_session(&ctx.state, &ctx.notifier).await;
                    break;
                }
                run_cycle(&mut ctx, &mut window, &mut last_label).await;
            }
            _ = cancel.cancelled() => {
                log_info!("acquisition loop shutting down");
                break;
            }
        }
    }
    // Dropping ctx.log here closes the session files.
}

/// Check for the external stop sentinel and consume it when present, so the
/// next session does not trip over a stale marker.
fn stop_requested(marker: &Path) -> bool {
    if !marker.exists() {
        return false;
    }
    log_info!("stop marker found at {}", marker.display());
    if let Err(err) = std::fs::remove_file(marker) {
        log_warn!("could not consume stop marker: {err}");
    }
    true
}

async fn run_cycle(
    ctx: &mut LoopCtx,
    window: &mut HrWindow,
    last_label: &mut Option<SleepState>,
) {
    let sample = ctx.reader.lock().await.poll().await;

    ctx.store.update(sample.clone()).await;

    // A failed write skips this cycle's row; the loop itself never stops
    // over transient I/O.
    if let Err(err) = ctx.log.append(&sample) {
        log_error!("session log write failed, skipping cycle: {err:#}");
    }
    if let Err(err) = ctx.live.publish(&sample) {
        log_error!("live readout write failed: {err:#}");
    }

    window.push(sample.heart_rate);
    if let Some(label) = window.classify() {
        if *last_label != Some(label) {
            log_info!("sleep state now {label:?} (avg over last window)");
            *last_label = Some(label);
        }
    }

    let mut state = ctx.state.lock().await;
    state.samples += 1;
    if state.samples % 30 == 0 {
        log_info!(
            "session {}: {} samples, latest hr {:.1} br {:.1}",
            state.session_id.as_deref().unwrap_or("?"),
            state.samples,
            sample.heart_rate,
            sample.breathing_rate
        );
    }
}
