use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use log::info;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::notify::Notifier;
use crate::sensing::SensorReader;
use crate::settings::Settings;
use crate::vitals::{LiveFile, SessionLog, VitalsStore};

use super::loop_worker::{acquisition_loop, finalize_session, LoopCtx};
use super::state::{AcquisitionState, RunState};

/// Owns the acquisition state machine and the lifetime of the loop task.
///
/// Cloneable handle: the HTTP layer, the gesture worker, and the shutdown
/// path all hold one. Exactly one loop task exists while Running.
#[derive(Clone)]
pub struct AcquisitionController {
    state: Arc<Mutex<AcquisitionState>>,
    reader: Arc<Mutex<SensorReader>>,
    store: VitalsStore,
    notifier: Notifier,
    settings: Arc<Settings>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel: Arc<Mutex<Option<CancellationToken>>>,
}

impl AcquisitionController {
    pub fn new(
        reader: SensorReader,
        store: VitalsStore,
        notifier: Notifier,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(AcquisitionState::new())),
            reader: Arc::new(Mutex::new(reader)),
            store,
            notifier,
            settings,
            worker: Arc::new(Mutex::new(None)),
            cancel: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn status(&self) -> RunState {
        self.state.lock().await.status
    }

    /// Idle → Running: open the session logs, announce the session, spawn
    /// the loop.
    pub async fn start_session(&self) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let started_at = Local::now();

        {
            let state = self.state.lock().await;
            match state.status {
                RunState::Idle => {}
                RunState::Running => bail!("acquisition already running"),
                RunState::ShuttingDown => bail!("acquisition is shutting down"),
            }
        }

        let rolling_path = self.settings.data_dir.join("data_live.csv");
        let log = SessionLog::open(&self.settings.data_dir, &rolling_path, started_at)
            .context("failed to open session logs")?;
        info!(
            "session {} started, logging to {}",
            session_id,
            log.session_path().display()
        );

        {
            let mut state = self.state.lock().await;
            state.begin_session(session_id.clone(), started_at);
        }
        self.notifier
            .send_background("Starting new vitals monitoring session");

        let cancel = CancellationToken::new();
        let ctx = LoopCtx {
            state: self.state.clone(),
            reader: self.reader.clone(),
            store: self.store.clone(),
            log,
            live: LiveFile::new(self.settings.live_vitals_path.clone()),
            stop_marker: self.settings.stop_marker_path.clone(),
            period: self.settings.acquire_interval(),
            notifier: self.notifier.clone(),
        };
        let handle = tokio::spawn(acquisition_loop(ctx, cancel.clone()));

        let mut worker_guard = self.worker.lock().await;
        if let Some(stale) = worker_guard.take() {
            // Leftover handle from a session that ended via the stop marker.
            stale.abort();
        }
        *worker_guard = Some(handle);
        *self.cancel.lock().await = Some(cancel);

        Ok(session_id)
    }

    /// Running → Idle: cancel the loop, wait for it to drain, announce the
    /// end of the session.
    pub async fn end_session(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.status != RunState::Running {
                bail!("no active session to end");
            }
        }

        self.stop_worker().await?;
        finalize_session(&self.state, &self.notifier).await;
        Ok(())
    }

    /// Any state → ShuttingDown. Cancels the loop if one is running and
    /// closes the logs via drop. Irreversible.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop_worker().await?;
        finalize_session(&self.state, &self.notifier).await;
        self.state.lock().await.shutdown();
        Ok(())
    }

    async fn stop_worker(&self) -> Result<()> {
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.worker.lock().await.take() {
            handle
                .await
                .context("acquisition loop task failed to join")?;
        }
        Ok(())
    }
}
