pub mod acquisition;
pub mod actuation;
pub mod api;
pub mod audio;
pub mod control;
pub mod gesture;
pub mod light;
pub mod notify;
pub mod sensing;
pub mod settings;
pub mod utils;
pub mod vitals;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use acquisition::AcquisitionController;
use actuation::Actuators;
use api::ApiState;
use audio::AudioEngineHandle;
use control::ControlChannel;
use light::{LightHandle, LoggingLight};
use notify::Notifier;
use sensing::environment::EnvHandle;
use sensing::{EnvSensor, SensorReader, VitalSource};
use settings::Settings;
use vitals::VitalsStore;

/// Bring the whole backend up and run until a termination signal:
/// environmental worker, actuation loop, gesture worker (with hardware),
/// the HTTP API, and the acquisition controller awaiting its start signal.
pub async fn run(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    let notifier = Notifier::new(settings.telegram.clone());
    notifier.send_background("Vital signs monitor is starting up");

    let store = VitalsStore::new();
    let env = EnvHandle::new();
    let control = ControlChannel::new(settings.selection_path.clone());
    let actuators = Actuators::new(open_light(), AudioEngineHandle::new());

    let reader = SensorReader::new(open_radar(&settings), env.clone());
    let acquisition = AcquisitionController::new(
        reader,
        store.clone(),
        notifier.clone(),
        settings.clone(),
    );

    let workers = CancellationToken::new();

    if let Some(sensor) = open_env_sensor() {
        tokio::spawn(sensing::environment::environment_worker(
            sensor,
            env.clone(),
            settings.env_interval(),
            workers.clone(),
        ));
    }

    tokio::spawn(actuation::actuation_loop(
        control.clone(),
        actuators.clone(),
        acquisition.clone(),
        settings.actuate_interval(),
        workers.clone(),
    ));

    if let Some(source) = open_gesture_source() {
        tokio::spawn(gesture::gesture_worker(
            source,
            acquisition.clone(),
            workers.clone(),
        ));
    }

    if settings.autostart {
        if let Err(err) = acquisition.start_session().await {
            error!("autostart failed: {err:#}");
        }
    }

    let api_state = Arc::new(ApiState {
        store,
        control,
        actuators: actuators.clone(),
        acquisition: acquisition.clone(),
    });
    let listener = tokio::net::TcpListener::bind(settings.api_addr)
        .await
        .with_context(|| format!("failed to bind API address {}", settings.api_addr))?;
    info!("control API listening on http://{}", settings.api_addr);

    axum::serve(listener, api::router(api_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    // Termination signal received: stop the loops, park the actuators,
    // close the logs, say goodbye. Best-effort by design; a hard kill can
    // still lose the final unflushed sample.
    info!("shutting down");
    workers.cancel();
    if let Err(err) = acquisition.shutdown().await {
        warn!("acquisition shutdown incomplete: {err:#}");
    }
    actuators.all_off();
    notifier.send("Vital signs monitor shutdown complete").await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!("failed to install SIGTERM handler: {err}"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(feature = "hardware")]
fn open_radar(settings: &Settings) -> Option<Box<dyn VitalSource>> {
    match sensing::radar::UartRadar::open(&settings.radar_device) {
        Ok(radar) => Some(Box::new(radar)),
        Err(err) => {
            warn!("radar not available ({err}), using synthetic vitals");
            None
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn open_radar(_settings: &Settings) -> Option<Box<dyn VitalSource>> {
    None
}

#[cfg(feature = "hardware")]
fn open_env_sensor() -> Option<Box<dyn EnvSensor>> {
    match sensing::environment::Bme280::open() {
        Ok(sensor) => Some(Box::new(sensor)),
        Err(err) => {
            warn!("environment sensor not available: {err}");
            None
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn open_env_sensor() -> Option<Box<dyn EnvSensor>> {
    None
}

#[cfg(feature = "hardware")]
fn open_light() -> LightHandle {
    match light::Ws2812Strip::open() {
        Ok(strip) => Arc::new(strip),
        Err(err) => {
            warn!("LED strip not available ({err:#}), lights will be logged only");
            Arc::new(LoggingLight)
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn open_light() -> LightHandle {
    Arc::new(LoggingLight)
}

#[cfg(feature = "hardware")]
fn open_gesture_source() -> Option<Box<dyn gesture::GestureSource>> {
    match gesture::Apds9960::open() {
        Ok(sensor) => Some(Box::new(sensor)),
        Err(err) => {
            warn!("gesture sensor not available: {err}");
            None
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn open_gesture_source() -> Option<Box<dyn gesture::GestureSource>> {
    None
}
