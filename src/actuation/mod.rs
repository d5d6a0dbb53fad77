//! Fans the control intent out to the physical actuators.
//!
//! Policy: explicit user intent always wins; the status color (red while
//! running, yellow while idle) is only a fallback for when no light intent
//! is active. Audio transitions are edge-triggered so re-applying an
//! unchanged intent never restarts the sound.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::acquisition::{AcquisitionController, RunState};
use crate::audio::{resolve_audio, AmbientSound, AudioEngineHandle};
use crate::control::{ControlChannel, ControlIntent};
use crate::light::{scale_rgb, LightHandle, STATUS_IDLE_RGB, STATUS_RUNNING_RGB};

/// What the LED strip should show this instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    Rgb((u8, u8, u8)),
    Off,
}

/// Resolve the intent (plus the engine status for the fallback) to a light
/// command. Pure, so the policy is testable without an actuator.
pub fn desired_light(intent: &ControlIntent, status: RunState) -> LightCommand {
    if intent.light_on {
        if let Some(mode) = intent.ambient_mode() {
            return LightCommand::Rgb(scale_rgb(mode.rgb(), intent.brightness));
        }
    }
    match status {
        RunState::Running => LightCommand::Rgb(STATUS_RUNNING_RGB),
        RunState::Idle => LightCommand::Rgb(STATUS_IDLE_RGB),
        RunState::ShuttingDown => LightCommand::Off,
    }
}

/// Resolve the intent to a desired ambient sound, if any.
pub fn desired_audio(intent: &ControlIntent) -> Option<AmbientSound> {
    if !intent.audio_on {
        return None;
    }
    intent.audio_mode.as_deref().and_then(resolve_audio)
}

/// The actuator pair, shared by the actuation loop and the control API
/// (which applies intent synchronously instead of waiting a tick).
#[derive(Clone)]
pub struct Actuators {
    light: LightHandle,
    audio: AudioEngineHandle,
    playing: Arc<Mutex<Option<AmbientSound>>>,
}

impl Actuators {
    pub fn new(light: LightHandle, audio: AudioEngineHandle) -> Self {
        Self {
            light,
            audio,
            playing: Arc::new(Mutex::new(None)),
        }
    }

    /// Drive both actuators toward `intent`. Actuator errors are logged and
    /// swallowed; the caller's loop must not die over a flaky strip.
    pub fn apply(&self, intent: &ControlIntent, status: RunState) {
        match desired_light(intent, status) {
            LightCommand::Rgb(rgb) => {
                if let Err(err) = self.light.set_rgb(rgb) {
                    warn!("light actuator error: {err:#}");
                }
            }
            LightCommand::Off => {
                if let Err(err) = self.light.off() {
                    warn!("light actuator error: {err:#}");
                }
            }
        }

        let desired = desired_audio(intent);
        let mut playing = self.playing.lock().expect("audio state mutex poisoned");
        if *playing != desired {
            let result = match desired {
                Some(sound) => self.audio.play(sound),
                None => self.audio.stop(),
            };
            match result {
                Ok(()) => *playing = desired,
                Err(err) => warn!("audio actuator error: {err}"),
            }
        }
    }

    /// Force everything off. Used on shutdown.
    pub fn all_off(&self) {
        if let Err(err) = self.light.off() {
            warn!("light actuator error during shutdown: {err:#}");
        }
        if let Err(err) = self.audio.stop() {
            warn!("audio actuator error during shutdown: {err}");
        }
        *self.playing.lock().expect("audio state mutex poisoned") = None;
    }

    #[cfg(test)]
    pub fn playing(&self) -> Option<AmbientSound> {
        *self.playing.lock().unwrap()
    }
}

/// Poll the control channel and keep the actuators in sync until cancelled.
/// Errors reading the intent document are already absorbed by
/// [`ControlChannel::read_intent`].
pub async fn actuation_loop(
    control: ControlChannel,
    actuators: Actuators,
    acquisition: AcquisitionController,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let intent = control.read_intent();
                let status = acquisition.status().await;
                actuators.apply(&intent, status);
            }
            _ = cancel.cancelled() => {
                debug!("actuation loop shutting down");
                break;
            }
        }
    }
}
