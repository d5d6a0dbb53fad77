//! Ambient audio actuator.
//!
//! Mode resolution is pure and always available; actual playback lives on a
//! dedicated thread behind the `audio` feature because the rodio output
//! stream is not `Send` and the device may simply not exist on a headless
//! build.

#[cfg(feature = "audio")]
mod sources;

/// A resolvable ambient sound. Binaural presets carry their two channel
/// frequencies in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmbientSound {
    Binaural { left_hz: f32, right_hz: f32 },
    BrownNoise,
    Rain,
}

/// Resolve a user-facing audio mode name. Unknown names mean "no audio".
pub fn resolve_audio(name: &str) -> Option<AmbientSound> {
    match name.trim().to_ascii_lowercase().as_str() {
        "rain" => Some(AmbientSound::Rain),
        "brown" | "brown_noise" | "brown noise" => Some(AmbientSound::BrownNoise),
        // Binaural presets named for the brainwave band they target.
        "delta" => Some(AmbientSound::Binaural {
            left_hz: 200.0,
            right_hz: 203.0,
        }),
        "theta" => Some(AmbientSound::Binaural {
            left_hz: 200.0,
            right_hz: 206.0,
        }),
        "alpha" => Some(AmbientSound::Binaural {
            left_hz: 200.0,
            right_hz: 210.0,
        }),
        _ => None,
    }
}

#[cfg(feature = "audio")]
pub use engine::AudioEngineHandle;

#[cfg(feature = "audio")]
mod engine {
    use std::sync::mpsc::{self, Sender};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use rodio::{OutputStream, Sink};

    use super::sources::{BinauralTone, BrownNoise, RainNoise};
    use super::AmbientSound;

    enum AudioCommand {
        Play(AmbientSound),
        Stop,
    }

    /// Handle to the audio thread. Cloneable; all clones feed one sink.
    #[derive(Clone)]
    pub struct AudioEngineHandle {
        tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    }

    impl AudioEngineHandle {
        pub fn new() -> Self {
            Self {
                tx: Arc::new(Mutex::new(None)),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
            if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<AudioCommand>();

            // Dedicated thread owning the non-Send output stream and sink.
            thread::Builder::new()
                .name("audio-engine".to_string())
                .spawn(move || {
                    let mut _stream: Option<OutputStream> = None;
                    let mut sink: Option<Sink> = None;

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            AudioCommand::Play(sound) => {
                                if let Some(old) = sink.take() {
                                    old.stop();
                                }
                                _stream = None;
                                match OutputStream::try_default() {
                                    Ok((stream, handle)) => match Sink::try_new(&handle) {
                                        Ok(new_sink) => {
                                            match sound {
                                                AmbientSound::Binaural { left_hz, right_hz } => {
                                                    new_sink.append(BinauralTone::new(
                                                        left_hz, right_hz,
                                                    ))
                                                }
                                                AmbientSound::BrownNoise => {
                                                    new_sink.append(BrownNoise::new())
                                                }
                                                AmbientSound::Rain => {
                                                    new_sink.append(RainNoise::new())
                                                }
                                            }
                                            new_sink.play();
                                            _stream = Some(stream);
                                            sink = Some(new_sink);
                                        }
                                        Err(err) => {
                                            log::error!("failed to create audio sink: {err}")
                                        }
                                    },
                                    Err(err) => {
                                        log::error!("failed to open audio output: {err}")
                                    }
                                }
                            }
                            AudioCommand::Stop => {
                                if let Some(old) = sink.take() {
                                    old.stop();
                                }
                                _stream = None;
                            }
                        }
                    }
                })
                .map_err(|e| e.to_string())?;

            let tx_clone = tx.clone();
            *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
            Ok(tx_clone)
        }

        pub fn play(&self, sound: AmbientSound) -> Result<(), String> {
            let tx = self.ensure_thread()?;
            tx.send(AudioCommand::Play(sound)).map_err(|e| e.to_string())
        }

        pub fn stop(&self) -> Result<(), String> {
            if let Ok(Some(tx)) = self.tx.lock().map(|guard| guard.clone()) {
                let _ = tx.send(AudioCommand::Stop);
            }
            Ok(())
        }
    }

    impl Default for AudioEngineHandle {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(not(feature = "audio"))]
pub use stub::AudioEngineHandle;

#[cfg(not(feature = "audio"))]
mod stub {
    use super::AmbientSound;
    use log::debug;

    /// No-op audio engine used when the `audio` feature is disabled.
    #[derive(Clone, Default)]
    pub struct AudioEngineHandle;

    impl AudioEngineHandle {
        pub fn new() -> Self {
            Self
        }

        pub fn play(&self, sound: AmbientSound) -> Result<(), String> {
            debug!("audio disabled at build time, ignoring play of {sound:?}");
            Ok(())
        }

        pub fn stop(&self) -> Result<(), String> {
            Ok(())
        }
    }
}
