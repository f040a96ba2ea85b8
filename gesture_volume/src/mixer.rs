//! OS master-volume control.
//!
//! Each backend reports the level range its endpoint accepts, in its own
//! units, and the pipeline maps pinch distance straight onto that range:
//!
//! | Backend | Platform | Units |
//! |---|---|---|
//! | [`AlsaMixer`] | Linux | raw playback steps of a simple element |
//! | `EndpointMixer` | Windows | dB of the default render endpoint |
//! | [`NullMixer`] | any | 0–100, discards every level |

use pinch_map::VolumeRange;

use crate::config::AppConfig;
use crate::error::MixerError;

// ════════════════════════════════════════════════════════════════════════════
// VolumeControl: abstraction over OS backends / null (for testing)
// ════════════════════════════════════════════════════════════════════════════

pub trait VolumeControl {
    /// Human-readable endpoint name for logs.
    fn name(&self) -> &str;

    /// Level range accepted by [`apply`](Self::apply).
    fn range(&self) -> VolumeRange;

    /// Push `level` to the device. `level` is already inside `range()`.
    fn apply(&mut self, level: f64) -> Result<(), MixerError>;

    /// Clamp `level` to `range()` and apply it. Returns the level applied.
    fn set_level(&mut self, level: f64) -> Result<f64, MixerError> {
        let level = self.range().clamp(level);
        self.apply(level)?;
        Ok(level)
    }
}

// ── null backend (used when no mixer is available) ────────────────────────

#[derive(Debug, Default)]
pub struct NullMixer {
    last: Option<f64>,
}

impl NullMixer {
    pub fn last_level(&self) -> Option<f64> { self.last }
}

impl VolumeControl for NullMixer {
    fn name(&self) -> &str { "null" }
    fn range(&self) -> VolumeRange { VolumeRange::percent() }
    fn apply(&mut self, level: f64) -> Result<(), MixerError> {
        self.last = Some(level);
        Ok(())
    }
}

// ── ALSA backend ──────────────────────────────────────────────────────────

#[cfg(target_os = "linux")]
pub use alsa_backend::AlsaMixer;

#[cfg(target_os = "linux")]
mod alsa_backend {
    use alsa::mixer::{Mixer, SelemId};
    use pinch_map::VolumeRange;

    use super::VolumeControl;
    use crate::error::MixerError;

    /// Playback volume of one ALSA simple mixer element.
    pub struct AlsaMixer {
        mixer:   Mixer,
        control: String,
        label:   String,
        range:   VolumeRange,
    }

    impl AlsaMixer {
        pub fn open(card: &str, control: &str) -> Result<Self, MixerError> {
            let mixer = Mixer::new(card, false)
                .map_err(|e| MixerError::Unavailable(format!("card {}: {}", card, e)))?;

            let range = {
                let selem = mixer
                    .find_selem(&SelemId::new(control, 0))
                    .ok_or_else(|| MixerError::Unavailable(format!("no control {:?} on {}", control, card)))?;
                if !selem.has_playback_volume() {
                    return Err(MixerError::Unavailable(format!("{:?} has no playback volume", control)));
                }
                let (min, max) = selem.get_playback_volume_range();
                VolumeRange::new(min as f64, max as f64)
            };

            Ok(AlsaMixer {
                mixer,
                control: control.to_string(),
                label:   format!("alsa:{}/{}", card, control),
                range,
            })
        }
    }

    impl VolumeControl for AlsaMixer {
        fn name(&self) -> &str { &self.label }
        fn range(&self) -> VolumeRange { self.range }

        fn apply(&mut self, level: f64) -> Result<(), MixerError> {
            let selem = self.mixer
                .find_selem(&SelemId::new(&self.control, 0))
                .ok_or_else(|| MixerError::SetLevel(format!("control {:?} disappeared", self.control)))?;
            selem
                .set_playback_volume_all(level.round() as i64)
                .map_err(|e| MixerError::SetLevel(e.to_string()))
        }
    }
}

// ── Windows endpoint backend ──────────────────────────────────────────────

#[cfg(windows)]
pub use endpoint_backend::EndpointMixer;

#[cfg(windows)]
mod endpoint_backend {
    use pinch_map::VolumeRange;
    use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
    use windows::Win32::Media::Audio::{eConsole, eRender, IMMDeviceEnumerator, MMDeviceEnumerator};
    use windows::Win32::System::Com::{CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED};

    use super::VolumeControl;
    use crate::error::MixerError;

    fn unavailable(e: windows::core::Error) -> MixerError {
        MixerError::Unavailable(e.to_string())
    }

    /// Master volume of the default render endpoint, in dB.
    pub struct EndpointMixer {
        endpoint: IAudioEndpointVolume,
        range:    VolumeRange,
    }

    impl EndpointMixer {
        pub fn open() -> Result<Self, MixerError> {
            // SAFETY: plain COM activation on the calling thread; the
            // interface pointer is owned by `IAudioEndpointVolume`.
            unsafe {
                CoInitializeEx(None, COINIT_MULTITHREADED).ok().map_err(unavailable)?;
                let enumerator: IMMDeviceEnumerator =
                    CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(unavailable)?;
                let device = enumerator
                    .GetDefaultAudioEndpoint(eRender, eConsole)
                    .map_err(unavailable)?;
                let endpoint: IAudioEndpointVolume =
                    device.Activate(CLSCTX_ALL, None).map_err(unavailable)?;

                let (mut min_db, mut max_db, mut step_db) = (0.0f32, 0.0f32, 0.0f32);
                endpoint
                    .GetVolumeRange(&mut min_db, &mut max_db, &mut step_db)
                    .map_err(unavailable)?;
                log::debug!("endpoint range {:.2}..{:.2} dB step {:.3}", min_db, max_db, step_db);

                Ok(EndpointMixer {
                    endpoint,
                    range: VolumeRange::new(min_db as f64, max_db as f64),
                })
            }
        }
    }

    impl VolumeControl for EndpointMixer {
        fn name(&self) -> &str { "wasapi:default-render" }
        fn range(&self) -> VolumeRange { self.range }

        fn apply(&mut self, level: f64) -> Result<(), MixerError> {
            // SAFETY: `endpoint` is a live COM interface; a null event
            // context GUID is permitted by the API.
            unsafe {
                self.endpoint
                    .SetMasterVolumeLevel(level as f32, std::ptr::null())
                    .map_err(|e| MixerError::SetLevel(e.to_string()))
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// open_mixer: pick the platform backend
// ════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "linux")]
fn open_platform_mixer(cfg: &AppConfig) -> Result<Box<dyn VolumeControl>, MixerError> {
    Ok(Box::new(AlsaMixer::open(&cfg.mixer_card, &cfg.mixer_control)?))
}

#[cfg(windows)]
fn open_platform_mixer(_cfg: &AppConfig) -> Result<Box<dyn VolumeControl>, MixerError> {
    Ok(Box::new(EndpointMixer::open()?))
}

#[cfg(not(any(target_os = "linux", windows)))]
fn open_platform_mixer(_cfg: &AppConfig) -> Result<Box<dyn VolumeControl>, MixerError> {
    Err(MixerError::Unavailable("no mixer backend for this platform".to_string()))
}

/// Open the platform mixer.
/// Falls back to [`NullMixer`] with a warning if it can't be opened.
pub fn open_mixer(cfg: &AppConfig) -> Box<dyn VolumeControl> {
    match open_platform_mixer(cfg) {
        Ok(m) => {
            let r = m.range();
            log::info!("Opened mixer {} (range {}..{})", m.name(), r.min, r.max);
            m
        }
        Err(e) => {
            log::warn!("{}: falling back to null mixer, volume will not change", e);
            #[cfg(target_os = "linux")]
            log::warn!("Check `amixer -D {} scontrols` for a usable control name", cfg.mixer_card);
            Box::new(NullMixer::default())
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    struct DbMixer {
        applied: Vec<f64>,
    }

    impl VolumeControl for DbMixer {
        fn name(&self) -> &str { "db" }
        fn range(&self) -> VolumeRange { VolumeRange::new(-65.25, 0.0) }
        fn apply(&mut self, level: f64) -> Result<(), MixerError> {
            self.applied.push(level);
            Ok(())
        }
    }

    #[test]
    fn set_level_clamps_before_apply() {
        let mut m = DbMixer { applied: Vec::new() };
        assert_eq!(m.set_level(3.0).unwrap(), 0.0);
        assert_eq!(m.set_level(-100.0).unwrap(), -65.25);
        assert_eq!(m.set_level(-10.0).unwrap(), -10.0);
        assert_eq!(m.applied, vec![0.0, -65.25, -10.0]);
    }

    #[test]
    fn null_mixer_records_last_level() {
        let mut m = NullMixer::default();
        assert_eq!(m.last_level(), None);
        m.set_level(42.0).unwrap();
        m.set_level(250.0).unwrap();
        assert_eq!(m.last_level(), Some(100.0));
        assert_eq!(m.name(), "null");
    }
}
