//! # gesture_volume
//!
//! Pinch your thumb and index finger in front of the webcam to set the OS
//! master volume.
//!
//! ## Pipeline (one pass per frame)
//!
//! | Step | Module | Notes |
//! |---|---|---|
//! | Capture | [`camera`] | webcam #0 via OpenCV, mirrored |
//! | Palms | [`palm`] | palm detector on the letterboxed frame, up to 2 hands |
//! | Landmarks | [`landmarks`] | 21-point hand model on a rotated crop per palm ([`region`]) |
//! | Distance | `pinch_map` | thumb tip (4) ↔ index tip (8), pixels |
//! | Level | `pinch_map` | 30 px → minimum, 150 px → maximum, linear, clamped |
//! | Mixer | [`mixer`] | ALSA on Linux, endpoint volume on Windows |
//! | Overlay | [`overlay`] | skeleton, fingertip markers, `Volume: N%` |
//! | Preview | [`preview`] | `minifb` window; `q` quits |
//!
//! The loop ends on `q`, on closing the window, or when the camera stops
//! delivering frames.
//!
//! ## Configuration
//!
//! Defaults work out of the box. Override them with a TOML file named by
//! `$GESTURE_VOLUME_CONFIG` or `./gesture_volume.toml`; see [`config`].

pub mod error;
pub mod config;
pub mod camera;
pub mod landmarks;
pub mod region;
pub mod palm;
pub mod mixer;
pub mod overlay;
pub mod preview;
pub mod app;
