//! The per-frame pipeline and the main loop.
//!
//! ```text
//! read ─▶ mirror ─▶ detect ─▶ for each hand: tips ─▶ distance ─▶ level ─▶ mixer
//!                                             └──────▶ overlay ─▶ preview ─▶ key check
//! ```
//!
//! Nothing survives from one frame to the next; the only long-lived objects
//! are the device handles passed into [`run_loop`].

use pinch_map::{PinchMapping, PinchReading};

use crate::camera::{Frame, FrameSource, OpenCvCamera};
use crate::config::AppConfig;
use crate::error::{AppError, CaptureError, LandmarkError};
use crate::landmarks::{HandDetector, OnnxModel, PalmHandDetector};
use crate::mixer::{open_mixer, VolumeControl};
use crate::overlay::Canvas;
use crate::preview::{FrameSink, Preview};

const LEGEND: &str = "q=quit";

// ════════════════════════════════════════════════════════════════════════════
// FrameResult
// ════════════════════════════════════════════════════════════════════════════

/// What one pass through the pipeline produced.
#[derive(Debug)]
pub struct FrameResult {
    /// Frame with the overlay drawn on it.
    pub canvas:  Canvas,
    /// Reading of the last hand processed, if any hand was found.
    pub reading: Option<PinchReading>,
    pub hands:   usize,
}

// ════════════════════════════════════════════════════════════════════════════
// process_frame: one iteration of the pipeline
// ════════════════════════════════════════════════════════════════════════════

/// Run one frame through detect → measure → mixer → overlay.
///
/// Every detected hand is measured and applied in turn, so with several hands
/// in view the last one decides the volume. A failed mixer write is logged
/// and the frame still renders.
pub fn process_frame(
    mut frame: Frame,
    mirror:    bool,
    mapping:   &PinchMapping,
    detector:  &mut dyn HandDetector,
    mixer:     &mut dyn VolumeControl,
) -> Result<FrameResult, LandmarkError> {
    if mirror {
        frame.mirror();
    }
    let (w, h) = (frame.width, frame.height);

    let hands = detector.detect(&frame)?;
    let mut canvas = Canvas::from_frame(&frame);
    let mut reading = None;

    for hand in &hands {
        canvas.draw_hand(hand);

        let r = PinchReading::measure(hand.thumb_tip(w, h), hand.index_tip(w, h), mapping);
        canvas.draw_pinch(&r);

        match mixer.set_level(r.level) {
            Ok(applied) => log::debug!(
                "distance={:.1}px level={:.2} ({}%)", r.distance, applied, r.percent
            ),
            Err(e) => log::warn!("{}: {}", mixer.name(), e),
        }

        canvas.draw_volume_text(r.percent);
        reading = Some(r);
    }

    canvas.draw_legend(LEGEND);
    Ok(FrameResult { canvas, reading, hands: hands.len() })
}

// ════════════════════════════════════════════════════════════════════════════
// run_loop
// ════════════════════════════════════════════════════════════════════════════

/// Counters reported when the loop exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames:   u64,
    /// Frames in which at least one hand set the volume.
    pub adjusted: u64,
}

/// Drive the pipeline until the source runs dry or the sink asks to quit.
///
/// A read failure ends the loop normally; an inference failure is returned.
pub fn run_loop(
    source:   &mut dyn FrameSource,
    detector: &mut dyn HandDetector,
    mixer:    &mut dyn VolumeControl,
    sink:     &mut dyn FrameSink,
    cfg:      &AppConfig,
) -> Result<LoopStats, AppError> {
    let mapping = PinchMapping::new(cfg.calibration(), mixer.range());
    let mut stats = LoopStats::default();

    loop {
        let frame = match source.read() {
            Ok(Some(f)) if !f.is_empty() => f,
            Ok(_) => {
                log::info!("Camera stream ended");
                break;
            }
            Err(e) => {
                log::warn!("{}", e);
                break;
            }
        };

        let result = process_frame(frame, cfg.mirror, &mapping, detector, mixer)?;
        stats.frames += 1;
        if result.reading.is_some() {
            stats.adjusted += 1;
        }

        if !sink.show(&result.canvas) {
            log::info!("Quit requested");
            break;
        }
    }

    Ok(stats)
}

// ════════════════════════════════════════════════════════════════════════════
// run(): wire up the real devices
// ════════════════════════════════════════════════════════════════════════════

/// Replays one already-read frame before delegating to the inner source.
/// The first frame is read up front to size the preview window.
struct Primed<S> {
    first: Option<Frame>,
    inner: S,
}

impl<S: FrameSource> FrameSource for Primed<S> {
    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.first.take() {
            Some(f) => Ok(Some(f)),
            None    => self.inner.read(),
        }
    }
}

/// Run the full application.
///
/// This is the entry point called from `main.rs`. Devices are held until the
/// loop exits and released when they drop at the end of this function.
pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    cfg.validate()?;

    let mut camera = OpenCvCamera::open(cfg.camera_index)?;
    let mut detector = PalmHandDetector::new(
        OnnxModel::load(&cfg.palm_model_path, cfg.palm_input_size)?,
        OnnxModel::load(&cfg.model_path, cfg.model_input_size)?,
        cfg.min_detection_confidence,
        cfg.max_num_hands,
    );
    let mut mixer = open_mixer(&cfg);

    let first = match camera.read() {
        Ok(Some(f)) if !f.is_empty() => f,
        Ok(_) => {
            log::warn!("Camera #{} delivered no frames", cfg.camera_index);
            return Ok(());
        }
        Err(e) => {
            log::warn!("{}", e);
            return Ok(());
        }
    };
    log::info!("Capturing {}x{}", first.width, first.height);

    let mut preview = Preview::new(&cfg.window_title, first.width, first.height)?;
    let mut source = Primed { first: Some(first), inner: camera };

    let stats = run_loop(&mut source, &mut detector, mixer.as_mut(), &mut preview, &cfg)?;
    log::info!("{} frames, volume adjusted in {}", stats.frames, stats.adjusted);
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::error::MixerError;
    use crate::landmarks::{HandLandmarks, Landmark, INDEX_TIP, LANDMARK_COUNT, THUMB_TIP};
    use crate::mixer::NullMixer;
    use crate::overlay::{INDEX_TIP_COLOR, TEXT_COLOR};
    use pinch_map::{Calibration, VolumeRange};

    // ── fakes ─────────────────────────────────────────────────────────────

    struct Frames(VecDeque<Result<Option<Frame>, CaptureError>>);

    impl Frames {
        fn blank(n: usize) -> Self {
            Frames((0..n).map(|_| Ok(Some(Frame::solid(200, 100, [0, 0, 0])))).collect())
        }
    }

    impl FrameSource for Frames {
        fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    /// Returns the scripted hands for each call; no hands once exhausted.
    struct Scripted(VecDeque<Vec<HandLandmarks>>);

    impl HandDetector for Scripted {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<HandLandmarks>, LandmarkError> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    struct Broken;

    impl HandDetector for Broken {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<HandLandmarks>, LandmarkError> {
            Err(LandmarkError::Inference("session poisoned".to_string()))
        }
    }

    #[derive(Default)]
    struct Recording {
        levels: Vec<f64>,
        fail:   bool,
    }

    impl VolumeControl for Recording {
        fn name(&self) -> &str { "recording" }
        fn range(&self) -> VolumeRange { VolumeRange::new(-65.25, 0.0) }
        fn apply(&mut self, level: f64) -> Result<(), MixerError> {
            if self.fail {
                return Err(MixerError::SetLevel("device gone".to_string()));
            }
            self.levels.push(level);
            Ok(())
        }
    }

    /// Accepts `limit` frames, then asks to quit.
    struct Sink {
        shown: usize,
        limit: usize,
    }

    impl Sink {
        fn unlimited() -> Self { Sink { shown: 0, limit: usize::MAX } }
    }

    impl FrameSink for Sink {
        fn show(&mut self, _canvas: &Canvas) -> bool {
            self.shown += 1;
            self.shown < self.limit
        }
    }

    /// A hand whose thumb and index tips land on the given pixels of a
    /// 200×100 frame. Coordinates aim at pixel centres so truncation is exact.
    fn hand_with_tips(thumb: (f32, f32), index: (f32, f32)) -> HandLandmarks {
        let at = |(x, y): (f32, f32)| Landmark { x: (x + 0.5) / 200.0, y: (y + 0.5) / 100.0, z: 0.0 };
        let mut points = [Landmark { x: 0.5, y: 0.5, z: 0.0 }; LANDMARK_COUNT];
        points[THUMB_TIP] = at(thumb);
        points[INDEX_TIP] = at(index);
        HandLandmarks { points, score: 0.9 }
    }

    fn mapping() -> PinchMapping {
        PinchMapping::new(Calibration::default(), VolumeRange::new(-65.25, 0.0))
    }

    // ── process_frame ─────────────────────────────────────────────────────

    #[test]
    fn no_hand_leaves_volume_alone() {
        let mut det = Scripted(VecDeque::new());
        let mut mix = Recording::default();
        let out = process_frame(Frame::solid(200, 100, [0, 0, 0]), true, &mapping(), &mut det, &mut mix).unwrap();
        assert!(out.reading.is_none());
        assert_eq!(out.hands, 0);
        assert!(mix.levels.is_empty());
        assert_eq!(out.canvas.pixel(10, 30), Some(0xFF000000));
    }

    #[test]
    fn pinch_closed_sets_minimum() {
        let mut det = Scripted(VecDeque::from(vec![vec![hand_with_tips((100.0, 50.0), (110.0, 50.0))]]));
        let mut mix = Recording::default();
        let out = process_frame(Frame::solid(200, 100, [0, 0, 0]), false, &mapping(), &mut det, &mut mix).unwrap();
        let r = out.reading.unwrap();
        assert_eq!(r.distance, 10.0);
        assert_eq!(r.percent, 0);
        assert_eq!(mix.levels, vec![-65.25]);
        // Top-left block of the "V", well clear of both fingertips.
        assert_eq!(out.canvas.pixel(10, 30), Some(TEXT_COLOR));
        assert_eq!(out.canvas.pixel(13, 33), Some(TEXT_COLOR));
        assert_eq!(out.canvas.pixel(110, 50), Some(crate::overlay::PINCH_LINE_COLOR));
    }

    #[test]
    fn pinch_wide_open_sets_maximum() {
        let mut det = Scripted(VecDeque::from(vec![vec![hand_with_tips((10.0, 10.0), (190.0, 90.0))]]));
        let mut mix = Recording::default();
        let out = process_frame(Frame::solid(200, 100, [0, 0, 0]), false, &mapping(), &mut det, &mut mix).unwrap();
        assert_eq!(out.reading.unwrap().percent, 100);
        assert_eq!(mix.levels, vec![0.0]);
    }

    #[test]
    fn midpoint_pinch_sets_half() {
        // 90 px apart horizontally.
        let mut det = Scripted(VecDeque::from(vec![vec![hand_with_tips((50.0, 50.0), (140.0, 50.0))]]));
        let mut mix = Recording::default();
        let out = process_frame(Frame::solid(200, 100, [0, 0, 0]), false, &mapping(), &mut det, &mut mix).unwrap();
        assert_eq!(out.reading.unwrap().percent, 50);
        assert!((mix.levels[0] - (-32.625)).abs() < 1e-9);
    }

    #[test]
    fn every_hand_is_applied_last_wins() {
        let hands = vec![
            hand_with_tips((100.0, 50.0), (105.0, 50.0)),  // closed
            hand_with_tips((20.0, 50.0),  (180.0, 50.0)),  // open
        ];
        let mut det = Scripted(VecDeque::from(vec![hands]));
        let mut mix = Recording::default();
        let out = process_frame(Frame::solid(200, 100, [0, 0, 0]), false, &mapping(), &mut det, &mut mix).unwrap();
        assert_eq!(out.hands, 2);
        assert_eq!(mix.levels, vec![-65.25, 0.0]);
        assert_eq!(out.reading.unwrap().percent, 100);
    }

    #[test]
    fn mirror_is_applied_before_drawing() {
        // Left column red in BGR; after mirroring it must be the right column.
        let mut bgr: Vec<u8> = Vec::new();
        for _ in 0..4 {
            for x in 0..6 {
                bgr.extend_from_slice(if x == 0 { &[0, 0, 255] } else { &[0, 0, 0] });
            }
        }
        let frame = Frame::from_bgr(6, 4, bgr).unwrap();
        let mut det = Scripted(VecDeque::new());
        let mut mix = NullMixer::default();
        let out = process_frame(frame, true, &mapping(), &mut det, &mut mix).unwrap();
        assert_eq!(out.canvas.pixel(5, 0), Some(0xFFFF0000));
        assert_eq!(out.canvas.pixel(0, 0), Some(0xFF000000));
    }

    #[test]
    fn mixer_failure_still_renders() {
        let mut det = Scripted(VecDeque::from(vec![vec![hand_with_tips((50.0, 50.0), (140.0, 50.0))]]));
        let mut mix = Recording { fail: true, ..Recording::default() };
        let out = process_frame(Frame::solid(200, 100, [0, 0, 0]), false, &mapping(), &mut det, &mut mix).unwrap();
        assert!(out.reading.is_some());
        assert!(out.canvas.buf.contains(&INDEX_TIP_COLOR));
    }

    // ── run_loop ──────────────────────────────────────────────────────────

    #[test]
    fn loop_ends_when_camera_runs_dry() {
        let mut src = Frames::blank(3);
        let mut det = Scripted(VecDeque::from(vec![
            vec![],
            vec![hand_with_tips((50.0, 50.0), (140.0, 50.0))],
            vec![],
        ]));
        let mut mix = Recording::default();
        let mut sink = Sink::unlimited();
        let stats = run_loop(&mut src, &mut det, &mut mix, &mut sink, &AppConfig::default()).unwrap();
        assert_eq!(stats, LoopStats { frames: 3, adjusted: 1 });
        assert_eq!(sink.shown, 3);
        assert_eq!(mix.levels.len(), 1);
    }

    #[test]
    fn read_error_ends_loop_cleanly() {
        let mut src = Frames(VecDeque::from(vec![
            Ok(Some(Frame::solid(200, 100, [0, 0, 0]))),
            Err(CaptureError::Read("usb unplugged".to_string())),
            Ok(Some(Frame::solid(200, 100, [0, 0, 0]))),
        ]));
        let mut det = Scripted(VecDeque::new());
        let mut mix = NullMixer::default();
        let mut sink = Sink::unlimited();
        let stats = run_loop(&mut src, &mut det, &mut mix, &mut sink, &AppConfig::default()).unwrap();
        assert_eq!(stats.frames, 1);
    }

    #[test]
    fn empty_frame_ends_loop() {
        let mut src = Frames(VecDeque::from(vec![
            Ok(Some(Frame::solid(0, 0, [0, 0, 0]))),
            Ok(Some(Frame::solid(200, 100, [0, 0, 0]))),
        ]));
        let mut det = Scripted(VecDeque::new());
        let mut mix = NullMixer::default();
        let mut sink = Sink::unlimited();
        let stats = run_loop(&mut src, &mut det, &mut mix, &mut sink, &AppConfig::default()).unwrap();
        assert_eq!(stats.frames, 0);
    }

    #[test]
    fn quit_key_stops_loop() {
        let mut src = Frames::blank(10);
        let mut det = Scripted(VecDeque::new());
        let mut mix = NullMixer::default();
        let mut sink = Sink { shown: 0, limit: 4 };
        let stats = run_loop(&mut src, &mut det, &mut mix, &mut sink, &AppConfig::default()).unwrap();
        assert_eq!(stats.frames, 4);
        assert_eq!(src.0.len(), 6);
    }

    #[test]
    fn inference_failure_is_returned() {
        let mut src = Frames::blank(2);
        let mut det = Broken;
        let mut mix = NullMixer::default();
        let mut sink = Sink::unlimited();
        let err = run_loop(&mut src, &mut det, &mut mix, &mut sink, &AppConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Landmark(LandmarkError::Inference(_))));
    }

    #[test]
    fn loop_maps_onto_mixer_range() {
        let mut src = Frames::blank(1);
        let mut det = Scripted(VecDeque::from(vec![vec![hand_with_tips((10.0, 50.0), (190.0, 50.0))]]));
        let mut mix = NullMixer::default();
        let mut sink = Sink::unlimited();
        run_loop(&mut src, &mut det, &mut mix, &mut sink, &AppConfig::default()).unwrap();
        // NullMixer range is 0–100.
        assert_eq!(mix.last_level(), Some(100.0));
    }

    #[test]
    fn primed_source_replays_first_frame() {
        let first = Frame::solid(2, 2, [9, 9, 9]);
        let mut src = Primed { first: Some(first.clone()), inner: Frames::blank(1) };
        assert_eq!(src.read().unwrap(), Some(first));
        assert_eq!(src.read().unwrap().map(|f| f.width), Some(200));
        assert_eq!(src.read().unwrap(), None);
    }
}
