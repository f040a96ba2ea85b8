//! Hand landmark detection.
//!
//! The pipeline only needs two of the 21 landmarks (thumb tip and index tip),
//! but the whole skeleton is kept so the preview can draw it. Hands are found
//! in two passes: palms on the whole frame ([`crate::palm`]), then landmarks
//! on a crop around each palm ([`crate::region`]).
//!
//! Landmark numbering follows the MediaPipe hand topology:
//!
//! ```text
//!          8   12  16  20
//!          |   |   |   |
//!      4   7   11  15  19
//!       \  |   |   |   |
//!        3 6   10  14  18
//!         \|   |   |   |
//!          2   5---9---13--17
//!           \  |          /
//!            1 |        /
//!             \|      /
//!              0 ----
//! ```

use std::path::Path;

use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use pinch_map::Point;

use crate::camera::Frame;
use crate::error::LandmarkError;
use crate::palm::{decode_palms, non_max_suppression, ssd_anchors, Anchor};
use crate::region::{crop_tensor, HandRegion};

pub const LANDMARK_COUNT: usize = 21;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;

/// Skeleton edges between landmark indices.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),            // thumb
    (0, 5), (5, 6), (6, 7), (7, 8),            // index
    (5, 9), (9, 10), (10, 11), (11, 12),       // middle
    (9, 13), (13, 14), (14, 15), (15, 16),     // ring
    (13, 17), (0, 17), (17, 18), (18, 19), (19, 20), // pinky + palm
];

// ════════════════════════════════════════════════════════════════════════════
// Landmark / HandLandmarks
// ════════════════════════════════════════════════════════════════════════════

/// One landmark in normalized image coordinates (`x`, `y` in `[0, 1]`).
/// `z` is relative depth and unused by the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    pub points: [Landmark; LANDMARK_COUNT],
    /// Hand presence probability.
    pub score:  f32,
}

impl HandLandmarks {
    /// Landmark `i` scaled to frame pixels.
    pub fn pixel(&self, i: usize, width: usize, height: usize) -> Point {
        let lm = self.points[i];
        Point::from_normalized(lm.x, lm.y, width, height)
    }

    pub fn thumb_tip(&self, width: usize, height: usize) -> Point {
        self.pixel(THUMB_TIP, width, height)
    }

    pub fn index_tip(&self, width: usize, height: usize) -> Point {
        self.pixel(INDEX_TIP, width, height)
    }

    /// All landmarks in frame pixels.
    pub fn to_pixels(&self, width: usize, height: usize) -> [Point; LANDMARK_COUNT] {
        let mut out = [Point::default(); LANDMARK_COUNT];
        for (i, p) in out.iter_mut().enumerate() {
            *p = self.pixel(i, width, height);
        }
        out
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandDetector trait
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can find hands in a frame.
pub trait HandDetector {
    /// Hands found in `frame`, in detection order. Empty when none pass the
    /// confidence threshold.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>, LandmarkError>;
}

// ════════════════════════════════════════════════════════════════════════════
// Model: one image in, two float heads out
// ════════════════════════════════════════════════════════════════════════════

/// A network taking one `[1, S, S, 3]` RGB tensor and producing two float
/// outputs. Both the palm and the landmark networks have this shape.
pub trait Model {
    /// Edge length `S` of the square input.
    fn input_size(&self) -> usize;

    /// Run once and return both outputs flattened.
    fn run(&mut self, input: Array4<f32>) -> Result<(Vec<f32>, Vec<f32>), LandmarkError>;
}

/// A [`Model`] backed by an ONNX Runtime session.
pub struct OnnxModel {
    session:    Session,
    input_size: usize,
}

impl OnnxModel {
    pub fn load(path: &Path, input_size: usize) -> Result<Self, LandmarkError> {
        let load_err = |e: &dyn std::fmt::Display| LandmarkError::ModelLoad {
            path:   path.display().to_string(),
            reason: e.to_string(),
        };
        let session = Session::builder()
            .map_err(|e| load_err(&e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(&e))?
            .commit_from_file(path)
            .map_err(|e| load_err(&e))?;

        log::info!("Loaded {} ({}×{} input)", path.display(), input_size, input_size);
        Ok(OnnxModel { session, input_size })
    }
}

impl Model for OnnxModel {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn run(&mut self, input: Array4<f32>) -> Result<(Vec<f32>, Vec<f32>), LandmarkError> {
        let tensor = Tensor::from_array(input)
            .map_err(|e| LandmarkError::Inference(e.to_string()))?;
        let outputs = self.session
            .run(ort::inputs![tensor])
            .map_err(|e| LandmarkError::Inference(e.to_string()))?;

        if outputs.len() < 2 {
            return Err(LandmarkError::UnexpectedOutput(format!(
                "expected two outputs, got {}", outputs.len()
            )));
        }
        let first: ndarray::ArrayViewD<f32> = outputs[0]
            .try_extract_array()
            .map_err(|e| LandmarkError::UnexpectedOutput(e.to_string()))?;
        let second: ndarray::ArrayViewD<f32> = outputs[1]
            .try_extract_array()
            .map_err(|e| LandmarkError::UnexpectedOutput(e.to_string()))?;

        Ok((first.iter().copied().collect(), second.iter().copied().collect()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PalmHandDetector
// ════════════════════════════════════════════════════════════════════════════

/// Two-stage hand detector: find palms on the letterboxed frame, then run the
/// landmark model on a rotated crop around each palm.
///
/// Expected networks (MediaPipe hand models exported to ONNX):
///
/// * palm: output 0 is `[N, 18]` box + keypoint regressors, output 1 is `[N]`
///   score logits, one row per SSD anchor (see [`ssd_anchors`]).
/// * landmark: output 0 is 63 floats, `x, y, z` per landmark in crop pixels;
///   output 1 is hand presence, a probability or a logit.
pub struct PalmHandDetector<P, L> {
    palm:           P,
    landmark:       L,
    anchors:        Vec<Anchor>,
    min_confidence: f32,
    max_hands:      usize,
}

impl<P: Model, L: Model> PalmHandDetector<P, L> {
    pub fn new(palm: P, landmark: L, min_confidence: f32, max_hands: usize) -> Self {
        let anchors = ssd_anchors(palm.input_size());
        PalmHandDetector { palm, landmark, anchors, min_confidence, max_hands }
    }
}

impl<P: Model, L: Model> HandDetector for PalmHandDetector<P, L> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>, LandmarkError> {
        if frame.is_empty() { return Ok(Vec::new()); }

        let whole = HandRegion::letterbox(frame);
        let palm_size = self.palm.input_size();
        let (regressors, scores) = self.palm.run(crop_tensor(frame, &whole, palm_size))?;
        let palms = decode_palms(&regressors, &scores, &self.anchors, palm_size, self.min_confidence)?;
        let palms = non_max_suppression(palms, self.max_hands);

        let lm_size = self.landmark.input_size();
        let mut hands = Vec::with_capacity(palms.len());
        for palm in &palms {
            let region = palm.hand_region(&whole);
            let (coords, presence) = self.landmark.run(crop_tensor(frame, &region, lm_size))?;
            let score_raw = presence.first().copied().ok_or_else(|| {
                LandmarkError::UnexpectedOutput("empty presence output".to_string())
            })?;

            if let Some(mut hand) = decode_hand(&coords, score_raw, lm_size, self.min_confidence)? {
                region.remap(&mut hand, frame.width, frame.height);
                log::trace!("palm score={:.3} hand score={:.3}", palm.score, hand.score);
                hands.push(hand);
            }
        }
        Ok(hands)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Post-processing
// ════════════════════════════════════════════════════════════════════════════

/// Turn raw landmark outputs into a hand in crop-normalized coordinates, or
/// `None` below `min_confidence`.
///
/// A presence value outside `[0, 1]` is treated as a logit. A NaN presence
/// never passes.
pub fn decode_hand(
    coords:         &[f32],
    score_raw:      f32,
    input_size:     usize,
    min_confidence: f32,
) -> Result<Option<HandLandmarks>, LandmarkError> {
    if coords.len() < LANDMARK_COUNT * 3 {
        return Err(LandmarkError::UnexpectedOutput(format!(
            "expected {} landmark values, got {}", LANDMARK_COUNT * 3, coords.len()
        )));
    }

    let score = if (0.0..=1.0).contains(&score_raw) {
        score_raw
    } else {
        1.0 / (1.0 + (-score_raw).exp())
    };
    if !(score >= min_confidence) {
        return Ok(None);
    }

    let scale = input_size.max(1) as f32;
    let mut points = [Landmark::default(); LANDMARK_COUNT];
    for (i, lm) in points.iter_mut().enumerate() {
        *lm = Landmark {
            x: coords[i * 3]     / scale,
            y: coords[i * 3 + 1] / scale,
            z: coords[i * 3 + 2] / scale,
        };
    }
    Ok(Some(HandLandmarks { points, score }))
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
