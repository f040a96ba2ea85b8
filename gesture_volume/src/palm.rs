//! Palm detection: SSD anchors, box decoding, suppression, and the hand crop
//! derived from each palm.
//!
//! The palm network sees the letterboxed frame and predicts, per anchor, a box
//! offset plus seven palm keypoints. Only the wrist (0) and the middle-finger
//! knuckle (2) are used; together they give the hand's rotation.

use std::f32::consts::{FRAC_PI_2, PI};

use crate::error::LandmarkError;
use crate::region::HandRegion;

/// Feature-map strides of the palm network's SSD heads. Consecutive layers
/// with the same stride share one grid.
const ANCHOR_STRIDES: [usize; 4] = [8, 16, 16, 16];
/// Anchors contributed per grid cell by each layer.
const ANCHORS_PER_LAYER: usize = 2;

/// Values per anchor in the regressor output: box (4) + 7 keypoints × 2.
pub const PALM_VALUES: usize = 18;
const WRIST_KP:  usize = 0;
const MIDDLE_KP: usize = 2;

const NMS_IOU_THRESHOLD: f32 = 0.3;
/// Hand crop edge relative to the palm box.
const HAND_SCALE: f32 = 2.6;
/// Crop centre shift along the hand axis, in palm heights (towards the fingers).
const HAND_SHIFT: f32 = 0.5;

// ════════════════════════════════════════════════════════════════════════════
// Anchors
// ════════════════════════════════════════════════════════════════════════════

/// Anchor centre in normalized palm-input coordinates. All anchors are unit
/// size, so only the centre matters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

/// Anchor grid for a square palm input of `input_size` pixels.
pub fn ssd_anchors(input_size: usize) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let mut layer = 0;
    while layer < ANCHOR_STRIDES.len() {
        let stride = ANCHOR_STRIDES[layer];
        let mut per_cell = 0;
        while layer < ANCHOR_STRIDES.len() && ANCHOR_STRIDES[layer] == stride {
            per_cell += ANCHORS_PER_LAYER;
            layer += 1;
        }

        let cells = input_size.div_ceil(stride);
        for y in 0..cells {
            for x in 0..cells {
                let a = Anchor {
                    x: (x as f32 + 0.5) / cells as f32,
                    y: (y as f32 + 0.5) / cells as f32,
                };
                anchors.extend(std::iter::repeat(a).take(per_cell));
            }
        }
    }
    anchors
}

// ════════════════════════════════════════════════════════════════════════════
// PalmDetection
// ════════════════════════════════════════════════════════════════════════════

/// One palm in normalized palm-input coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PalmDetection {
    pub cx:     f32,
    pub cy:     f32,
    pub w:      f32,
    pub h:      f32,
    pub wrist:  (f32, f32),
    pub middle: (f32, f32),
    pub score:  f32,
}

impl PalmDetection {
    fn iou(&self, other: &PalmDetection) -> f32 {
        let ix = (self.cx + self.w / 2.0).min(other.cx + other.w / 2.0)
               - (self.cx - self.w / 2.0).max(other.cx - other.w / 2.0);
        let iy = (self.cy + self.h / 2.0).min(other.cy + other.h / 2.0)
               - (self.cy - self.h / 2.0).max(other.cy - other.h / 2.0);
        if ix <= 0.0 || iy <= 0.0 { return 0.0; }
        let inter = ix * iy;
        let union = self.w * self.h + other.w * other.h - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }

    /// The square crop the landmark model should see, in frame pixels.
    ///
    /// `input` is the region the palm network was run on. The palm box is
    /// rotated so the wrist → middle-knuckle axis points up, pushed half a
    /// palm towards the fingers, and grown to cover the whole hand.
    pub fn hand_region(&self, input: &HandRegion) -> HandRegion {
        let (cx, cy) = input.to_frame(self.cx, self.cy);
        let (wx, wy) = input.to_frame(self.wrist.0, self.wrist.1);
        let (mx, my) = input.to_frame(self.middle.0, self.middle.1);
        let w = self.w * input.size;
        let h = self.h * input.size;

        let rotation = normalize_angle(FRAC_PI_2 - (-(my - wy)).atan2(mx - wx));
        let (sin, cos) = rotation.sin_cos();
        HandRegion {
            cx:       cx + HAND_SHIFT * h * sin,
            cy:       cy - HAND_SHIFT * h * cos,
            size:     w.max(h) * HAND_SCALE,
            rotation,
        }
    }
}

fn normalize_angle(a: f32) -> f32 {
    a - 2.0 * PI * ((a + PI) / (2.0 * PI)).floor()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x.clamp(-100.0, 100.0)).exp())
}

/// Decode raw palm outputs into detections scoring at least `min_confidence`.
///
/// `regressors` holds [`PALM_VALUES`] floats per anchor in input pixels,
/// relative to the anchor centre; `scores` holds one logit per anchor.
pub fn decode_palms(
    regressors:     &[f32],
    scores:         &[f32],
    anchors:        &[Anchor],
    input_size:     usize,
    min_confidence: f32,
) -> Result<Vec<PalmDetection>, LandmarkError> {
    if scores.len() != anchors.len() || regressors.len() != anchors.len() * PALM_VALUES {
        return Err(LandmarkError::UnexpectedOutput(format!(
            "palm model gave {} boxes / {} scores for {} anchors",
            regressors.len() / PALM_VALUES, scores.len(), anchors.len()
        )));
    }

    let scale = input_size.max(1) as f32;
    let mut palms = Vec::new();
    for (i, a) in anchors.iter().enumerate() {
        let score = sigmoid(scores[i]);
        if !(score >= min_confidence) { continue; }

        let raw = &regressors[i * PALM_VALUES..(i + 1) * PALM_VALUES];
        let kp = |k: usize| (raw[4 + k * 2] / scale + a.x, raw[5 + k * 2] / scale + a.y);
        palms.push(PalmDetection {
            cx:     raw[0] / scale + a.x,
            cy:     raw[1] / scale + a.y,
            w:      raw[2] / scale,
            h:      raw[3] / scale,
            wrist:  kp(WRIST_KP),
            middle: kp(MIDDLE_KP),
            score,
        });
    }
    Ok(palms)
}

/// Highest-scoring palms first, dropping any that overlap a kept one, at most
/// `max` of them.
pub fn non_max_suppression(mut palms: Vec<PalmDetection>, max: usize) -> Vec<PalmDetection> {
    palms.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<PalmDetection> = Vec::new();
    for p in palms {
        if kept.len() >= max { break; }
        if kept.iter().all(|k| k.iou(&p) < NMS_IOU_THRESHOLD) {
            kept.push(p);
        }
    }
    kept
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn palm(cx: f32, cy: f32, score: f32) -> PalmDetection {
        PalmDetection {
            cx, cy, w: 0.2, h: 0.2,
            wrist:  (cx, cy + 0.1),
            middle: (cx, cy - 0.1),
            score,
        }
    }

    #[test]
    fn anchor_count_matches_palm_head() {
        // 24² cells × 2 + 12² cells × 6
        assert_eq!(ssd_anchors(192).len(), 2016);
        assert_eq!(ssd_anchors(128).len(), 896);
    }

    #[test]
    fn anchors_sit_at_cell_centres() {
        let a = ssd_anchors(32);
        assert_eq!(a[0], Anchor { x: 0.125, y: 0.125 });
        assert_eq!(a[1], a[0]);
        assert_eq!(a[2], Anchor { x: 0.375, y: 0.125 });
        // First stride-16 cell after the 4×4×2 stride-8 block.
        assert_eq!(a[32], Anchor { x: 0.25, y: 0.25 });
        assert_eq!(a.len(), 32 + 4 * 6);
    }

    #[test]
    fn decode_offsets_from_anchor() {
        let anchors = vec![Anchor { x: 0.5, y: 0.5 }, Anchor { x: 0.25, y: 0.25 }];
        let mut reg = vec![0.0; 2 * PALM_VALUES];
        reg[PALM_VALUES]     = 8.0;  // cx
        reg[PALM_VALUES + 2] = 16.0; // w
        reg[PALM_VALUES + 3] = 32.0; // h
        reg[PALM_VALUES + 5] = 8.0;  // wrist y
        let palms = decode_palms(&reg, &[-5.0, 5.0], &anchors, 32, 0.5).unwrap();
        assert_eq!(palms.len(), 1);
        let p = palms[0];
        assert_eq!((p.cx, p.cy, p.w, p.h), (0.5, 0.25, 0.5, 1.0));
        assert_eq!(p.wrist, (0.25, 0.5));
        assert!(p.score > 0.99);
    }

    #[test]
    fn decode_rejects_mismatched_outputs() {
        let anchors = ssd_anchors(32);
        let err = decode_palms(&[0.0; 18], &[0.0], &anchors, 32, 0.5).unwrap_err();
        assert!(matches!(err, LandmarkError::UnexpectedOutput(_)));
    }

    #[test]
    fn decode_skips_nan_scores() {
        let anchors = vec![Anchor { x: 0.5, y: 0.5 }];
        let palms = decode_palms(&[0.0; PALM_VALUES], &[f32::NAN], &anchors, 32, 0.5).unwrap();
        assert!(palms.is_empty());
    }

    #[test]
    fn suppression_keeps_best_of_overlap() {
        let kept = non_max_suppression(vec![
            palm(0.50, 0.50, 0.8),
            palm(0.52, 0.50, 0.9),
            palm(0.10, 0.10, 0.7),
        ], 5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].cx, 0.10);
    }

    #[test]
    fn suppression_caps_hand_count() {
        let kept = non_max_suppression(vec![
            palm(0.1, 0.1, 0.7),
            palm(0.5, 0.5, 0.9),
            palm(0.9, 0.9, 0.8),
        ], 2);
        assert_eq!(kept.iter().map(|p| p.score).collect::<Vec<_>>(), vec![0.9, 0.8]);
    }

    #[test]
    fn upright_palm_crop_shifts_towards_fingers() {
        let input = HandRegion { cx: 50.0, cy: 50.0, size: 100.0, rotation: 0.0 };
        let r = palm(0.5, 0.5, 0.9).hand_region(&input);
        assert!(r.rotation.abs() < 1e-6);
        assert!((r.cx - 50.0).abs() < 1e-4);
        assert!((r.cy - 40.0).abs() < 1e-4);
        assert!((r.size - 52.0).abs() < 1e-4);
    }

    #[test]
    fn sideways_palm_crop_is_rotated() {
        // Fingers pointing right: wrist on the left of the knuckle.
        let p = PalmDetection {
            wrist:  (0.4, 0.5),
            middle: (0.6, 0.5),
            ..palm(0.5, 0.5, 0.9)
        };
        let input = HandRegion { cx: 50.0, cy: 50.0, size: 100.0, rotation: 0.0 };
        let r = p.hand_region(&input);
        assert!((r.rotation - FRAC_PI_2).abs() < 1e-5);
        assert!((r.cx - 60.0).abs() < 1e-4);
        assert!((r.cy - 50.0).abs() < 1e-4);
        // The top edge of the crop faces the fingers.
        let (tx, ty) = r.to_frame(0.5, 0.0);
        assert!(tx > r.cx && (ty - r.cy).abs() < 1e-3);
    }
}
