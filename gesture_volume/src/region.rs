//! Square, possibly rotated, regions of a frame.
//!
//! Both models see the frame through a [`HandRegion`]: the palm detector gets
//! the whole frame letterboxed into a square, the landmark model gets one
//! rotated crop per palm. Sampling and remapping share [`HandRegion::to_frame`],
//! so a point read out of a crop lands back where it was sampled from.

use ndarray::Array4;

use crate::camera::Frame;
use crate::landmarks::{HandLandmarks, Landmark};

/// A square window onto a frame, in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandRegion {
    pub cx:       f32,
    pub cy:       f32,
    /// Edge length in pixels.
    pub size:     f32,
    /// Radians, clockwise in image coordinates (y down).
    pub rotation: f32,
}

impl HandRegion {
    /// The whole frame centred in a square, padded on the short side.
    pub fn letterbox(frame: &Frame) -> Self {
        HandRegion {
            cx:       frame.width as f32 / 2.0,
            cy:       frame.height as f32 / 2.0,
            size:     frame.width.max(frame.height) as f32,
            rotation: 0.0,
        }
    }

    /// Map `(u, v)` in `[0, 1]²` region space to frame pixels.
    pub fn to_frame(&self, u: f32, v: f32) -> (f32, f32) {
        let lx = (u - 0.5) * self.size;
        let ly = (v - 0.5) * self.size;
        let (sin, cos) = self.rotation.sin_cos();
        (
            self.cx + lx * cos - ly * sin,
            self.cy + lx * sin + ly * cos,
        )
    }

    /// Move landmarks from region space to frame-normalized coordinates.
    pub fn remap(&self, hand: &mut HandLandmarks, width: usize, height: usize) {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        for lm in hand.points.iter_mut() {
            let (x, y) = self.to_frame(lm.x, lm.y);
            *lm = Landmark { x: x / w, y: y / h, z: lm.z * self.size / w };
        }
    }
}

/// Sample `region` of `frame` into a `[1, size, size, 3]` RGB tensor in `[0, 1]`.
///
/// Nearest-neighbour at each output pixel centre. Samples that fall outside
/// the frame stay black.
pub fn crop_tensor(frame: &Frame, region: &HandRegion, size: usize) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    if frame.is_empty() || size == 0 { return tensor; }

    let step = 1.0 / size as f32;
    for ty in 0..size {
        let v = (ty as f32 + 0.5) * step;
        for tx in 0..size {
            let u = (tx as f32 + 0.5) * step;
            let (x, y) = region.to_frame(u, v);
            if x < 0.0 || y < 0.0 { continue; }
            let (sx, sy) = (x as usize, y as usize);
            if sx >= frame.width || sy >= frame.height { continue; }

            let rgb = frame.rgb_at(sx, sy);
            for c in 0..3 {
                tensor[[0, ty, tx, c]] = rgb[c] as f32 / 255.0;
            }
        }
    }
    tensor
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
