//! Webcam capture.
//!
//! [`FrameSource`] is the seam between the pipeline and the device: the real
//! program reads from OpenCV's `VideoCapture`, tests feed canned frames.

use opencv::{
    core::{self, Mat},
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::error::CaptureError;

// ════════════════════════════════════════════════════════════════════════════
// Frame
// ════════════════════════════════════════════════════════════════════════════

/// An owned BGR8 image, rows packed with no padding.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width:  usize,
    pub height: usize,
    /// `width * height * 3` bytes, B, G, R per pixel.
    pub bgr:    Vec<u8>,
}

impl Frame {
    /// Wrap a packed BGR buffer. Returns `None` if the length is wrong.
    pub fn from_bgr(width: usize, height: usize, bgr: Vec<u8>) -> Option<Self> {
        if bgr.len() != width * height * 3 { return None; }
        Some(Frame { width, height, bgr })
    }

    /// A frame filled with one BGR color.
    pub fn solid(width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let bgr = bgr.iter().copied().cycle().take(width * height * 3).collect();
        Frame { width, height, bgr }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `[r, g, b]` at `(x, y)`. Caller guarantees bounds.
    #[inline]
    pub fn rgb_at(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.bgr[i + 2], self.bgr[i + 1], self.bgr[i]]
    }

    /// Flip horizontally in place.
    pub fn mirror(&mut self) {
        if self.is_empty() { return; }
        let row_len = self.width * 3;
        for row in self.bgr.chunks_exact_mut(row_len) {
            let (mut l, mut r) = (0usize, self.width.saturating_sub(1));
            while l < r {
                for c in 0..3 {
                    row.swap(l * 3 + c, r * 3 + c);
                }
                l += 1;
                r -= 1;
            }
        }
    }

    /// Convert to packed `0xAARRGGBB` pixels for the preview canvas.
    pub fn to_argb(&self) -> Vec<u32> {
        self.bgr
            .chunks_exact(3)
            .map(|p| 0xFF00_0000 | (p[2] as u32) << 16 | (p[1] as u32) << 8 | p[0] as u32)
            .collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FrameSource
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can hand the pipeline one frame at a time.
pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// `Ok(None)` means the stream ended or the device failed to deliver a
    /// frame; the main loop treats that as a normal exit.
    fn read(&mut self) -> Result<Option<Frame>, CaptureError>;
}

// ════════════════════════════════════════════════════════════════════════════
// OpenCvCamera
// ════════════════════════════════════════════════════════════════════════════

/// Webcam opened by device index through OpenCV.
pub struct OpenCvCamera {
    cap:   VideoCapture,
    mat:   Mat,
    index: i32,
}

impl OpenCvCamera {
    pub fn open(index: i32) -> Result<Self, CaptureError> {
        let cap = VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|e| {
                log::error!("camera #{}: {}", index, e);
                CaptureError::Open { index }
            })?;
        if !cap.is_opened().unwrap_or(false) {
            return Err(CaptureError::Open { index });
        }
        log::info!("Opened camera #{}", index);
        Ok(OpenCvCamera { cap, mat: Mat::default(), index })
    }
}

impl FrameSource for OpenCvCamera {
    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        if !self.cap.is_opened().unwrap_or(false) {
            return Ok(None);
        }
        match self.cap.read(&mut self.mat) {
            Ok(true)  => {}
            Ok(false) => {
                log::info!("camera #{}: no frame returned", self.index);
                return Ok(None);
            }
            Err(e) => {
                log::warn!("camera #{}: read failed: {}", self.index, e);
                return Ok(None);
            }
        }
        if self.mat.empty() { return Ok(None); }
        if self.mat.typ() != core::CV_8UC3 {
            return Err(CaptureError::Read(format!(
                "unsupported pixel type {} (expected 8-bit BGR)", self.mat.typ()
            )));
        }

        let width  = self.mat.cols() as usize;
        let height = self.mat.rows() as usize;
        let bytes = if self.mat.is_continuous() {
            self.mat.data_bytes().map_err(|e| CaptureError::Read(e.to_string()))?.to_vec()
        } else {
            let packed = self.mat.try_clone().map_err(|e| CaptureError::Read(e.to_string()))?;
            packed.data_bytes().map_err(|e| CaptureError::Read(e.to_string()))?.to_vec()
        };

        Frame::from_bgr(width, height, bytes)
            .map(Some)
            .ok_or_else(|| CaptureError::Read(format!("short frame buffer for {}x{}", width, height)))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: usize, h: usize) -> Frame {
        let mut bgr = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                bgr.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::from_bgr(w, h, bgr).unwrap()
    }

    #[test]
    fn from_bgr_rejects_wrong_length() {
        assert!(Frame::from_bgr(2, 2, vec![0; 11]).is_none());
        assert!(Frame::from_bgr(2, 2, vec![0; 12]).is_some());
    }

    #[test]
    fn mirror_reverses_each_row() {
        let mut f = gradient(5, 2);
        f.mirror();
        for y in 0..2 {
            for x in 0..5 {
                let [_, g, b] = f.rgb_at(x, y);
                assert_eq!(b as usize, 4 - x);
                assert_eq!(g as usize, y);
            }
        }
    }

    #[test]
    fn mirror_twice_is_identity() {
        let original = gradient(4, 3);
        let mut f = original.clone();
        f.mirror();
        f.mirror();
        assert_eq!(f, original);
    }

    #[test]
    fn rgb_at_swaps_channel_order() {
        let f = Frame::solid(1, 1, [10, 20, 30]);
        assert_eq!(f.rgb_at(0, 0), [30, 20, 10]);
    }

    #[test]
    fn to_argb_packs_opaque_pixels() {
        let f = Frame::solid(2, 1, [0x33, 0x22, 0x11]);
        assert_eq!(f.to_argb(), vec![0xFF112233, 0xFF112233]);
    }
}
