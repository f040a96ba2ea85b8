//! # pinch_map
//!
//! Fingertip geometry and the clamped linear mapping that turns a pinch
//! distance (pixels between thumb tip and index tip) into a mixer level.
//!
//! ```text
//!   distance px   ≤ near ──────────── near..far ──────────── ≥ far
//!   mixer level     range.min     linear in between      range.max
//!   on-screen %     0                                     100
//! ```
//!
//! Everything here is pure arithmetic; the camera, the landmark model and the
//! OS mixer live in the `gesture_volume` crate.

// ════════════════════════════════════════════════════════════════════════════
// Point
// ════════════════════════════════════════════════════════════════════════════

/// A 2-D pixel coordinate in frame space (origin top-left).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    /// Scale a normalized `[0, 1]` image coordinate to pixels.
    ///
    /// The fractional part is truncated toward zero, so `0.999 * 640` lands on
    /// pixel 639 and a slightly negative coordinate lands on 0.
    pub fn from_normalized(nx: f32, ny: f32, width: usize, height: usize) -> Self {
        Point {
            x: (nx * width as f32) as i32,
            y: (ny * height as f32) as i32,
        }
    }
}

/// Euclidean distance between two pixel points. Always `>= 0`.
pub fn distance(p1: Point, p2: Point) -> f64 {
    let dx = (p2.x - p1.x) as f64;
    let dy = (p2.y - p1.y) as f64;
    dx.hypot(dy)
}

// ════════════════════════════════════════════════════════════════════════════
// interp: clamped linear interpolation
// ════════════════════════════════════════════════════════════════════════════

/// Map `x` from `[x0, x1]` onto `[y0, y1]`, clamping outside the domain.
///
/// * `x <= x0` → `y0`
/// * `x >= x1` → `y1`
///
/// A degenerate domain (`x0 >= x1`) behaves as a step at `x0`. `NaN` maps to
/// `y0`.
pub fn interp(x: f64, (x0, x1): (f64, f64), (y0, y1): (f64, f64)) -> f64 {
    if x.is_nan() || x <= x0 {
        return y0;
    }
    if x >= x1 {
        return y1;
    }
    let t = (x - x0) / (x1 - x0);
    y0 + t * (y1 - y0)
}

// ════════════════════════════════════════════════════════════════════════════
// Calibration / VolumeRange
// ════════════════════════════════════════════════════════════════════════════

/// Pinch distances (pixels) that map to the ends of the volume range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    /// Distance at or below which the volume is at its minimum.
    pub near: f64,
    /// Distance at or above which the volume is at its maximum.
    pub far:  f64,
}

impl Calibration {
    pub const DEFAULT_NEAR: f64 = 30.0;
    pub const DEFAULT_FAR:  f64 = 150.0;

    pub fn new(near: f64, far: f64) -> Self {
        Calibration { near, far }
    }

    /// Midpoint of the calibrated span.
    #[cfg(test)]
    pub fn midpoint(&self) -> f64 {
        (self.near + self.far) / 2.0
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::new(Self::DEFAULT_NEAR, Self::DEFAULT_FAR)
    }
}

/// The level range a mixer endpoint accepts, in the backend's own units
/// (raw steps for ALSA, decibels for the Windows endpoint).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeRange {
    pub min: f64,
    pub max: f64,
}

impl VolumeRange {
    pub fn new(min: f64, max: f64) -> Self {
        VolumeRange { min, max }
    }

    /// Percentage scale used for the on-screen readout.
    pub fn percent() -> Self {
        VolumeRange::new(0.0, 100.0)
    }

    /// Clamp `level` into `[min, max]`.
    pub fn clamp(&self, level: f64) -> f64 {
        if level.is_nan() { return self.min; }
        level.max(self.min).min(self.max)
    }

    #[cfg(test)]
    pub fn contains(&self, level: f64) -> bool {
        level >= self.min && level <= self.max
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PinchMapping
// ════════════════════════════════════════════════════════════════════════════

/// Calibration plus device range: everything needed to turn a distance into
/// a level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinchMapping {
    pub calibration: Calibration,
    pub range:       VolumeRange,
}

impl PinchMapping {
    pub fn new(calibration: Calibration, range: VolumeRange) -> Self {
        PinchMapping { calibration, range }
    }

    fn domain(&self) -> (f64, f64) {
        (self.calibration.near, self.calibration.far)
    }

    /// Mixer level for `distance`, already inside `range`.
    pub fn level_for(&self, distance: f64) -> f64 {
        let level = interp(distance, self.domain(), (self.range.min, self.range.max));
        self.range.clamp(level)
    }

    /// Whole-number percentage for the readout, truncated (89.9 → 89).
    pub fn percent_for(&self, distance: f64) -> u8 {
        let pct = interp(distance, self.domain(), (0.0, 100.0));
        pct.clamp(0.0, 100.0) as u8
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PinchReading: the per-frame record
// ════════════════════════════════════════════════════════════════════════════

/// One frame's measurement. Built and dropped every iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinchReading {
    pub thumb:    Point,
    pub index:    Point,
    pub distance: f64,
    /// Level to hand to the mixer, in `mapping.range` units.
    pub level:    f64,
    pub percent:  u8,
}

impl PinchReading {
    pub fn measure(thumb: Point, index: Point, mapping: &PinchMapping) -> Self {
        let distance = distance(index, thumb);
        PinchReading {
            thumb,
            index,
            distance,
            level:   mapping.level_for(distance),
            percent: mapping.percent_for(distance),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn db_mapping() -> PinchMapping {
        // Typical Windows endpoint range in dB.
        PinchMapping::new(Calibration::default(), VolumeRange::new(-65.25, 0.0))
    }

    #[test]
    fn distance_is_pythagorean() {
        assert_eq!(distance(Point::new(0, 0), Point::new(3, 4)), 5.0);
        assert_eq!(distance(Point::new(3, 4), Point::new(0, 0)), 5.0);
    }

    #[test]
    fn distance_of_same_point_is_zero() {
        let p = Point::new(120, -7);
        assert_eq!(distance(p, p), 0.0);
    }

    #[test]
    fn from_normalized_truncates() {
        let p = Point::from_normalized(0.5, 0.9999, 640, 480);
        assert_eq!(p, Point::new(320, 479));
        let q = Point::from_normalized(-0.001, 0.0, 640, 480);
        assert_eq!(q, Point::new(0, 0));
    }

    #[test]
    fn interp_clamps_below_and_above() {
        assert_eq!(interp(0.0,   (30.0, 150.0), (0.0, 100.0)), 0.0);
        assert_eq!(interp(30.0,  (30.0, 150.0), (0.0, 100.0)), 0.0);
        assert_eq!(interp(150.0, (30.0, 150.0), (0.0, 100.0)), 100.0);
        assert_eq!(interp(999.0, (30.0, 150.0), (0.0, 100.0)), 100.0);
    }

    #[test]
    fn interp_handles_nan_and_degenerate_domain() {
        assert_eq!(interp(f64::NAN, (30.0, 150.0), (-10.0, 10.0)), -10.0);
        assert_eq!(interp(5.0,  (10.0, 10.0), (1.0, 2.0)), 1.0);
        assert_eq!(interp(10.0, (10.0, 10.0), (1.0, 2.0)), 1.0);
        assert_eq!(interp(11.0, (10.0, 10.0), (1.0, 2.0)), 2.0);
    }

    #[test]
    fn midpoint_maps_to_middle_of_range() {
        let m = db_mapping();
        let mid = m.level_for(m.calibration.midpoint());
        assert!((mid - (-32.625)).abs() < 1e-9);
        assert_eq!(m.percent_for(90.0), 50);
    }

    #[test]
    fn percent_truncates_like_int_cast() {
        let m = db_mapping();
        // 30 + 1.2 * 89.9 = 137.88 → 89.9 %
        assert_eq!(m.percent_for(137.88), 89);
    }

    #[test]
    fn level_always_inside_range() {
        let m = db_mapping();
        for d in [-5.0, 0.0, 29.9, 30.0, 75.0, 149.9, 150.0, 1e6] {
            assert!(m.range.contains(m.level_for(d)), "distance {d}");
        }
    }

    #[test]
    fn volume_range_clamp() {
        let r = VolumeRange::new(0.0, 65536.0);
        assert_eq!(r.clamp(-1.0), 0.0);
        assert_eq!(r.clamp(70000.0), 65536.0);
        assert_eq!(r.clamp(f64::NAN), 0.0);
        assert_eq!(r.clamp(1234.5), 1234.5);
    }

    #[test]
    fn reading_measures_thumb_to_index() {
        let m = PinchMapping::new(Calibration::default(), VolumeRange::percent());
        let r = PinchReading::measure(Point::new(100, 100), Point::new(100, 190), &m);
        assert_eq!(r.distance, 90.0);
        assert_eq!(r.percent, 50);
        assert!((r.level - 50.0).abs() < 1e-9);
    }
}
