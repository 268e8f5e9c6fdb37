use serde::{Deserialize, Serialize};

/// Linear grayscale ramp over a fixed scalar range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    pub range: [f64; 2],
}

impl Default for LookupTable {
    fn default() -> Self {
        Self {
            range: [0.0, 255.0],
        }
    }
}

impl LookupTable {
    /// Brightness in `[0, 1]`; values outside the range saturate.
    #[inline]
    pub fn map(&self, value: f64) -> f32 {
        let [lo, hi] = self.range;
        if hi <= lo {
            return if value >= hi { 1.0 } else { 0.0 };
        }
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0) as f32
    }
}

/// Two-entry colour table for the mask: background is transparent, any
/// positive value gets `color` at `opacity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskLookup {
    pub color: [f32; 3],
    pub opacity: f32,
}

impl Default for MaskLookup {
    fn default() -> Self {
        Self {
            color: [1.0, 0.2, 0.1],
            opacity: 0.45,
        }
    }
}

impl MaskLookup {
    #[inline]
    pub fn map(&self, value: f64) -> Option<([f32; 3], f32)> {
        (value > 0.0).then_some((self.color, self.opacity))
    }
}

/// Piecewise-linear function over scalar values, clamped at both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseFunction<V> {
    points: Vec<(f64, V)>,
}

pub trait Lerp: Copy {
    fn lerp(a: Self, b: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for [f32; 3] {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        [0, 1, 2].map(|i| a[i] + (b[i] - a[i]) * t)
    }
}

impl<V: Lerp> PiecewiseFunction<V> {
    /// Points are sorted by scalar value.
    pub fn new(mut points: Vec<(f64, V)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn evaluate(&self, value: f64) -> Option<V> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if value <= first.0 {
            return Some(first.1);
        }
        if value >= last.0 {
            return Some(last.1);
        }
        let upper = self.points.partition_point(|(x, _)| *x <= value);
        let (x0, v0) = self.points[upper - 1];
        let (x1, v1) = self.points[upper];
        let t = if x1 > x0 {
            ((value - x0) / (x1 - x0)) as f32
        } else {
            0.0
        };
        Some(V::lerp(v0, v1, t))
    }
}

/// Colour and opacity transfer functions of one volumetric subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    pub color: PiecewiseFunction<[f32; 3]>,
    pub opacity: PiecewiseFunction<f32>,
}

impl TransferFunction {
    /// Grayscale ramp that hides the lowest `floor` fraction of
    /// `[min, max]` and reaches `max_opacity` at `max`.
    pub fn background_suppressing(min: f64, max: f64, floor: f64, max_opacity: f32) -> Self {
        let span = (max - min).max(f64::EPSILON);
        let cutoff = min + floor.clamp(0.0, 1.0) * span;
        Self {
            color: PiecewiseFunction::new(vec![(min, [0.0; 3]), (max, [1.0; 3])]),
            opacity: PiecewiseFunction::new(vec![
                (min, 0.0),
                (cutoff, 0.0),
                (max, max_opacity),
            ]),
        }
    }

    /// Uniform colour for every voxel above zero.
    pub fn highlight(color: [f32; 3], opacity: f32, max: f64) -> Self {
        Self {
            color: PiecewiseFunction::new(vec![(0.0, color), (max, color)]),
            opacity: PiecewiseFunction::new(vec![(0.0, 0.0), (0.5, opacity), (max, opacity)]),
        }
    }

    /// `(rgb, alpha)` for a scalar value.
    #[inline]
    pub fn classify(&self, value: f64) -> ([f32; 3], f32) {
        let rgb = self.color.evaluate(value).unwrap_or([1.0; 3]);
        let alpha = self.opacity.evaluate(value).unwrap_or(0.0);
        (rgb, alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_ramp_saturates() {
        let lut = LookupTable::default();
        assert_eq!(lut.map(-10.0), 0.0);
        assert_eq!(lut.map(255.0), 1.0);
        assert_eq!(lut.map(1500.0), 1.0);
        assert!((lut.map(127.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mask_lookup_is_binary() {
        let lut = MaskLookup::default();
        assert_eq!(lut.map(0.0), None);
        assert_eq!(lut.map(255.0), Some((lut.color, lut.opacity)));
    }

    #[test]
    fn piecewise_interpolates_and_clamps() {
        let f = PiecewiseFunction::new(vec![(10.0, 1.0f32), (0.0, 0.0)]);
        assert_eq!(f.evaluate(-5.0), Some(0.0));
        assert_eq!(f.evaluate(5.0), Some(0.5));
        assert_eq!(f.evaluate(50.0), Some(1.0));
        assert_eq!(PiecewiseFunction::<f32>::new(vec![]).evaluate(1.0), None);
    }

    #[test]
    fn background_is_transparent() {
        let tf = TransferFunction::background_suppressing(0.0, 1000.0, 0.2, 0.1);
        assert_eq!(tf.classify(150.0).1, 0.0);
        assert!(tf.classify(1000.0).1 > 0.09);
        let mask = TransferFunction::highlight([1.0, 0.0, 0.0], 0.6, 255.0);
        assert_eq!(mask.classify(0.0).1, 0.0);
        assert_eq!(mask.classify(255.0), ([1.0, 0.0, 0.0], 0.6));
    }
}
