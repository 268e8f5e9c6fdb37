use serde::{Deserialize, Serialize};

use crate::enums::Orientation;
use crate::planes::ReslicePlaneSet;

/// Bounded control value. `min <= value <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderState {
    min: f64,
    max: f64,
    value: f64,
}

impl Default for SliderState {
    fn default() -> Self {
        Self::new(0.0, 100.0)
    }
}

impl SliderState {
    /// A slider over `[min, max]` starting at its midpoint.
    pub fn new(min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let mut slider = Self {
            min,
            max,
            value: min,
        };
        slider.reset();
        slider
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value.clamp(self.min, self.max);
    }

    /// Puts the value at `(max - min) / 2`.
    pub fn reset(&mut self) {
        self.set_value((self.max - self.min) / 2.0);
    }

    /// `(value - min) / max`.
    ///
    /// The denominator is `max`, not `max - min`; the two agree only for
    /// `min == 0`, which is the only range the viewer uses.
    pub fn ratio(&self) -> f64 {
        if self.max == 0.0 {
            return 0.0;
        }
        (self.value - self.min) / self.max
    }
}

/// Converts the slider position into a physical plane offset.
pub struct SliderBinding;

impl SliderBinding {
    pub fn offset(slider: &SliderState, planes: &ReslicePlaneSet, axis: Orientation) -> f64 {
        slider.ratio() * planes.physical_size(axis)
    }

    /// Pushes the slider's offset into the active plane.
    pub fn apply(slider: &SliderState, planes: &mut ReslicePlaneSet) {
        let axis = planes.active();
        let offset = Self::offset(slider, planes, axis);
        tracing::trace!(?axis, value = slider.value(), offset, "slider moved plane");
        planes.set_offset(axis, offset);
    }
}

/// Interactive reslice state shared by the router and the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceState {
    pub planes: ReslicePlaneSet,
    pub slider: SliderState,
}

impl SliceState {
    pub fn new(planes: ReslicePlaneSet, slider: SliderState) -> Self {
        let mut state = Self { planes, slider };
        SliderBinding::apply(&state.slider, &mut state.planes);
        state
    }

    pub fn active(&self) -> Orientation {
        self.planes.active()
    }

    /// Cycles to the next axis and recenters the slider so the new plane does
    /// not inherit the previous axis' position.
    pub fn switch_axis(&mut self) -> Orientation {
        let next = self.planes.next_axis();
        self.activate(next);
        next
    }

    pub fn activate(&mut self, axis: Orientation) {
        self.planes.activate(axis);
        self.slider.reset();
        SliderBinding::apply(&self.slider, &mut self.planes);
        tracing::info!(axis = axis.title(), "switched reslice axis");
    }

    /// One drag tick: store the value, move the plane.
    pub fn drag_slider(&mut self, value: f64) {
        self.slider.set_value(value);
        SliderBinding::apply(&self.slider, &mut self.planes);
    }
}

/// On-screen placement of the slider, in display pixels with the origin at
/// the bottom-left corner of the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderWidget {
    pub point1: [f64; 2],
    pub point2: [f64; 2],
    /// Pick distance around the track, in pixels.
    pub tolerance: f64,
}

impl Default for SliderWidget {
    fn default() -> Self {
        Self {
            point1: [60.0, 450.0],
            point2: [260.0, 450.0],
            tolerance: 8.0,
        }
    }
}

impl SliderWidget {
    /// Whether a display position falls on the track.
    pub fn hit(&self, [x, y]: [f64; 2]) -> bool {
        let [x1, y1] = self.point1;
        let [x2, y2] = self.point2;
        let (dx, dy) = (x2 - x1, y2 - y1);
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return false;
        }
        let t = ((x - x1) * dx + (y - y1) * dy) / len_sq;
        if !(-0.02..=1.02).contains(&t) {
            return false;
        }
        let (px, py) = (x1 + t * dx, y1 + t * dy);
        ((x - px).powi(2) + (y - py).powi(2)).sqrt() <= self.tolerance
    }

    /// Slider value for a pointer position, projected onto the track.
    pub fn value_at(&self, [x, y]: [f64; 2], slider: &SliderState) -> f64 {
        let [x1, y1] = self.point1;
        let [x2, y2] = self.point2;
        let (dx, dy) = (x2 - x1, y2 - y1);
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq == 0.0 {
            0.0
        } else {
            (((x - x1) * dx + (y - y1) * dy) / len_sq).clamp(0.0, 1.0)
        };
        slider.min() + t * (slider.max() - slider.min())
    }

    /// Display position of the knob for the slider's current value.
    pub fn knob(&self, slider: &SliderState) -> [f64; 2] {
        let span = slider.max() - slider.min();
        let t = if span == 0.0 {
            0.0
        } else {
            (slider.value() - slider.min()) / span
        };
        [
            self.point1[0] + t * (self.point2[0] - self.point1[0]),
            self.point1[1] + t * (self.point2[1] - self.point1[1]),
        ]
    }

    /// Rescales the widget from one window size to another.
    pub fn scaled(&self, from: [f64; 2], to: [f64; 2]) -> Self {
        let sx = to[0] / from[0];
        let sy = to[1] / from[1];
        Self {
            point1: [self.point1[0] * sx, self.point1[1] * sy],
            point2: [self.point2[0] * sx, self.point2[1] * sy],
            tolerance: self.tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Extent, Geometry};
    use proptest::prelude::*;

    fn geometry(origin: [f64; 3]) -> Geometry {
        Geometry::new(
            Extent {
                min: [0, 0, 0],
                max: [199, 199, 99],
            },
            [1.0, 1.0, 2.0],
            origin,
        )
    }

    fn state(axis: Orientation) -> SliceState {
        SliceState::new(
            ReslicePlaneSet::from_geometry(&geometry([0.0; 3]), axis),
            SliderState::default(),
        )
    }

    #[test]
    fn default_slider_sits_at_midpoint() {
        let slider = SliderState::default();
        assert_eq!(slider.value(), 50.0);
        assert_eq!(slider.ratio(), 0.5);
    }

    #[test]
    fn value_is_clamped_to_bounds() {
        let mut slider = SliderState::default();
        slider.set_value(150.0);
        assert_eq!(slider.value(), 100.0);
        slider.set_value(-3.0);
        assert_eq!(slider.value(), 0.0);
    }

    #[test]
    fn ratio_divides_by_max_not_range() {
        let mut slider = SliderState::new(20.0, 100.0);
        slider.set_value(60.0);
        assert_eq!(slider.ratio(), 0.4);
    }

    #[test]
    fn midpoint_slider_translates_by_half_the_axis_size() {
        let s = state(Orientation::Axial);
        // z translation takes origin[0] + size[0] / 2, not the z center.
        assert_eq!(s.planes.center(Orientation::Axial), [99.5, 99.5, 99.5]);
    }

    #[test]
    fn drag_maps_to_ratio_of_the_axis_size() {
        let mut s = state(Orientation::Axial);
        s.drag_slider(100.0);
        assert_eq!(s.planes.offset(Orientation::Axial), 199.0);
        s.drag_slider(0.0);
        assert_eq!(s.planes.center(Orientation::Axial)[2], 0.0);
    }

    #[test]
    fn translation_uses_the_origin_of_the_active_axis() {
        let origin = [-10.0, 5.0, 0.0];
        let g = geometry(origin);
        let size = g.size();
        for axis in Orientation::ALL {
            let mut s = SliceState::new(ReslicePlaneSet::from_geometry(&g, axis), SliderState::default());
            for value in [0.0, 25.0, 100.0] {
                s.drag_slider(value);
                let a = axis.index();
                let expected = origin[a] + s.slider.ratio() * size[a];
                assert_eq!(s.planes.matrix(axis).w_axis[2 - a], expected, "{axis:?} at {value}");
            }
        }
    }

    #[test]
    fn three_switches_return_to_start_and_reset_slider_each_time() {
        for start in Orientation::ALL {
            let mut s = state(start);
            for _ in 0..3 {
                s.drag_slider(87.0);
                s.switch_axis();
                assert_eq!(s.slider.value(), (s.slider.max() - s.slider.min()) / 2.0);
                let axis = s.active();
                assert_eq!(
                    s.planes.offset(axis),
                    0.5 * s.planes.physical_size(axis)
                );
            }
            assert_eq!(s.active(), start);
        }
    }

    #[test]
    fn widget_maps_track_ends_to_bounds() {
        let widget = SliderWidget::default();
        let slider = SliderState::default();
        assert_eq!(widget.value_at([60.0, 450.0], &slider), 0.0);
        assert_eq!(widget.value_at([260.0, 452.0], &slider), 100.0);
        assert_eq!(widget.value_at([160.0, 450.0], &slider), 50.0);
        assert_eq!(widget.value_at([0.0, 450.0], &slider), 0.0);
        assert_eq!(widget.knob(&slider), [160.0, 450.0]);
    }

    #[test]
    fn widget_hit_respects_tolerance() {
        let widget = SliderWidget::default();
        assert!(widget.hit([100.0, 455.0]));
        assert!(!widget.hit([100.0, 470.0]));
        assert!(!widget.hit([300.0, 450.0]));
    }

    proptest! {
        #[test]
        fn offset_is_monotonic_in_slider_value(
            a in 0.0f64..=100.0,
            b in 0.0f64..=100.0,
            axis in 0usize..3,
        ) {
            let axis = Orientation::ALL[axis];
            let mut s = state(axis);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            s.drag_slider(lo);
            let low = s.planes.offset(axis);
            s.drag_slider(hi);
            let high = s.planes.offset(axis);
            prop_assert!(low <= high);
        }
    }
}
