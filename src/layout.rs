use serde::{Deserialize, Serialize};

/// Normalized rectangle `(xmin, ymin, xmax, ymax)` with the origin at the
/// bottom-left of the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Viewport {
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            min: [xmin, ymin],
            max: [xmax, ymax],
        }
    }

    /// Whether a display position (pixels, bottom-left origin) falls inside.
    /// The lower and left edges are inclusive.
    pub fn contains(&self, [x, y]: [f64; 2], [width, height]: [u32; 2]) -> bool {
        let nx = x / width as f64;
        let ny = y / height as f64;
        nx >= self.min[0] && nx < self.max[0] && ny >= self.min[1] && ny < self.max[1]
    }

    /// Pixel rectangle in image coordinates (top-left origin):
    /// `(left, top, width, height)`.
    pub fn pixel_rect(&self, [width, height]: [u32; 2]) -> PixelRect {
        let left = (self.min[0] * width as f64).round() as u32;
        let right = (self.max[0] * width as f64).round() as u32;
        let bottom = (self.min[1] * height as f64).round() as u32;
        let top = (self.max[1] * height as f64).round() as u32;
        PixelRect {
            left,
            top: height - top.min(height),
            width: right.saturating_sub(left),
            height: top.saturating_sub(bottom),
        }
    }

    pub fn area(&self) -> f64 {
        (self.max[0] - self.min[0]) * (self.max[1] - self.min[1])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Which viewport a position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportKind {
    Slice,
    Volume,
}

/// Slice view in the lower half, volume view in the upper half.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportLayout {
    pub slice: Viewport,
    pub volume: Viewport,
}

impl Default for ViewportLayout {
    fn default() -> Self {
        Self {
            slice: Viewport::new(0.0, 0.0, 1.0, 0.5),
            volume: Viewport::new(0.0, 0.5, 1.0, 1.0),
        }
    }
}

impl ViewportLayout {
    pub fn viewport(&self, kind: ViewportKind) -> &Viewport {
        match kind {
            ViewportKind::Slice => &self.slice,
            ViewportKind::Volume => &self.volume,
        }
    }

    /// Viewport under a display position, if any.
    pub fn find_poked(&self, position: [f64; 2], window: [u32; 2]) -> Option<ViewportKind> {
        if self.slice.contains(position, window) {
            Some(ViewportKind::Slice)
        } else if self.volume.contains(position, window) {
            Some(ViewportKind::Volume)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: [u32; 2] = [400, 800];

    #[test]
    fn default_layout_tiles_the_window() {
        let layout = ViewportLayout::default();
        assert_eq!(layout.slice.area() + layout.volume.area(), 1.0);
        assert_eq!(layout.slice.max[1], layout.volume.min[1]);
    }

    #[test]
    fn lower_half_is_the_slice_view() {
        let layout = ViewportLayout::default();
        assert_eq!(layout.find_poked([10.0, 10.0], WINDOW), Some(ViewportKind::Slice));
        assert_eq!(layout.find_poked([10.0, 399.0], WINDOW), Some(ViewportKind::Slice));
        assert_eq!(layout.find_poked([10.0, 400.0], WINDOW), Some(ViewportKind::Volume));
        assert_eq!(layout.find_poked([399.0, 799.0], WINDOW), Some(ViewportKind::Volume));
        assert_eq!(layout.find_poked([10.0, 800.0], WINDOW), None);
    }

    #[test]
    fn pixel_rects_flip_to_top_left_origin() {
        let layout = ViewportLayout::default();
        assert_eq!(
            layout.volume.pixel_rect(WINDOW),
            PixelRect {
                left: 0,
                top: 0,
                width: 400,
                height: 400
            }
        );
        assert_eq!(
            layout.slice.pixel_rect(WINDOW),
            PixelRect {
                left: 0,
                top: 400,
                width: 400,
                height: 400
            }
        );
    }
}
