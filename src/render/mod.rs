//! CPU rendering of the dual-view frame.
//!
//! The slice viewport shows the active reslice plane through a grayscale
//! lookup table with the mask blended on top; the volume viewport ray casts
//! the source volume (and the mask, when present) with an orbit camera. The
//! slider is drawn last, in window coordinates.

pub mod camera;
pub mod lut;
pub mod raycast;
pub mod slice;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;
use web_time::Instant;

use crate::enums::Interpolation;
use crate::layout::{PixelRect, ViewportKind, ViewportLayout};
use crate::pipeline::SegmentationMask;
use crate::router::ViewState;
use crate::slider::{SliderState, SliderWidget};
use crate::volume::Volume;

use self::lut::{LookupTable, MaskLookup, TransferFunction};
use self::raycast::{RayCaster, Subject, to_rgba};
use self::slice::{ResliceGrid, reslice, units_per_pixel};

/// Appearance of both viewports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Initial window size `[width, height]`.
    pub window: [u32; 2],
    pub background: [f32; 3],
    pub layout: ViewportLayout,
    pub slider: SliderWidget,
    pub slice_lut: LookupTable,
    pub mask_lut: MaskLookup,
    pub slice_interpolation: Interpolation,
    /// Fraction of the intensity range hidden in the volume view.
    pub volume_opacity_floor: f64,
    pub volume_max_opacity: f32,
    pub mask_volume_color: [f32; 3],
    pub mask_volume_opacity: f32,
    pub max_samples: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            window: [400, 800],
            background: [0.0, 0.01, 0.05],
            layout: ViewportLayout::default(),
            slider: SliderWidget::default(),
            slice_lut: LookupTable::default(),
            mask_lut: MaskLookup::default(),
            slice_interpolation: Interpolation::Linear,
            volume_opacity_floor: 0.25,
            volume_max_opacity: 0.08,
            mask_volume_color: [0.9, 0.3, 0.1],
            mask_volume_opacity: 0.6,
            max_samples: 256,
        }
    }
}

const TRACK: Rgba<u8> = Rgba([170, 170, 170, 255]);
const KNOB: Rgba<u8> = Rgba([240, 240, 80, 255]);

/// Renders the slice and volume viewports of one window into a single frame.
pub struct DualViewRenderer {
    settings: RenderSettings,
    volume: Volume<i16>,
    mask: Option<SegmentationMask>,
    volume_tf: TransferFunction,
    mask_tf: TransferFunction,
    caster: RayCaster,
}

impl DualViewRenderer {
    pub fn new(settings: RenderSettings, volume: Volume<i16>, mask: Option<SegmentationMask>) -> Self {
        let (min, max) = volume.min_max();
        let volume_tf = TransferFunction::background_suppressing(
            min,
            max,
            settings.volume_opacity_floor,
            settings.volume_max_opacity,
        );
        let mask_max = mask
            .as_ref()
            .map(|m| m.volume().min_max().1)
            .unwrap_or(1.0)
            .max(1.0);
        let mask_tf = TransferFunction::highlight(
            settings.mask_volume_color,
            settings.mask_volume_opacity,
            mask_max,
        );
        let caster = RayCaster {
            max_samples: settings.max_samples,
            background: settings.background,
        };
        Self {
            settings,
            volume,
            mask,
            volume_tf,
            mask_tf,
            caster,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn volume(&self) -> &Volume<i16> {
        &self.volume
    }

    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    /// Composes a full frame for the current view state.
    pub fn render(&self, state: &ViewState) -> RgbaImage {
        let start = Instant::now();
        let [width, height] = [state.window[0].max(1), state.window[1].max(1)];
        let background = to_rgba(self.settings.background);
        let mut frame = RgbaImage::from_pixel(width, height, Rgba(background));

        let slice_rect = state.layout.viewport(ViewportKind::Slice).pixel_rect([width, height]);
        let pixels = self.render_slice(state, slice_rect);
        blit(&mut frame, slice_rect, &pixels);

        let volume_rect = state.layout.viewport(ViewportKind::Volume).pixel_rect([width, height]);
        let pixels = self.render_volume(state, volume_rect);
        blit(&mut frame, volume_rect, &pixels);

        draw_slider(&mut frame, &state.slider_widget, &state.slice.slider);

        debug!(
            width,
            height,
            axis = ?state.slice.active(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
            "frame rendered"
        );
        frame
    }

    fn render_slice(&self, state: &ViewState, rect: PixelRect) -> Vec<[u8; 4]> {
        if rect.width == 0 || rect.height == 0 {
            return Vec::new();
        }
        let planes = &state.slice.planes;
        let camera = &state.slice_camera;
        let grid = ResliceGrid {
            width: rect.width,
            height: rect.height,
            spacing: units_per_pixel(planes, [rect.width, rect.height], camera.zoom),
            center: camera.pan,
        };
        let axes = planes.active_matrix();
        let image = reslice(
            &self.volume,
            axes,
            &grid,
            self.settings.slice_interpolation,
            0.0,
        );
        let overlay = self
            .mask
            .as_ref()
            .map(|mask| reslice(mask.volume(), axes, &grid, Interpolation::Nearest, 0.0));

        image
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let gray = self.settings.slice_lut.map(f64::from(*value));
                let mut rgb = [gray; 3];
                let hit = overlay
                    .as_ref()
                    .and_then(|o| o.as_slice())
                    .and_then(|o| o.get(i))
                    .and_then(|m| self.settings.mask_lut.map(f64::from(*m)));
                if let Some((color, alpha)) = hit {
                    rgb = [0, 1, 2].map(|c| rgb[c] * (1.0 - alpha) + color[c] * alpha);
                }
                to_rgba(rgb)
            })
            .collect()
    }

    fn render_volume(&self, state: &ViewState, rect: PixelRect) -> Vec<[u8; 4]> {
        if rect.width == 0 || rect.height == 0 {
            return Vec::new();
        }
        let mut subjects = vec![Subject {
            volume: &self.volume,
            transfer: &self.volume_tf,
            interpolation: Interpolation::Linear,
        }];
        if let Some(mask) = &self.mask {
            subjects.push(Subject {
                volume: mask.volume(),
                transfer: &self.mask_tf,
                interpolation: Interpolation::Nearest,
            });
        }
        self.caster
            .render(&subjects, &state.orbit_camera, rect.width, rect.height)
    }
}

fn blit(frame: &mut RgbaImage, rect: PixelRect, pixels: &[[u8; 4]]) {
    if rect.width == 0 {
        return;
    }
    for (i, pixel) in pixels.iter().enumerate() {
        let x = rect.left + i as u32 % rect.width;
        let y = rect.top + i as u32 / rect.width;
        if x < frame.width() && y < frame.height() {
            frame.put_pixel(x, y, Rgba(*pixel));
        }
    }
}

/// Draws the track and knob; widget coordinates have a bottom-left origin.
fn draw_slider(frame: &mut RgbaImage, widget: &SliderWidget, slider: &SliderState) {
    let (width, height) = frame.dimensions();
    let mut dot = |[x, y]: [f64; 2], radius: i64, color: Rgba<u8>| {
        let cx = x.round() as i64;
        let cy = height as i64 - 1 - y.round() as i64;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let (px, py) = (cx + dx, cy + dy);
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    frame.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    };

    let [x1, y1] = widget.point1;
    let [x2, y2] = widget.point2;
    let steps = ((x2 - x1).abs().max((y2 - y1).abs()).ceil() as usize).max(1);
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        dot([x1 + t * (x2 - x1), y1 + t * (y2 - y1)], 1, TRACK);
    }
    dot(widget.knob(slider), 5, KNOB);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Orientation;
    use crate::planes::ReslicePlaneSet;
    use crate::slider::SliceState;
    use crate::volume::{Extent, Geometry};

    fn phantom() -> Volume<i16> {
        let g = Geometry::new(Extent::from_dims([20, 20, 10]), [1.0, 1.0, 2.0], [0.0; 3]);
        Volume::from_fn(g, |[x, y, z]| {
            let d = (x - 10).pow(2) + (y - 10).pow(2) + (2 * z - 10).pow(2);
            if d < 36 { 200 } else { 10 }
        })
        .unwrap()
    }

    fn state(volume: &Volume<i16>, settings: &RenderSettings) -> ViewState {
        let planes = ReslicePlaneSet::from_geometry(volume.geometry(), Orientation::Axial);
        ViewState::new(
            SliceState::new(planes, SliderState::default()),
            settings.layout,
            [64, 128],
            settings.slider.scaled([400.0, 800.0], [64.0, 128.0]),
        )
    }

    #[test]
    fn frame_matches_the_window() {
        let settings = RenderSettings::default();
        let volume = phantom();
        let view = state(&volume, &settings);
        let renderer = DualViewRenderer::new(settings, volume, None);
        let frame = renderer.render(&view);
        assert_eq!(frame.dimensions(), (64, 128));
    }

    #[test]
    fn mask_tints_the_slice_view() {
        let settings = RenderSettings::default();
        let volume = phantom();
        let mask = SegmentationMask::from_volume(volume.map(|v| if v > 100 { 255i16 } else { 0 }));
        let view = state(&volume, &settings);

        let plain = DualViewRenderer::new(settings.clone(), volume.clone(), None).render(&view);
        let tinted = DualViewRenderer::new(settings, volume, Some(mask)).render(&view);

        // Center of the slice viewport (lower half).
        let (x, y) = (32, 96);
        let a = plain.get_pixel(x, y).0;
        let b = tinted.get_pixel(x, y).0;
        assert_eq!(a[0], a[1]);
        assert!(b[0] > b[2], "{b:?}");
    }

    #[test]
    fn slider_knob_is_drawn() {
        let settings = RenderSettings::default();
        let volume = phantom();
        let view = state(&volume, &settings);
        let frame = DualViewRenderer::new(settings, volume, None).render(&view);
        let [kx, ky] = view.slider_widget.knob(&view.slice.slider);
        let pixel = frame.get_pixel(kx.round() as u32, 127 - ky.round() as u32);
        assert_eq!(*pixel, KNOB);
    }
}
