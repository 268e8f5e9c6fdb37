//! Pointer and keyboard routing between the two viewports.
//!
//! The router is a two-state machine re-evaluated on every pointer move: the
//! viewport under the pointer decides whether gestures are interpreted as 2D
//! image navigation (slice view) or 3D orbiting (volume view). All callback
//! state lives in [`ViewState`] and is passed in by exclusive reference.

use crate::enums::Orientation;
use crate::layout::{ViewportKind, ViewportLayout};
use crate::render::camera::{OrbitCamera, SliceCamera};
use crate::render::slice::units_per_pixel;
use crate::slider::{SliceState, SliderWidget};

/// Gesture semantics bound to a viewport.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Image style: pan and zoom, right click switches the reslice axis.
    Slice,
    /// Orbit style: rotate and zoom around the volume.
    #[default]
    Volume,
}

impl From<ViewportKind> for InteractionMode {
    fn from(kind: ViewportKind) -> Self {
        match kind {
            ViewportKind::Slice => InteractionMode::Slice,
            ViewportKind::Volume => InteractionMode::Volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
}

/// Window-system independent input, positions in display pixels with the
/// origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove([f64; 2]),
    ButtonPress(PointerButton),
    ButtonRelease(PointerButton),
    /// Positive values zoom in.
    Scroll(f64),
    Key(Key),
    Resize([u32; 2]),
}

/// What the caller has to do after an event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub redraw: bool,
    pub quit: bool,
    pub axis_changed: Option<Orientation>,
}

impl Response {
    fn redraw() -> Self {
        Self {
            redraw: true,
            ..Self::default()
        }
    }
}

/// Everything the event callbacks are allowed to mutate.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub slice: SliceState,
    pub slice_camera: SliceCamera,
    pub orbit_camera: OrbitCamera,
    pub layout: ViewportLayout,
    pub window: [u32; 2],
    pub slider_widget: SliderWidget,
    base_window: [u32; 2],
    base_widget: SliderWidget,
}

impl ViewState {
    pub fn new(
        slice: SliceState,
        layout: ViewportLayout,
        window: [u32; 2],
        slider_widget: SliderWidget,
    ) -> Self {
        Self {
            slice,
            slice_camera: SliceCamera::default(),
            orbit_camera: OrbitCamera::default(),
            layout,
            window,
            slider_widget,
            base_window: window,
            base_widget: slider_widget,
        }
    }

    /// Applies a new window size, keeping the slider at the same relative
    /// position.
    pub fn resize(&mut self, window: [u32; 2]) {
        self.window = [window[0].max(1), window[1].max(1)];
        self.slider_widget = self.base_widget.scaled(
            self.base_window.map(f64::from),
            self.window.map(f64::from),
        );
    }
}

/// Selects the interaction mode for a pointer move.
///
/// The hit test deliberately combines the *current* x with the *previous* y.
/// Positions outside both viewports fall back to orbit style.
pub fn pick_mode(
    layout: &ViewportLayout,
    window: [u32; 2],
    current: [f64; 2],
    previous: [f64; 2],
) -> InteractionMode {
    layout
        .find_poked([current[0], previous[1]], window)
        .map_or(InteractionMode::Volume, InteractionMode::from)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Capture {
    #[default]
    None,
    Slider,
    Drag(PointerButton),
}

#[derive(Debug, Default)]
pub struct InteractionRouter {
    mode: InteractionMode,
    position: Option<[f64; 2]>,
    capture: Capture,
}

impl InteractionRouter {
    const ZOOM_STEP: f64 = 1.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn slider_captured(&self) -> bool {
        self.capture == Capture::Slider
    }

    pub fn handle(&mut self, event: InputEvent, state: &mut ViewState) -> Response {
        match event {
            InputEvent::PointerMove(position) => self.on_move(position, state),
            InputEvent::ButtonPress(button) => self.on_press(button, state),
            InputEvent::ButtonRelease(button) => self.on_release(button, state),
            InputEvent::Scroll(delta) => self.on_scroll(delta, state),
            InputEvent::Key(key) => self.on_key(key, state),
            InputEvent::Resize(window) => {
                state.resize(window);
                Response::redraw()
            }
        }
    }

    fn on_move(&mut self, position: [f64; 2], state: &mut ViewState) -> Response {
        let previous = self.position.unwrap_or(position);
        self.position = Some(position);

        if self.capture == Capture::Slider {
            let value = state.slider_widget.value_at(position, &state.slice.slider);
            state.slice.drag_slider(value);
            return Response::redraw();
        }

        let mode = pick_mode(&state.layout, state.window, position, previous);
        if mode != self.mode {
            tracing::trace!(?mode, "interaction mode changed");
            self.mode = mode;
        }

        let delta = [position[0] - previous[0], position[1] - previous[1]];
        match (self.capture, self.mode) {
            (Capture::Drag(PointerButton::Left | PointerButton::Middle), InteractionMode::Slice) => {
                let rect = state.layout.slice.pixel_rect(state.window);
                let units = units_per_pixel(
                    &state.slice.planes,
                    [rect.width, rect.height],
                    state.slice_camera.zoom,
                );
                state.slice_camera.pan_by(delta, units);
                Response::redraw()
            }
            (Capture::Drag(PointerButton::Left), InteractionMode::Volume) => {
                state.orbit_camera.orbit(delta);
                Response::redraw()
            }
            _ => Response::default(),
        }
    }

    fn on_press(&mut self, button: PointerButton, state: &mut ViewState) -> Response {
        let position = self.position.unwrap_or_default();
        if button == PointerButton::Left && state.slider_widget.hit(position) {
            self.capture = Capture::Slider;
            let value = state.slider_widget.value_at(position, &state.slice.slider);
            state.slice.drag_slider(value);
            return Response::redraw();
        }
        self.capture = Capture::Drag(button);
        Response::default()
    }

    fn on_release(&mut self, button: PointerButton, state: &mut ViewState) -> Response {
        let was = std::mem::take(&mut self.capture);
        if was == Capture::Slider {
            return Response::redraw();
        }
        if button == PointerButton::Right && self.mode == InteractionMode::Slice {
            let axis = state.slice.switch_axis();
            state.slice_camera.reset();
            return Response {
                redraw: true,
                quit: false,
                axis_changed: Some(axis),
            };
        }
        Response::default()
    }

    fn on_scroll(&mut self, delta: f64, state: &mut ViewState) -> Response {
        if delta == 0.0 {
            return Response::default();
        }
        let factor = Self::ZOOM_STEP.powf(delta.signum());
        match self.mode {
            InteractionMode::Slice => state.slice_camera.zoom_by(factor),
            InteractionMode::Volume => state.orbit_camera.zoom_by(factor),
        }
        Response::redraw()
    }

    fn on_key(&mut self, key: Key, state: &mut ViewState) -> Response {
        match key {
            Key::Escape | Key::Char('q') => Response {
                quit: true,
                ..Response::default()
            },
            Key::Char('r') => {
                match self.mode {
                    InteractionMode::Slice => state.slice_camera.reset(),
                    InteractionMode::Volume => state.orbit_camera.reset(),
                }
                Response::redraw()
            }
            _ => Response::default(),
        }
    }
}
