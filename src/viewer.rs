//! The interactive window.
//!
//! A single-threaded winit event loop owns the renderer, the view state and
//! the router. Window events are translated into [`InputEvent`]s, routed, and
//! a redraw re-renders the whole frame on the CPU before handing it to the
//! presenter.

use std::sync::Arc;

use tracing::{debug, error, info};
use web_time::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key as WinitKey, NamedKey},
    window::{Window, WindowId},
};

use crate::enums::Orientation;
use crate::error::{Error, Result};
use crate::pipeline::SegmentationMask;
use crate::planes::ReslicePlaneSet;
use crate::present::{Presented, Presenter};
use crate::render::{DualViewRenderer, RenderSettings};
use crate::router::{InputEvent, InteractionRouter, Key, PointerButton, Response, ViewState};
use crate::slider::{SliceState, SliderState};
use crate::volume::Volume;

/// Initial view: axial plane, slider centered, default cameras.
pub fn initial_state(settings: &RenderSettings, volume: &Volume<i16>) -> ViewState {
    let planes = ReslicePlaneSet::from_geometry(volume.geometry(), Orientation::Axial);
    ViewState::new(
        SliceState::new(planes, SliderState::default()),
        settings.layout,
        settings.window,
        settings.slider,
    )
}

pub fn window_title(axis: Orientation) -> String {
    format!("segview - {}", axis.title())
}

struct Viewer {
    renderer: DualViewRenderer,
    state: ViewState,
    router: InteractionRouter,
    window: Option<Arc<Window>>,
    presenter: Option<Presenter>,
    error: Option<Error>,
}

impl Viewer {
    fn apply(&mut self, response: Response, event_loop: &ActiveEventLoop) {
        if response.quit {
            info!("quit requested");
            event_loop.exit();
            return;
        }
        let Some(window) = &self.window else {
            return;
        };
        if let Some(axis) = response.axis_changed {
            window.set_title(&window_title(axis));
        }
        if response.redraw {
            window.request_redraw();
        }
    }

    fn route(&mut self, event: InputEvent, event_loop: &ActiveEventLoop) {
        let response = self.router.handle(event, &mut self.state);
        self.apply(response, event_loop);
    }

    fn redraw(&mut self) -> Result<Presented> {
        let start = Instant::now();
        let frame = self.renderer.render(&self.state);
        let presented = match &mut self.presenter {
            Some(presenter) => presenter.present(&frame)?,
            None => Presented::Dropped,
        };
        debug!(elapsed_ms = start.elapsed().as_secs_f64() * 1e3, ?presented, "redraw");
        Ok(presented)
    }

    fn fail(&mut self, err: Error, event_loop: &ActiveEventLoop) {
        error!(%err, "viewer failed");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let [width, height] = self.state.window;
        let attributes = Window::default_attributes()
            .with_title(window_title(self.state.slice.active()))
            .with_inner_size(PhysicalSize::new(width, height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(Error::RenderInitFailure(format!("window: {e}")), event_loop),
        };
        match Presenter::new(Arc::clone(&window)) {
            Ok(presenter) => {
                let size = presenter.size();
                self.presenter = Some(presenter);
                self.router.handle(InputEvent::Resize(size), &mut self.state);
            }
            Err(e) => return self.fail(e, event_loop),
        }
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(presenter) = &mut self.presenter {
                    presenter.resize([size.width, size.height]);
                }
                if size.width > 0 && size.height > 0 {
                    self.route(InputEvent::Resize([size.width, size.height]), event_loop);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                // Display coordinates have their origin at the bottom-left.
                let height = f64::from(self.state.window[1]);
                self.route(InputEvent::PointerMove([position.x, height - position.y]), event_loop);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => PointerButton::Left,
                    MouseButton::Middle => PointerButton::Middle,
                    MouseButton::Right => PointerButton::Right,
                    _ => return,
                };
                let event = match state {
                    ElementState::Pressed => InputEvent::ButtonPress(button),
                    ElementState::Released => InputEvent::ButtonRelease(button),
                };
                self.route(event, event_loop);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => f64::from(y),
                    MouseScrollDelta::PixelDelta(p) => p.y,
                };
                self.route(InputEvent::Scroll(amount), event_loop);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                let key = match logical_key {
                    WinitKey::Named(NamedKey::Escape) => Key::Escape,
                    WinitKey::Character(text) => match text.chars().next() {
                        Some(c) => Key::Char(c.to_ascii_lowercase()),
                        None => return,
                    },
                    _ => return,
                };
                self.route(InputEvent::Key(key), event_loop);
            }
            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(Presented::Shown) => {}
                Ok(Presented::Dropped) => {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
                Err(e) => self.fail(e, event_loop),
            },
            _ => {}
        }
    }
}

/// Opens the window and blocks until it is closed.
pub fn run(settings: RenderSettings, volume: Volume<i16>, mask: Option<SegmentationMask>) -> Result<()> {
    let state = initial_state(&settings, &volume);
    let renderer = DualViewRenderer::new(settings, volume, mask);
    let mut viewer = Viewer {
        renderer,
        state,
        router: InteractionRouter::new(),
        window: None,
        presenter: None,
        error: None,
    };

    let event_loop =
        EventLoop::new().map_err(|e| Error::RenderInitFailure(format!("event loop: {e}")))?;
    event_loop.set_control_flow(ControlFlow::Wait);
    info!(mask = viewer.renderer.has_mask(), "starting viewer");
    event_loop
        .run_app(&mut viewer)
        .map_err(|e| Error::RenderInitFailure(format!("event loop: {e}")))?;

    match viewer.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Extent, Geometry};

    #[test]
    fn initial_state_starts_axial_and_centered() {
        let g = Geometry::new(Extent::from_dims([20, 20, 10]), [1.0, 1.0, 2.0], [0.0; 3]);
        let volume = Volume::from_fn(g, |_| 0i16).unwrap();
        let state = initial_state(&RenderSettings::default(), &volume);
        assert_eq!(state.slice.active(), Orientation::Axial);
        assert_eq!(state.slice.slider.value(), 50.0);
        // Half of the x extent: (20 - 1) * 1.0 / 2.
        assert_eq!(state.slice.planes.offset(Orientation::Axial), 9.5);
        assert_eq!(state.window, [400, 800]);
    }

    #[test]
    fn title_follows_the_axis() {
        assert_eq!(window_title(Orientation::Coronal), "segview - Coronal - y");
    }
}
