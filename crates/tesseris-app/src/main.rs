// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use anyhow::Result;
use clap::Parser;
use config::{AppCfg, Args};
use std::time::Instant;
use tesseris_core::{init_tracing, FrameClock};
use tesseris_math::FpsCamera;
use tesseris_platform::{create_window, set_cursor_grab, toggle_fullscreen, Action, InputState};
use tesseris_render::{Mesh, RenderSettings, RenderSize, Renderer, ViewState};
use tesseris_render_vk::VkRenderer;
use tracing::{error, info, warn};

use tesseris_platform::winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

// The renderer is declared before the window so it is dropped first.
struct App {
    cfg: AppCfg,
    settings: RenderSettings,
    renderer: Option<VkRenderer>,
    window: Option<Window>,

    input: InputState,
    camera: FpsCamera,
    clock: FrameClock,
    size: RenderSize,
    vsync: bool,
    paused: bool,
    running: bool,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg, settings: RenderSettings) -> Self {
        let mut camera = FpsCamera::default();
        camera.speed = cfg.camera.speed;
        camera.sensitivity = cfg.camera.sensitivity;
        Self {
            vsync: settings.vsync,
            size: RenderSize {
                width: cfg.window.width,
                height: cfg.window.height,
            },
            cfg,
            settings,
            renderer: None,
            window: None,
            input: InputState::default(),
            camera,
            clock: FrameClock::new(Instant::now()),
            paused: false,
            running: true,
            failure: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = create_window(event_loop, &self.cfg.window_settings())?;
        let inner = window.inner_size();
        self.size = RenderSize {
            width: inner.width.max(1),
            height: inner.height.max(1),
        };
        let renderer = VkRenderer::new(&window, &window, self.size, &self.settings)?;
        info!(
            "window {}x{}, vsync={}, camera speed {} sensitivity {}",
            self.size.width, self.size.height, self.vsync, self.camera.speed, self.camera.sensitivity
        );
        window.request_redraw();
        self.renderer = Some(renderer);
        self.window = Some(window);
        self.clock.reset(Instant::now());
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if !self.running {
            return;
        }
        self.running = false;
        self.renderer = None;
        self.window = None;
        event_loop.exit();
        info!("shutdown");
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        if self.failure.is_none() {
            self.failure = Some(e);
        }
        self.shutdown(event_loop);
    }

    fn grab_cursor(&mut self, grab: bool) {
        let Some(window) = &self.window else { return };
        match set_cursor_grab(window, grab) {
            Ok(()) => self.input.set_grabbed(grab),
            Err(e) => warn!("cursor grab={grab} failed: {e:#}"),
        }
    }

    fn on_action(&mut self, event_loop: &ActiveEventLoop, action: Action) {
        match action {
            Action::Quit => self.shutdown(event_loop),
            Action::ToggleFullscreen => {
                if let Some(window) = &self.window {
                    toggle_fullscreen(window);
                }
            }
            Action::ToggleVsync => {
                self.vsync = !self.vsync;
                let res = match self.renderer.as_mut() {
                    Some(r) => r.set_vsync(self.vsync),
                    None => Ok(()),
                };
                if let Err(e) = res {
                    self.fail(event_loop, e);
                }
            }
            Action::ReleaseCursor => self.grab_cursor(false),
        }
    }

    fn on_resize(&mut self, event_loop: &ActiveEventLoop, size: RenderSize) {
        self.size = size;
        let paused = size.is_zero_area();
        if paused != self.paused {
            info!("resized → {}x{} (paused={paused})", size.width, size.height);
            self.clock.reset(Instant::now());
        }
        self.paused = paused;
        let res = match self.renderer.as_mut() {
            Some(r) => r.resize(size),
            None => Ok(()),
        };
        if let Err(e) = res {
            self.fail(event_loop, e);
        }
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        if !self.running || self.paused {
            return;
        }
        let now = Instant::now();
        let dt = self.clock.tick(now);
        let (dx, dy) = self.input.take_mouse_delta();
        self.camera.look(dx, dy);
        self.camera.advance(self.input.held(), dt);

        let view = ViewState {
            view: self.camera.view(),
            camera_pos: self.camera.position,
            fov_degrees: self.cfg.camera.fov_degrees,
            near: self.cfg.camera.near,
            far: self.cfg.camera.far,
            ..ViewState::default()
        };
        let res = match self.renderer.as_mut() {
            Some(r) => r.render(&view),
            None => return,
        };
        match res {
            Ok(()) => {
                if let Some(fps) = self.clock.frame_done(now) {
                    info!("fps ~ {fps}");
                }
            }
            Err(e) => self.fail(event_loop, e.context("render")),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || !self.running {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e.context("init"));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match &self.window {
            Some(window) if window.id() == window_id => {}
            _ => return,
        }

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(s) => self.on_resize(
                event_loop,
                RenderSize {
                    width: s.width,
                    height: s.height,
                },
            ),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if let Some(action) = self.input.key(code, state, repeat) {
                    self.on_action(event_loop, action);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if !self.input.grabbed() {
                    self.grab_cursor(true);
                }
            }
            WindowEvent::Focused(false) => {
                self.input.clear();
                self.grab_cursor(false);
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input.mouse_motion(dx, dy);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.running {
            return;
        }
        if self.paused {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = AppCfg::load(&args.config);
    let mesh = match &args.mesh {
        Some(path) => {
            let mesh = Mesh::from_obj(path)?;
            info!("mesh {}: {} vertices", path.display(), mesh.vertex_count());
            Some(mesh)
        }
        None => None,
    };
    let settings = cfg.render_settings(mesh);

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg, settings);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
