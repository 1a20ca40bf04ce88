//! Platform layer: window, event loop and the per-frame sequence
//! input -> simulate -> draw -> present.
//! winit = 0.30.x

pub mod input;
pub mod scene;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use corelib::config::EngineConfig;
use renderer::{GpuError, WgpuDevice};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

pub use input::{InputState, MouseTracker, apply_camera_keys};
pub use scene::Scene;

/// Open a window, load the configured model and run until the window closes.
pub fn run_with_renderer(config: EngineConfig, backends: wgpu::Backends) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, backends);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    config: EngineConfig,
    backends: wgpu::Backends,
    window: Option<Arc<Window>>,
    gpu: Option<WgpuDevice>,
    scene: Scene,
    input: InputState,
    mouse: MouseTracker,
    last_frame: Instant,
    frames: u64,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: EngineConfig, backends: wgpu::Backends) -> Self {
        let scene = Scene::new(&config);
        Self {
            config,
            backends,
            window: None,
            gpu: None,
            scene,
            input: InputState::new(),
            mouse: MouseTracker::default(),
            last_frame: Instant::now(),
            frames: 0,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Gyro3D")
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );
        let size = window.inner_size();
        log::info!("Window created: {}x{}", size.width, size.height);

        let mut gpu = pollster::block_on(WgpuDevice::new(window.clone(), self.backends))
            .context("failed to initialise wgpu")?;

        let obj = self.config.obj_path.clone();
        let mtl = self.config.mtl_path.clone();
        self.scene.load_model(&mut gpu, &obj, &mtl);
        if self.config.show_axes {
            self.scene.add_axes(&mut gpu);
        }

        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if self.input.is_key_pressed(KeyCode::Escape) {
            event_loop.exit();
            return;
        }
        apply_camera_keys(&self.input, &mut self.scene.camera, dt);
        self.scene.update(dt);

        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        gpu.begin_frame();
        self.scene.draw(gpu);
        match gpu.end_frame() {
            Ok(()) => self.frames += 1,
            Err(e) if WgpuDevice::is_surface_lost(&e) => {
                log::warn!("Surface lost/outdated. Recreating.");
                gpu.recreate_surface();
            }
            Err(GpuError::Surface(wgpu::SurfaceError::Timeout)) => {
                log::warn!("Surface timeout, skipping frame");
            }
            Err(e) => {
                self.fail(event_loop, anyhow!(e).context("frame failed"));
            }
        }
        self.input.update();
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(code) = event.physical_key {
            self.input
                .handle_key(code, event.state == ElementState::Pressed);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::debug!("Resized: {}x{}", size.width, size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((dx, dy)) = self.mouse.moved_to(position.x, position.y) {
                    self.scene.camera.process_mouse_movement(dx, dy, true);
                }
            }
            WindowEvent::CursorLeft { .. } => self.mouse.reset(),
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / 120.0) as f32,
                };
                self.scene.camera.process_mouse_scroll(lines);
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = self.gpu.as_mut() {
            self.scene.shutdown(gpu);
        }
        log::info!("Rendered {} frame(s)", self.frames);
    }
}
