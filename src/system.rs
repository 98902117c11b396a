//! The window and event loop.
//!
//! [`System`] is the winit application handler. It builds the window, the
//! wgpu [`Context`] and the [`Scene`] on `resumed`, feeds input to the
//! [`CameraController`] and renders a frame every time the loop goes idle.

use std::sync::Arc;

use instant::Instant;
use tokio::runtime::Runtime;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    camera::CameraController,
    config::SceneConfig,
    context::Context,
    error::{Result, SceneError},
    resources::SceneAssets,
    scene::Scene,
};

pub struct System {
    config: SceneConfig,
    async_runtime: Runtime,
    controller: CameraController,
    scene: Option<Scene<Context>>,
    last_time: Instant,
}

impl System {
    pub fn new(config: SceneConfig) -> anyhow::Result<Self> {
        let controller = CameraController::new(config.camera_speed, config.camera_sensitivity);
        Ok(Self {
            config,
            async_runtime: Runtime::new()?,
            controller,
            scene: None,
            last_time: Instant::now(),
        })
    }

    fn initialize(&self, window: Arc<Window>) -> Result<Scene<Context>> {
        let config = &self.config;
        self.async_runtime.block_on(async move {
            let context = Context::new(window, config).await?;
            let assets = SceneAssets::load(config).await?;
            Scene::initialize(context, config, assets)
        })
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(scene) = &mut self.scene else {
            return;
        };
        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();

        self.controller.update(scene.camera_mut(), dt);
        match scene.render_frame(dt.as_secs_f32() * self.config.time_scale) {
            Ok(()) => {}
            Err(SceneError::Surface(reason)) => {
                log::warn!("Surface lost ({reason}), reconfiguring");
                let size = scene.device().window().inner_size();
                scene.resize(size.width, size.height);
            }
            Err(e) if !e.is_fatal() => log::warn!("Frame skipped: {e}"),
            Err(e) => {
                log::error!("{e}");
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler for System {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scene.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Could not create the window: {e}");
                event_loop.exit();
                return;
            }
        };

        match self.initialize(window) {
            Ok(scene) => {
                scene.device().window().request_redraw();
                self.last_time = Instant::now();
                self.scene = Some(scene);
            }
            Err(e) => {
                log::error!("Scene initialisation failed: {e}");
                event_loop.exit();
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.controller.handle_mouse(dx, dy);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.scene.is_none() {
            return;
        }
        self.controller.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(scene) = &mut self.scene {
                    scene.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(scene) = &self.scene {
            scene.device().window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(scene) = self.scene.take() {
            scene.shutdown();
        }
    }
}

/// Opens the window and runs the scene until it is closed.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = System::new(config)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
