mod keymap;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use cubefield_input::InputState;
use cubefield_kernel::{FrameContext, Game, SceneConfig};
use cubefield_render::{CameraUniforms, InstancedRenderer, RenderError};
use cubefield_render_wgpu::WgpuContext;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::keymap::{action_for_key, is_look_button};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.15,
    a: 1.0,
};

#[derive(Parser)]
#[command(name = "cubefield-desktop", about = "Fly around a field of instanced cubes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Scene description (YAML). Defaults to the three-cube scene.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Initial window width
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 600)]
    height: u32,
}

/// Counts frames and reports the rate about once per second.
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            since: now,
        }
    }

    fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.since);
        if elapsed < Self::WINDOW {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.since = now;
        Some(fps)
    }
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    context: Rc<WgpuContext>,
    renderer: InstancedRenderer,
}

struct App {
    game: Game,
    input: InputState,
    initial_size: PhysicalSize<u32>,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    last_frame: Instant,
    fps: FpsCounter,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(scene: &SceneConfig, initial_size: PhysicalSize<u32>) -> Self {
        let now = Instant::now();
        Self {
            game: Game::new(scene),
            input: InputState::new(),
            initial_size,
            window: None,
            gpu: None,
            last_frame: now,
            fps: FpsCounter::new(now),
            error: None,
        }
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("cubefield")
            .with_inner_size(self.initial_size);
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no compatible GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("cubefield_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no texture formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        self.game
            .set_aspect_ratio(config.width as f32 / config.height as f32);

        let context = Rc::new(WgpuContext::new(
            device,
            queue,
            surface_format,
            config.width,
            config.height,
        ));
        let renderer = InstancedRenderer::new(context.clone())?;

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        self.window = Some(window);
        self.gpu = Some(Gpu {
            surface,
            config,
            context,
            renderer,
        });
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        gpu.config.width = size.width.max(1);
        gpu.config.height = size.height.max(1);
        gpu.surface.configure(gpu.context.device(), &gpu.config);
        gpu.context.resize(gpu.config.width, gpu.config.height);
        self.game
            .set_aspect_ratio(size.width as f32 / size.height.max(1) as f32);
    }

    fn render_frame(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        self.game.update(&FrameContext::new(dt, &self.input));
        self.input.end_frame();

        let Some(gpu) = &mut self.gpu else {
            return Ok(());
        };
        let output = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(gpu.context.device(), &gpu.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(RenderError::Surface("out of memory".to_string()).into());
            }
            Err(e) => {
                tracing::warn!("surface error: {e}");
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let camera = CameraUniforms::from(&self.game.camera_data()?);
        gpu.context.begin_frame(CLEAR_COLOR);
        let stats = gpu.renderer.draw(&self.game.instances(), &camera);
        gpu.context.end_frame(&view)?;
        output.present();

        if let Some(fps) = self.fps.tick(now) {
            tracing::info!(instances = stats.instance_count, "FPS: {fps:.2}");
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        tracing::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_gpu(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.resize(new_size);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        ..
                    },
                ..
            } => {
                let pressed = state == ElementState::Pressed;
                if key == KeyCode::Escape && pressed {
                    event_loop.exit();
                    return;
                }
                if let Some(action) = action_for_key(key) {
                    if pressed {
                        self.input.press(action);
                    } else {
                        self.input.release(action);
                    }
                }
            }
            WindowEvent::MouseInput { button, state, .. } if is_look_button(button) => {
                let held = state == ElementState::Pressed;
                self.input.set_look_held(held);
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!held);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.render_frame() {
                    self.fail(event_loop, err);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.add_mouse_delta(delta.0 as f32, delta.1 as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let scene = match &cli.scene {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    tracing::info!("cubefield-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&scene, PhysicalSize::new(cli.width, cli.height));
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_reported_once_per_second() {
        let start = Instant::now();
        let mut fps = FpsCounter::new(start);
        for i in 1..60 {
            assert_eq!(fps.tick(start + Duration::from_millis(i * 16)), None);
        }
        let rate = fps.tick(start + Duration::from_secs(1)).unwrap();
        assert!((rate - 60.0).abs() < 1e-3, "{rate}");
        assert_eq!(fps.tick(start + Duration::from_millis(1010)), None);
    }

    #[test]
    fn cli_defaults_to_800_by_600() {
        let cli = Cli::parse_from(["cubefield-desktop"]);
        assert_eq!((cli.width, cli.height), (800, 600));
        assert!(cli.scene.is_none());
        assert!(!cli.verbose);
    }
}
