//! Attractor Particle Cloud
//!
//! A cube of particles falling around fixed attractors. The integration step
//! runs on the GPU (or the rayon pool) once per redraw, and the result is
//! drawn straight from the simulation's buffers.

mod config;

use anyhow::{Context, Result};
use attractor_physics::ParticleStore;
use attractor_renderer::{PointRenderer, RenderError};
use attractor_simulation::{
    Backend, CpuSimulation, FrameDriver, FrameInput, FrameOutcome, FrameSink, GpuSimulation,
    Integrator, SimulationError,
};
use clap::Parser;
use config::{AppConfig, BackendKind, Cli};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    driver: FrameDriver<Backend>,
    renderer: PointRenderer,

    frame_times: VecDeque<f32>,
    last_frame_time: Instant,
}

/// Render half of a frame, targeting the window surface
struct SurfacePresenter<'a> {
    surface: &'a wgpu::Surface<'static>,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    renderer: &'a mut PointRenderer,
    viewport: (u32, u32),
    output: Option<wgpu::SurfaceTexture>,
}

impl FrameSink for SurfacePresenter<'_> {
    type Error = RenderError;

    fn draw(&mut self, frame: &FrameInput<'_>) -> Result<(), RenderError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.renderer
            .render(self.device, self.queue, &view, frame, self.viewport)?;
        self.output = Some(output);
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if let Some(output) = self.output.take() {
            output.present();
        }
        Ok(())
    }
}

impl GpuState {
    async fn new(window: Arc<Window>, app_config: &AppConfig) -> Result<Self> {
        let size = window.inner_size();

        let particle_count = u32::try_from(app_config.particle_count())
            .with_context(|| format!("grid resolution {} is too large", app_config.resolution))?;

        // Create wgpu instance
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create window surface")?;

        // Request adapter
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;

        log::info!("Using GPU: {}", adapter.get_info().name);

        // Large grids need more than the default storage binding size
        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                    max_buffer_size: adapter_limits.max_buffer_size,
                    ..wgpu::Limits::default()
                },
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to acquire GPU device")?;

        // Configure surface
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no texture formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let store = ParticleStore::grid(app_config.resolution)?;
        log::info!(
            "Initialized {} particles on a {}³ grid",
            store.len(),
            app_config.resolution
        );

        let backend = match app_config.backend {
            BackendKind::Gpu => {
                Backend::Gpu(GpuSimulation::new(device.clone(), queue.clone(), &store).await?)
            }
            BackendKind::Cpu => Backend::Cpu(CpuSimulation::new(store)),
        };
        log::info!("Simulation initialized ({} backend)", backend.name());

        let mut renderer = PointRenderer::new(&device, config.format, app_config.style()).await?;
        if let Backend::Cpu(_) = backend {
            renderer
                .reserve_host_particles(&device, particle_count)
                .await?;
        }
        log::info!("Renderer initialized");

        let mut reports = renderer.compile_reports().to_vec();
        if let Backend::Gpu(sim) = &backend {
            reports.push(sim.compile_report());
        }
        let unlinked: Vec<&str> = reports
            .iter()
            .filter(|report| !report.linked)
            .map(|report| report.label.as_str())
            .collect();
        if !unlinked.is_empty() {
            log::warn!("Running without: {}", unlinked.join(", "));
        }

        let driver = FrameDriver::new(
            backend,
            app_config.field()?,
            app_config.integration_params(),
            app_config.scene_params(),
        )
        .with_animation(app_config.animation());

        Ok(Self {
            surface,
            device,
            queue,
            config,
            driver,
            renderer,
            frame_times: VecDeque::with_capacity(100),
            last_frame_time: Instant::now(),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Run one driver frame. Returns `(fps, avg_frame_time_ms)`, or `None`
    /// once the driver has stopped.
    fn render(&mut self) -> Result<Option<(f32, f32)>, RenderError> {
        let mut presenter = SurfacePresenter {
            surface: &self.surface,
            device: &self.device,
            queue: &self.queue,
            renderer: &mut self.renderer,
            viewport: (self.config.width, self.config.height),
            output: None,
        };
        if self.driver.run_frame(&mut presenter)? == FrameOutcome::Stopped {
            return Ok(None);
        }

        // Track frame time
        let now = Instant::now();
        let frame_time = (now - self.last_frame_time).as_secs_f32() * 1000.0;
        self.last_frame_time = now;

        self.frame_times.push_back(frame_time);
        if self.frame_times.len() > 100 {
            self.frame_times.pop_front();
        }

        let avg_frame_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        let fps = 1000.0 / avg_frame_time;
        Ok(Some((fps, avg_frame_time)))
    }
}

struct App {
    config: AppConfig,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    // Fatal error to hand back from main once the event loop returns
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            window: None,
            gpu_state: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        if let Some(gpu_state) = &mut self.gpu_state {
            gpu_state.driver.stop();
        }
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let [width, height] = self.config.window_size;
        let window_attributes = Window::default_attributes()
            .with_title("Attractors")
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        self.window = Some(window.clone());

        match pollster::block_on(GpuState::new(window, &self.config)) {
            Ok(gpu_state) => self.gpu_state = Some(gpu_state),
            Err(e) => self.fail(event_loop, e.context("startup failed")),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.driver.stop();
                }
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }

            WindowEvent::RedrawRequested => {
                let (Some(window), Some(gpu_state)) = (&self.window, &mut self.gpu_state) else {
                    return;
                };
                match gpu_state.render() {
                    Ok(Some((fps, frame_time))) => {
                        window.set_title(&format!(
                            "Attractors - {:.0} FPS ({:.2}ms) - {} particles ({})",
                            fps,
                            frame_time,
                            gpu_state.driver.integrator().particle_count(),
                            gpu_state.driver.integrator().name()
                        ));
                    }
                    Ok(None) => {}
                    Err(RenderError::Surface(
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                    )) => gpu_state.resize(window.inner_size()),
                    Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                        log::warn!("Surface timed out, frame dropped");
                    }
                    Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                        gpu_state.driver.stop();
                        event_loop.exit();
                    }
                    Err(RenderError::Simulation(SimulationError::Poll(e))) => {
                        self.fail(event_loop, anyhow::Error::new(e).context("device lost"));
                    }
                    Err(e) => self.fail(event_loop, e.into()),
                }
            }

            _ => {}
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.resolve()?;

    log::info!(
        "Starting attractor simulation: {} particles, {:?} backend",
        config.particle_count(),
        config.backend
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
