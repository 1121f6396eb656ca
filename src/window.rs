use std::sync::Arc;
use std::time::Instant;

use windflow::{
    DemoConfig, GpuError, ParticleConfig, SimulationError, VelocityField, Viewport, WindLayer,
};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.03,
    b: 0.06,
    a: 1.0,
};

/// Particle count change per `+`/`-` press.
const PARTICLE_STEP: u32 = 1000;

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    layer: WindLayer,
    pub viewport: Viewport,
}

impl GpuState {
    pub async fn new(
        window: Arc<Window>,
        demo: &DemoConfig,
        field: VelocityField,
    ) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let viewport = Viewport::new(
            demo.view.center(),
            demo.view.zoom,
            config.width,
            config.height,
        );

        let mut layer = WindLayer::new(surface_format);
        layer.update(&device, &queue, demo.particles.clone(), Some(field))?;

        Ok(Self {
            surface,
            device,
            queue,
            config,
            layer,
            viewport,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.viewport.resize(new_size.width, new_size.height);
        }
    }

    /// Re-apply a configuration to the current field.
    pub fn apply(&mut self, config: ParticleConfig) -> Result<(), GpuError> {
        let field = self.layer.field().cloned();
        self.layer.update(&self.device, &self.queue, config, field)
    }

    pub fn particle_config(&self) -> &ParticleConfig {
        self.layer.config()
    }

    pub fn toggle_animate(&mut self) {
        let animate = !self.layer.config().animate;
        self.layer.set_animate(animate, Instant::now());
        log::info!("animation {}", if animate { "on" } else { "off" });
    }

    pub fn reset(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Reset Encoder"),
            });
        self.layer.reset(&mut encoder);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKGROUND),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        self.layer
            .frame(&self.queue, &mut encoder, &self.viewport, Instant::now());
        self.layer
            .draw(&self.queue, &mut encoder, &view, &self.viewport);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

pub struct App {
    demo: DemoConfig,
    field: Option<VelocityField>,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    /// First fatal error, reported once the event loop returns.
    pub error: Option<SimulationError>,
}

impl App {
    pub fn new(demo: DemoConfig, field: VelocityField) -> Self {
        Self {
            demo,
            field: Some(field),
            window: None,
            gpu_state: None,
            mouse_pressed: false,
            last_mouse_pos: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SimulationError) {
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let Some(gpu_state) = &mut self.gpu_state else {
            return;
        };
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };

        let count = gpu_state.particle_config().num_particles;
        let result = match code {
            KeyCode::Space => {
                gpu_state.toggle_animate();
                Ok(())
            }
            KeyCode::KeyR => {
                gpu_state.reset();
                Ok(())
            }
            KeyCode::Equal | KeyCode::NumpadAdd => {
                let config = gpu_state
                    .particle_config()
                    .clone()
                    .with_num_particles(count.saturating_add(PARTICLE_STEP));
                gpu_state.apply(config)
            }
            KeyCode::Minus | KeyCode::NumpadSubtract => {
                let config = gpu_state
                    .particle_config()
                    .clone()
                    .with_num_particles(count.saturating_sub(PARTICLE_STEP));
                gpu_state.apply(config)
            }
            KeyCode::Escape => {
                event_loop.exit();
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.fail(event_loop, err.into());
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(field) = self.field.take() else {
            return;
        };

        let window_attrs = Window::default_attributes()
            .with_title("windflow")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, err.into());
                return;
            }
        };
        self.window = Some(window.clone());

        match pollster::block_on(GpuState::new(window, &self.demo, field)) {
            Ok(state) => self.gpu_state = Some(state),
            Err(err) => self.fail(event_loop, err.into()),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event_loop, &event);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        let dx = (position.x - last_x) as f32;
                        let dy = (position.y - last_y) as f32;
                        if let Some(gpu_state) = &mut self.gpu_state {
                            gpu_state.viewport.pan_pixels(dx, dy);
                        }
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
                };
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.viewport.zoom_by(scroll * 0.25);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    match gpu_state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            gpu_state.resize(winit::dpi::PhysicalSize {
                                width: gpu_state.config.width,
                                height: gpu_state.config.height,
                            })
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("surface out of memory, exiting");
                            event_loop.exit();
                        }
                        Err(e) => log::error!("render error: {e:?}"),
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
