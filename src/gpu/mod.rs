//! GPU particle pipeline.
//!
//! [`ParticlePipeline`] owns every device resource of one wind layer:
//!
//! - two position buffers of `num_particles * max_age` slots, used in turn
//!   as source and target of each step
//! - a per-slot color buffer fading older generations
//! - the velocity field and color ramp textures
//! - the advection compute pass and the line draw pass
//!
//! A step runs the advection pass (generation 0, source to target), copies
//! generations `0..max_age-1` of the source into `1..max_age` of the target,
//! then swaps. Drawing reads the buffer written last as current and the other
//! one as previous.

pub mod advect;
pub mod draw;
pub mod textures;

pub use advect::{generate_advect_shader, AdvectPass};
pub use draw::{generate_draw_shader, DrawPass};
pub use textures::{FieldTexture, RampTexture};

use wgpu::util::DeviceExt;

use crate::bounds::GeoBounds;
use crate::config::ParticleConfig;
use crate::error::GpuError;
use crate::field::VelocityField;
use crate::particles::{instance_colors, AdvectParams};
use crate::rules::PRIORITY;
use crate::uniforms::{AdvectUniforms, DrawUniforms};
use crate::viewport::Viewport;

/// Threads per advection workgroup.
pub const WORKGROUP_SIZE: u32 = 256;

/// Bytes per particle slot: `(lng, lat, 0)` as `f32`.
pub const SLOT_SIZE: u64 = 12;

/// Bytes per slot of the color buffer: one `vec4<f32>`.
const COLOR_SIZE: u64 = 16;

/// Reject configurations the device cannot hold before allocating anything.
pub fn check_limits(
    limits: &wgpu::Limits,
    num_particles: u32,
    max_age: u32,
    field: &VelocityField,
) -> Result<(), GpuError> {
    let exceeds = |resource, requested: u64, limit: u64| {
        if requested > limit {
            Err(GpuError::ResourceLimit {
                resource,
                requested,
                limit,
            })
        } else {
            Ok(())
        }
    };

    let num_instances = num_particles as u64 * max_age as u64;
    exceeds("particle slot count", num_instances, u32::MAX as u64)?;

    let binding_limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    exceeds("position buffer bytes", num_instances * SLOT_SIZE, binding_limit)?;
    exceeds("color buffer bytes", num_instances * COLOR_SIZE, binding_limit)?;

    let max_dimension = limits.max_texture_dimension_2d as u64;
    exceeds("field texture width", field.width() as u64, max_dimension)?;
    exceeds("field texture height", field.height() as u64, max_dimension)?;

    exceeds(
        "advection workgroups",
        num_particles.div_ceil(WORKGROUP_SIZE) as u64,
        limits.max_compute_workgroups_per_dimension as u64,
    )
}

/// Device resources for one layer configuration.
pub struct ParticlePipeline {
    positions: [wgpu::Buffer; 2],
    colors: wgpu::Buffer,
    field_texture: FieldTexture,
    ramp_texture: RampTexture,
    advect: AdvectPass,
    draw: DrawPass,
    /// Buffer the next step reads from; also the one drawn as current.
    source: usize,
    num_particles: u32,
    max_age: u32,
    field_bounds: GeoBounds,
    unscale: [f32; 2],
}

impl ParticlePipeline {
    /// Allocate buffers, upload textures and compile both passes.
    ///
    /// Validation and allocation failures are caught with error scopes and
    /// returned instead of reaching the device's uncaptured error handler.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        config: &ParticleConfig,
        field: &VelocityField,
    ) -> Result<Self, GpuError> {
        let num_particles = config.num_particles;
        let max_age = config.max_age;
        let num_instances = num_particles as u64 * max_age as u64;
        check_limits(&device.limits(), num_particles, max_age, field)?;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let make_positions = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: num_instances * SLOT_SIZE,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let positions = [
            make_positions("Particle Positions 0"),
            make_positions("Particle Positions 1"),
        ];

        let colors = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Colors"),
            contents: bytemuck::cast_slice(&instance_colors(num_particles, max_age)),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let field_texture = FieldTexture::new(device, queue, field);
        let ramp_texture = RampTexture::new(device, queue, &config.effective_ramp());

        let advect = AdvectPass::new(device, &positions, &field_texture.view, &PRIORITY);
        let draw = DrawPass::new(
            device,
            &positions,
            &colors,
            &field_texture.view,
            &ramp_texture.view,
            surface_format,
        );

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Validation {
                label: "particle pipeline",
                message: err.to_string(),
            });
        }
        if pollster::block_on(device.pop_error_scope()).is_some() {
            return Err(GpuError::OutOfMemory("particle buffers"));
        }

        log::debug!(
            "particle pipeline ready: {} lanes x {} generations, field {}x{}",
            num_particles,
            max_age,
            field.width(),
            field.height()
        );

        Ok(Self {
            positions,
            colors,
            field_texture,
            ramp_texture,
            advect,
            draw,
            source: 0,
            num_particles,
            max_age,
            field_bounds: field.bounds(),
            unscale: field.unscale(),
        })
    }

    /// Record one advect, trail copy and swap.
    pub fn step(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        viewport_bounds: GeoBounds,
        params: &AdvectParams,
        time: u32,
        seed: u32,
    ) {
        let uniforms = AdvectUniforms::new(
            self.field_bounds,
            self.unscale,
            viewport_bounds,
            self.num_particles,
            self.max_age,
            params,
            time,
            seed,
        );
        self.advect.encode(queue, encoder, &uniforms, self.source);

        let target = 1 - self.source;
        if self.max_age > 1 {
            let generation_bytes = self.num_particles as u64 * SLOT_SIZE;
            encoder.copy_buffer_to_buffer(
                &self.positions[self.source],
                0,
                &self.positions[target],
                generation_bytes,
                (self.max_age as u64 - 1) * generation_bytes,
            );
        }
        self.source = target;
    }

    /// Record the segment draw onto `view`.
    pub fn draw(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        viewport: &Viewport,
        config: &ParticleConfig,
    ) {
        let uniforms = DrawUniforms::new(
            viewport.view_proj(),
            [viewport.width as f32, viewport.height as f32],
            viewport.bounds().west,
            self.field_bounds,
            self.unscale,
            config.speed_range,
            config.width,
            config.wrap_longitude,
        );
        self.draw.encode(
            queue,
            encoder,
            view,
            &uniforms,
            self.source,
            self.num_instances(),
        );
    }

    /// Drop every particle in both buffers.
    pub fn reset(&mut self, encoder: &mut wgpu::CommandEncoder) {
        for buffer in &self.positions {
            encoder.clear_buffer(buffer, 0, None);
        }
        self.source = 0;
    }

    /// Index of the buffer the next step reads from.
    pub fn source_index(&self) -> usize {
        self.source
    }

    pub fn num_particles(&self) -> u32 {
        self.num_particles
    }

    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    /// Slots drawn per frame.
    pub fn num_instances(&self) -> u32 {
        self.num_particles * self.max_age
    }

    /// Release device memory now instead of on drop.
    pub fn destroy(self) {
        for buffer in &self.positions {
            buffer.destroy();
        }
        self.colors.destroy();
        self.field_texture.texture.destroy();
        self.ramp_texture.texture.destroy();
        self.advect.destroy();
        self.draw.destroy();
    }
}

/// Headless device and readback helpers for tests that run the pipeline.
#[cfg(test)]
pub(crate) mod testing {
    /// A device on any available adapter, or `None` when the machine has
    /// none or it cannot run compute and vertex storage (tests return early
    /// in that case).
    pub fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;
        let required = wgpu::DownlevelFlags::COMPUTE_SHADERS | wgpu::DownlevelFlags::VERTEX_STORAGE;
        if !adapter.get_downlevel_capabilities().flags.contains(required) {
            return None;
        }
        pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Test Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .ok()
    }

    /// Copy `buffer` into a mappable staging buffer and read it back.
    pub fn read_buffer(device: &wgpu::Device, queue: &wgpu::Queue, buffer: &wgpu::Buffer) -> Vec<u8> {
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: buffer.size(),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, buffer.size());
        queue.submit(std::iter::once(encoder.finish()));
        map_and_read(device, &staging)
    }

    /// Read a `width x height` RGBA8 texture. `width * 4` must be a multiple
    /// of 256.
    pub fn read_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
    ) -> Vec<u8> {
        let size = texture.size();
        let bytes_per_row = size.width * 4;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Texture Readback Buffer"),
            size: bytes_per_row as u64 * size.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&Default::default());
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            size,
        );
        queue.submit(std::iter::once(encoder.finish()));
        map_and_read(device, &staging)
    }

    fn map_and_read(device: &wgpu::Device, staging: &wgpu::Buffer) -> Vec<u8> {
        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, |result| {
            result.expect("staging buffer should map");
        });
        device.poll(wgpu::Maintain::Wait);
        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        bytes
    }
}
