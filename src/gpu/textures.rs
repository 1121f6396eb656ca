//! Field and color ramp textures.
//!
//! Both are read with `textureLoad`, so no samplers are involved and texel
//! addressing matches [`VelocityField::sample_raw`] exactly.

use crate::field::VelocityField;
use crate::ramp::{ColorRamp, RAMP_WIDTH};

/// WGSL nearest-texel lookup into `velocity_texture`.
///
/// Shaders that include this must declare
/// `var velocity_texture: texture_2d<f32>`.
pub const SAMPLE_FIELD_WGSL: &str = r#"
fn sample_field(position: vec2<f32>, bounds: vec4<f32>) -> vec4<f32> {
    let dims = vec2<i32>(textureDimensions(velocity_texture));
    let uv = bounds_uv(position, bounds);
    let texel = clamp(vec2<i32>(floor(uv * vec2<f32>(dims))), vec2<i32>(0), dims - vec2<i32>(1));
    return textureLoad(velocity_texture, texel, 0);
}
"#;

/// WGSL lookup into the rasterized ramp `ramp_texture`.
pub const SAMPLE_RAMP_WGSL: &str = r#"
fn sample_ramp(t: f32) -> vec4<f32> {
    let last = i32(textureDimensions(ramp_texture).x) - 1;
    let index = clamp(i32(round(clamp(t, 0.0, 1.0) * f32(last))), 0, last);
    return textureLoad(ramp_texture, vec2<i32>(index, 0), 0);
}
"#;

/// Velocity field uploaded as an `Rgba32Float` texture.
pub struct FieldTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl FieldTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, field: &VelocityField) -> Self {
        let size = wgpu::Extent3d {
            width: field.width(),
            height: field.height(),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Velocity Field Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(field.texels()),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(field.width() * 16),
                rows_per_image: Some(field.height()),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Color ramp uploaded as a 256x1 `Rgba8Unorm` texture.
pub struct RampTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl RampTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, ramp: &ColorRamp) -> Self {
        let size = wgpu::Extent3d {
            width: RAMP_WIDTH as u32,
            height: 1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Color Ramp Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &ramp.to_texture(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(RAMP_WIDTH as u32 * 4),
                rows_per_image: Some(1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Bind group layout entry for a non-filterable 2D float texture.
pub(crate) fn texture_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}
