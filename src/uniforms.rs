//! Uniform blocks for the advection and draw shaders.
//!
//! Each Rust struct has a WGSL twin with the same field order. Sizes are
//! multiples of 16 so the blocks satisfy uniform buffer layout rules without
//! implicit padding.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::bounds::GeoBounds;
use crate::particles::AdvectParams;

/// Per-tick inputs of the advection compute pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct AdvectUniforms {
    pub bounds: [f32; 4],
    pub viewport_bounds: [f32; 4],
    pub unscale: [f32; 2],
    pub num_particles: u32,
    pub max_age: u32,
    pub speed_factor: f32,
    pub time: u32,
    pub seed: u32,
    pub zoom_change_factor: f32,
    pub wrap: u32,
    pub _pad: [u32; 3],
}

/// WGSL declaration matching [`AdvectUniforms`].
pub const ADVECT_UNIFORMS_WGSL: &str = r#"
struct AdvectUniforms {
    bounds: vec4<f32>,
    viewport_bounds: vec4<f32>,
    unscale: vec2<f32>,
    num_particles: u32,
    max_age: u32,
    speed_factor: f32,
    time: u32,
    seed: u32,
    zoom_change_factor: f32,
    wrap: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};
"#;

impl AdvectUniforms {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        field_bounds: GeoBounds,
        unscale: [f32; 2],
        viewport_bounds: GeoBounds,
        num_particles: u32,
        max_age: u32,
        params: &AdvectParams,
        time: u32,
        seed: u32,
    ) -> Self {
        Self {
            bounds: field_bounds.to_array(),
            viewport_bounds: viewport_bounds.to_array(),
            unscale,
            num_particles,
            max_age,
            speed_factor: params.speed_factor,
            time,
            seed,
            zoom_change_factor: params.zoom_change_factor,
            wrap: params.wrap_longitude as u32,
            _pad: [0; 3],
        }
    }
}

/// Inputs of the line draw pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DrawUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub field_bounds: [f32; 4],
    pub viewport_size: [f32; 2],
    pub speed_range: [f32; 2],
    pub unscale: [f32; 2],
    /// Line width in pixels.
    pub width: f32,
    /// West edge of the viewport window; draw longitudes wrap after it.
    pub viewport_west: f32,
    pub wrap: u32,
    pub _pad: [u32; 3],
}

/// WGSL declaration matching [`DrawUniforms`].
pub const DRAW_UNIFORMS_WGSL: &str = r#"
struct DrawUniforms {
    view_proj: mat4x4<f32>,
    field_bounds: vec4<f32>,
    viewport_size: vec2<f32>,
    speed_range: vec2<f32>,
    unscale: vec2<f32>,
    width: f32,
    viewport_west: f32,
    wrap: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};
"#;

impl DrawUniforms {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        view_proj: Mat4,
        viewport_size: [f32; 2],
        viewport_west: f32,
        field_bounds: GeoBounds,
        unscale: [f32; 2],
        speed_range: [f32; 2],
        width: f32,
        wrap: bool,
    ) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            field_bounds: field_bounds.to_array(),
            viewport_size,
            speed_range,
            unscale,
            width,
            viewport_west,
            wrap: wrap as u32,
            _pad: [0; 3],
        }
    }
}
