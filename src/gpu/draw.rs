//! Line draw pass.
//!
//! Every instance is one slot of the trail buffers and draws the segment from
//! the slot's previous position to its current one. Segments are expanded in
//! the vertex shader into screen-space quads `width` pixels wide, six
//! vertices per instance. Slots with a dropped endpoint, and segments that
//! jump across the antimeridian, are moved out of the clip volume.
//!
//! Color is the speed ramp sampled at the current position, multiplied by the
//! per-slot generation color so older generations fade out.

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use super::textures::{texture_entry, SAMPLE_FIELD_WGSL, SAMPLE_RAMP_WGSL};
use crate::bounds::MERCATOR_MAX_LAT;
use crate::shader_utils::all_utils_wgsl;
use crate::uniforms::{DrawUniforms, DRAW_UNIFORMS_WGSL};

/// Vertices emitted per segment.
pub const VERTICES_PER_SEGMENT: u32 = 6;

/// GPU resources for the draw stage.
pub struct DrawPass {
    pipeline: wgpu::RenderPipeline,
    /// `bind_groups[c]` reads buffer `c` as current and `1 - c` as previous.
    bind_groups: [wgpu::BindGroup; 2],
    uniform_buffer: wgpu::Buffer,
}

impl DrawPass {
    pub fn new(
        device: &wgpu::Device,
        positions: &[wgpu::Buffer; 2],
        colors: &wgpu::Buffer,
        field_view: &wgpu::TextureView,
        ramp_view: &wgpu::TextureView,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Draw Uniform Buffer"),
            contents: bytemuck::bytes_of(&DrawUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let shader_src = generate_draw_shader();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Draw Shader"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1),
                storage_entry(2),
                storage_entry(3),
                texture_entry(4, wgpu::ShaderStages::VERTEX),
                texture_entry(5, wgpu::ShaderStages::VERTEX),
            ],
        });

        let make_bind_group = |current: usize, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: positions[1 - current].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: positions[current].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: colors.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(field_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(ramp_view),
                    },
                ],
            })
        };
        let bind_groups = [
            make_bind_group(0, "Draw Bind Group current=0"),
            make_bind_group(1, "Draw Bind Group current=1"),
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Draw Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Draw Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_groups,
            uniform_buffer,
        }
    }

    /// Record the draw onto `view`, keeping whatever is already there.
    pub fn encode(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        uniforms: &DrawUniforms,
        current: usize,
        num_instances: u32,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Draw Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[current], &[]);
        pass.draw(0..VERTICES_PER_SEGMENT, 0..num_instances);
    }

    pub fn destroy(&self) {
        self.uniform_buffer.destroy();
    }
}

/// Generate the line draw shader.
pub fn generate_draw_shader() -> String {
    format!(
        r#"{uniforms}
{utils}
const PI: f32 = 3.14159265358979;
const MERCATOR_MAX_LAT: f32 = {max_lat};

@group(0) @binding(0)
var<uniform> uniforms: DrawUniforms;

@group(0) @binding(1)
var<storage, read> positions_prev: array<f32>;

@group(0) @binding(2)
var<storage, read> positions_curr: array<f32>;

@group(0) @binding(3)
var<storage, read> colors: array<vec4<f32>>;

@group(0) @binding(4)
var velocity_texture: texture_2d<f32>;

@group(0) @binding(5)
var ramp_texture: texture_2d<f32>;
{sample_field}{sample_ramp}
struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}};

// Longitude in [min_lng, min_lng + 360)
fn wrap_into(lng: f32, min_lng: f32) -> f32 {{
    let offset = lng - min_lng;
    return min_lng + offset - 360.0 * floor(offset / 360.0);
}}

// Normalized Web-Mercator, y grows southwards
fn mercator(position: vec2<f32>) -> vec2<f32> {{
    let lat = radians(clamp(position.y, -MERCATOR_MAX_LAT, MERCATOR_MAX_LAT));
    return vec2<f32>(
        (position.x + 180.0) / 360.0,
        (1.0 - log(tan(PI / 4.0 + lat / 2.0)) / PI) / 2.0
    );
}}

fn speed_color(position: vec2<f32>) -> vec4<f32> {{
    let velocity = raster_get_values(sample_field(position, uniforms.field_bounds), uniforms.unscale);
    let range = uniforms.speed_range;
    let t = clamp((length(velocity) - range.x) / max(range.y - range.x, 1e-6), 0.0, 1.0);
    return sample_ramp(t);
}}

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) instance_index: u32,
) -> VertexOutput {{
    var out: VertexOutput;

    let i = instance_index;
    let raw_a = vec2<f32>(positions_prev[i * 3u], positions_prev[i * 3u + 1u]);
    let raw_b = vec2<f32>(positions_curr[i * 3u], positions_curr[i * 3u + 1u]);

    // Skip dropped slots and antimeridian jumps
    if is_dropped(raw_a) || is_dropped(raw_b) || abs(raw_a.x - raw_b.x) > 180.0 {{
        out.clip_position = vec4<f32>(0.0, 0.0, -1000.0, 1.0);
        out.color = vec4<f32>(0.0);
        return out;
    }}

    var a = raw_a;
    var b = raw_b;
    if uniforms.wrap != 0u {{
        a.x = wrap_into(a.x, uniforms.viewport_west);
        b.x = wrap_into(b.x, a.x - 180.0);
    }}

    let clip_a = uniforms.view_proj * vec4<f32>(mercator(a), 0.0, 1.0);
    let clip_b = uniforms.view_proj * vec4<f32>(mercator(b), 0.0, 1.0);

    // Quad corners as (along, side)
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(0.0,  1.0),
        vec2<f32>(0.0,  1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0,  1.0),
    );
    let corner = corners[vertex_index];

    let size = max(uniforms.viewport_size, vec2<f32>(1.0));
    let screen_a = clip_a.xy / clip_a.w * size;
    let screen_b = clip_b.xy / clip_b.w * size;
    var dir = screen_b - screen_a;
    if length(dir) < 1e-6 {{
        dir = vec2<f32>(1.0, 0.0);
    }}
    let normal = normalize(vec2<f32>(-dir.y, dir.x));

    var clip = clip_a + (clip_b - clip_a) * corner.x;
    clip.x += normal.x * corner.y * uniforms.width / size.x * clip.w;
    clip.y += normal.y * corner.y * uniforms.width / size.y * clip.w;

    out.clip_position = clip;
    out.color = speed_color(raw_b) * colors[i];
    return out;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    return in.color;
}}
"#,
        uniforms = DRAW_UNIFORMS_WGSL,
        utils = all_utils_wgsl(),
        max_lat = format_f32(MERCATOR_MAX_LAT),
        sample_field = SAMPLE_FIELD_WGSL,
        sample_ramp = SAMPLE_RAMP_WGSL,
    )
}

/// Render an `f32` as a WGSL float literal.
fn format_f32(v: f32) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        s
    } else {
        format!("{s}.0")
    }
}
