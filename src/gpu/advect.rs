//! Advection compute pass.
//!
//! Reads generation 0 from the source position buffer, runs the decision
//! table and writes generation 0 of the target buffer. One bind group is
//! prebuilt for each buffer direction so swapping costs nothing.

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use super::textures::{texture_entry, SAMPLE_FIELD_WGSL};
use super::WORKGROUP_SIZE;
use crate::rules::AdvectRule;
use crate::shader_utils::all_utils_wgsl;
use crate::uniforms::{AdvectUniforms, ADVECT_UNIFORMS_WGSL};

/// GPU resources for the advection stage.
pub struct AdvectPass {
    pipeline: wgpu::ComputePipeline,
    /// `bind_groups[s]` reads buffer `s` and writes buffer `1 - s`.
    bind_groups: [wgpu::BindGroup; 2],
    uniform_buffer: wgpu::Buffer,
}

impl AdvectPass {
    pub fn new(
        device: &wgpu::Device,
        positions: &[wgpu::Buffer; 2],
        field_view: &wgpu::TextureView,
        rules: &[AdvectRule],
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Advect Uniform Buffer"),
            contents: bytemuck::bytes_of(&AdvectUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let shader_src = generate_advect_shader(rules);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Advect Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Advect Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(3, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let make_bind_group = |source: usize, label: &str| {
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
                        resource: positions[source].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: positions[1 - source].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(field_view),
                    },
                ],
            })
        };
        let bind_groups = [
            make_bind_group(0, "Advect Bind Group 0->1"),
            make_bind_group(1, "Advect Bind Group 1->0"),
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Advect Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Advect Compute Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_groups,
            uniform_buffer,
        }
    }

    /// Record one advection dispatch reading buffer `source`.
    pub fn encode(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &AdvectUniforms,
        source: usize,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Advect Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[source], &[]);
        let workgroups = uniforms.num_particles.div_ceil(WORKGROUP_SIZE);
        pass.dispatch_workgroups(workgroups, 1, 1);
    }

    pub fn destroy(&self) {
        self.uniform_buffer.destroy();
    }
}

/// Generate the advection compute shader for a rule table.
///
/// Rules are emitted in order, each as an early-return block. Lanes that no
/// rule claims keep their position.
pub fn generate_advect_shader(rules: &[AdvectRule]) -> String {
    let rule_code = rules
        .iter()
        .map(|rule| rule.to_wgsl())
        .collect::<Vec<_>>()
        .join("\n\n");
    let fallthrough = if rules.last() == Some(&AdvectRule::Advect) {
        ""
    } else {
        "    emit(i, position);"
    };

    format!(
        r#"{uniforms}
{utils}
@group(0) @binding(0)
var<uniform> uniforms: AdvectUniforms;

@group(0) @binding(1)
var<storage, read> positions_in: array<f32>;

@group(0) @binding(2)
var<storage, read_write> positions_out: array<f32>;

@group(0) @binding(3)
var velocity_texture: texture_2d<f32>;
{sample_field}
var<private> lane_texel_value: vec4<f32>;
var<private> lane_texel_loaded: bool;

// Nearest texel under the lane, fetched once per invocation
fn lane_texel(position: vec2<f32>) -> vec4<f32> {{
    if !lane_texel_loaded {{
        lane_texel_value = sample_field(position, uniforms.bounds);
        lane_texel_loaded = true;
    }}
    return lane_texel_value;
}}

fn emit(i: u32, position: vec2<f32>) {{
    positions_out[i * 3u] = position.x;
    positions_out[i * 3u + 1u] = position.y;
    positions_out[i * 3u + 2u] = 0.0;
}}

@compute @workgroup_size({workgroup_size})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let i = global_id.x;
    if i >= uniforms.num_particles {{
        return;
    }}
    let position = vec2<f32>(positions_in[i * 3u], positions_in[i * 3u + 1u]);

{rule_code}
{fallthrough}
}}
"#,
        uniforms = ADVECT_UNIFORMS_WGSL,
        utils = all_utils_wgsl(),
        sample_field = SAMPLE_FIELD_WGSL,
        workgroup_size = WORKGROUP_SIZE,
        rule_code = rule_code,
        fallthrough = fallthrough,
    )
}
