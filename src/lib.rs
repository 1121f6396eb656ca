//! # windflow - GPU wind particles for Web-Mercator maps
//!
//! Animated wind-flow particles advected through a velocity field texture,
//! entirely on the GPU.
//!
//! windflow keeps `num_particles * max_age` particle slots in two storage
//! buffers. Every step a compute pass moves the newest generation through
//! the field, a buffer copy shifts the older generations back by one, and
//! the buffers swap roles. The draw pass connects each slot's previous and
//! current position with a line segment, so the generations form fading
//! trails.
//!
//! ## Quick Start
//!
//! ```ignore
//! use windflow::prelude::*;
//!
//! let field = VelocityField::from_image("wind.png", GeoBounds::WORLD, [-20.0, 20.0])?;
//! let mut layer = WindLayer::new(surface_format);
//! layer.update(&device, &queue, ParticleConfig::default(), Some(field))?;
//!
//! // every frame
//! layer.frame(&queue, &mut encoder, &viewport, Instant::now());
//! layer.draw(&queue, &mut encoder, &view, &viewport);
//! ```
//!
//! ## Core Concepts
//!
//! ### Lanes and generations
//!
//! Slot `i` belongs to lane `i % num_particles` and generation
//! `i / num_particles`. Generation 0 is the newest position. A slot at
//! `(0, 0)` is dropped and not drawn; the advection pass reseeds dropped
//! lanes inside the viewport.
//!
//! ### Advection rules
//!
//! Each lane walks an ordered decision table, see [`rules`]. The first
//! matching rule decides the lane's next position:
//!
//! | Rule | Effect |
//! |------|--------|
//! | [`AdvectRule::Reseed`] | dropped lane gets a random position in the viewport |
//! | [`AdvectRule::ZoomCull`] | thin out lanes after zooming out |
//! | [`AdvectRule::AgeCull`] | staggered respawn |
//! | [`AdvectRule::FreezeOutsideField`] | hold outside the field bounds |
//! | [`AdvectRule::CullOutsideViewport`] | drop outside the view |
//! | [`AdvectRule::CullNoData`] | drop on missing data |
//! | [`AdvectRule::Advect`] | move by the sampled velocity |
//!
//! ### Host-side reference
//!
//! [`CpuParticles`] runs the identical advect, shift and swap sequence on
//! host memory, for tests and for hosts without a GPU.

pub mod bounds;
pub mod config;
pub mod error;
pub mod field;
pub mod gpu;
pub mod interpolate;
pub mod layer;
pub mod particles;
pub mod ramp;
pub mod rules;
pub mod shader_utils;
pub mod time;
pub mod uniforms;
pub mod viewport;

pub use bounds::{
    clamp_latitude, clamp_mercator_latitude, is_position_in_bounds, wrap_bounds, wrap_longitude,
    GeoBounds,
};
pub use config::{DemoConfig, FieldConfig, ParticleConfig, PipelineToken, ViewConfig};
pub use error::{ConfigError, FieldError, GpuError, SimulationError};
pub use field::VelocityField;
pub use glam::{Vec2, Vec3};
pub use gpu::ParticlePipeline;
pub use interpolate::{interpolate_field, WindSample};
pub use layer::WindLayer;
pub use particles::{AdvectParams, CpuParticles, ParticleState, DROP_POSITION};
pub use ramp::{ColorRamp, ColorStop};
pub use rules::{AdvectRule, PRIORITY};
pub use time::StepScheduler;
pub use viewport::Viewport;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use windflow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bounds::{wrap_bounds, wrap_longitude, GeoBounds};
    pub use crate::config::{ParticleConfig, PipelineToken};
    pub use crate::error::{FieldError, GpuError};
    pub use crate::field::VelocityField;
    pub use crate::interpolate::WindSample;
    pub use crate::layer::WindLayer;
    pub use crate::particles::CpuParticles;
    pub use crate::ramp::ColorRamp;
    pub use crate::viewport::Viewport;
    pub use crate::{Vec2, Vec3};
}
