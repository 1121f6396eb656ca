//! Host-facing wind layer.
//!
//! [`WindLayer`] ties configuration, velocity field, step scheduling and the
//! GPU pipeline together. The host calls [`update`](WindLayer::update)
//! whenever its configuration or field changes, [`frame`](WindLayer::frame)
//! once per display frame to run a due step, and
//! [`draw`](WindLayer::draw) to render the trails.
//!
//! ```text
//! update ──► plan_update ──► Disabled │ Idle  ──► teardown
//!                            Keep     │       ──► (nothing)
//!                            Rebuild  │       ──► teardown + setup
//! ```

use std::time::Instant;

use crate::config::{ParticleConfig, PipelineToken};
use crate::error::GpuError;
use crate::field::VelocityField;
use crate::gpu::ParticlePipeline;
use crate::particles::AdvectParams;
use crate::shader_utils::hash;
use crate::time::StepScheduler;
use crate::viewport::Viewport;

/// What an update has to do with the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdatePlan {
    /// Zero particles, zero max age or zero width.
    Disabled,
    /// Enabled but no velocity field yet.
    Idle,
    /// Structural values unchanged.
    Keep,
    /// Set up a pipeline for this token.
    Rebuild(PipelineToken),
}

/// Decide how to handle an update, given the token the running pipeline was
/// built with.
pub fn plan_update(
    current: Option<&PipelineToken>,
    config: &ParticleConfig,
    field: Option<&VelocityField>,
) -> UpdatePlan {
    if !config.is_enabled() {
        return UpdatePlan::Disabled;
    }
    let Some(field) = field else {
        return UpdatePlan::Idle;
    };
    let token = PipelineToken::new(config, field);
    match current {
        Some(current) if *current == token => UpdatePlan::Keep,
        _ => UpdatePlan::Rebuild(token),
    }
}

/// Derive the advection seed for a tick.
pub fn tick_seed(tick: u32) -> u32 {
    hash(tick.wrapping_mul(0x9e37_79b9))
}

/// One animated particle layer.
pub struct WindLayer {
    config: ParticleConfig,
    field: Option<VelocityField>,
    pipeline: Option<ParticlePipeline>,
    token: Option<PipelineToken>,
    scheduler: StepScheduler,
    previous_zoom: Option<f32>,
    surface_format: wgpu::TextureFormat,
}

impl WindLayer {
    /// An idle layer drawing into targets of `surface_format`.
    pub fn new(surface_format: wgpu::TextureFormat) -> Self {
        Self {
            config: ParticleConfig::default(),
            field: None,
            pipeline: None,
            token: None,
            scheduler: StepScheduler::default(),
            previous_zoom: None,
            surface_format,
        }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn field(&self) -> Option<&VelocityField> {
        self.field.as_ref()
    }

    /// Token of the running pipeline.
    pub fn token(&self) -> Option<&PipelineToken> {
        self.token.as_ref()
    }

    /// Whether a pipeline is set up.
    pub fn is_active(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Steps run since the layer was created or last reset.
    pub fn tick(&self) -> u32 {
        self.scheduler.tick()
    }

    /// When the pending step becomes due, for hosts that sleep between frames.
    pub fn next_due(&self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    /// Apply a configuration and field. Rebuilds the pipeline when any
    /// structural value changed.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: ParticleConfig,
        field: Option<VelocityField>,
    ) -> Result<(), GpuError> {
        let plan = plan_update(self.token.as_ref(), &config, field.as_ref());
        self.config = config;
        self.field = field;

        match plan {
            UpdatePlan::Disabled => {
                log::warn!(
                    "wind layer disabled: num_particles={}, max_age={}, width={}",
                    self.config.num_particles,
                    self.config.max_age,
                    self.config.width
                );
                self.teardown();
                return Ok(());
            }
            UpdatePlan::Idle => {
                log::warn!("wind layer idle: no velocity field");
                self.teardown();
                return Ok(());
            }
            UpdatePlan::Keep => {}
            UpdatePlan::Rebuild(token) => {
                match &self.token {
                    Some(old) => log::debug!(
                        "rebuilding particle pipeline, changed: {}",
                        old.changes(&token).join(", ")
                    ),
                    None => log::debug!("setting up particle pipeline"),
                }
                self.teardown();

                let Some(field) = self.field.as_ref() else {
                    return Ok(());
                };
                let pipeline = ParticlePipeline::new(
                    device,
                    queue,
                    self.surface_format,
                    &self.config,
                    field,
                )?;
                log::info!(
                    "particle pipeline set up: {} particles, max age {}, field #{}",
                    token.num_particles,
                    token.max_age,
                    token.field_id
                );
                self.pipeline = Some(pipeline);
                self.token = Some(token);
            }
        }

        if self.config.animate {
            self.scheduler.request(Instant::now());
        } else {
            self.scheduler.cancel();
        }
        Ok(())
    }

    /// Release the pipeline. Safe to call repeatedly or when never set up;
    /// a pending step is dropped.
    pub fn teardown(&mut self) {
        self.scheduler.cancel();
        self.token = None;
        self.previous_zoom = None;
        if let Some(pipeline) = self.pipeline.take() {
            log::info!(
                "particle pipeline torn down ({} particles)",
                pipeline.num_particles()
            );
            pipeline.destroy();
        }
    }

    /// Clear all trails without reallocating.
    pub fn reset(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.reset(encoder);
            self.previous_zoom = None;
            log::debug!("particle trails reset");
        }
    }

    /// Turn animation on or off. Turning it off keeps the last frame.
    pub fn set_animate(&mut self, animate: bool, now: Instant) {
        self.config.animate = animate;
        if animate {
            self.request_step(now);
        } else {
            self.scheduler.cancel();
        }
    }

    /// Ask for a step. Requests collapse while one is pending.
    pub fn request_step(&mut self, now: Instant) -> bool {
        self.is_active() && self.scheduler.request(now)
    }

    /// Run the pending step if it is due. Returns whether a step was recorded.
    pub fn frame(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        viewport: &Viewport,
        now: Instant,
    ) -> bool {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return false;
        };
        let Some(tick) = self.scheduler.poll(now) else {
            return false;
        };

        let params = AdvectParams::for_zoom(
            self.config.speed_factor,
            viewport.zoom,
            self.previous_zoom,
            self.config.wrap_longitude,
        );
        self.previous_zoom = Some(viewport.zoom);
        pipeline.step(
            queue,
            encoder,
            viewport.wrapped_bounds(),
            &params,
            tick,
            tick_seed(tick),
        );

        if self.config.animate {
            self.scheduler.request(now);
        }
        true
    }

    /// Draw the trails onto `view`.
    pub fn draw(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        viewport: &Viewport,
    ) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.draw(queue, encoder, view, viewport, &self.config);
        }
    }
}

impl Drop for WindLayer {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::GeoBounds;
    use crate::ramp::ColorRamp;

    fn field() -> VelocityField {
        VelocityField::from_texels(vec![[0.5; 4]], 1, 1, GeoBounds::WORLD, [0.0, 1.0]).unwrap()
    }

    #[test]
    fn test_zero_config_is_disabled() {
        let f = field();
        for config in [
            ParticleConfig::new().with_num_particles(0),
            ParticleConfig::new().with_max_age(0),
            ParticleConfig::new().with_width(0.0),
        ] {
            assert_eq!(plan_update(None, &config, Some(&f)), UpdatePlan::Disabled);
        }
    }

    #[test]
    fn test_missing_field_is_idle() {
        assert_eq!(
            plan_update(None, &ParticleConfig::default(), None),
            UpdatePlan::Idle
        );
    }

    #[test]
    fn test_first_update_builds() {
        let f = field();
        let config = ParticleConfig::default();
        assert_eq!(
            plan_update(None, &config, Some(&f)),
            UpdatePlan::Rebuild(PipelineToken::new(&config, &f))
        );
    }

    #[test]
    fn test_per_tick_change_keeps_pipeline() {
        let f = field();
        let config = ParticleConfig::default();
        let token = PipelineToken::new(&config, &f);
        let tweaked = config.with_speed_factor(4.0).with_animate(false);
        assert_eq!(plan_update(Some(&token), &tweaked, Some(&f)), UpdatePlan::Keep);
    }

    #[test]
    fn test_structural_change_rebuilds() {
        let f = field();
        let config = ParticleConfig::default();
        let token = PipelineToken::new(&config, &f);
        let changed = config.clone().with_color_ramp(ColorRamp::wind());
        assert!(matches!(
            plan_update(Some(&token), &changed, Some(&f)),
            UpdatePlan::Rebuild(_)
        ));
        // A new field with identical texels is a different field.
        assert!(matches!(
            plan_update(Some(&token), &config, Some(&field())),
            UpdatePlan::Rebuild(_)
        ));
    }

    #[test]
    fn test_tick_seed_varies() {
        assert_ne!(tick_seed(1), tick_seed(2));
        assert_eq!(tick_seed(7), tick_seed(7));
    }

    #[test]
    fn test_inactive_layer_ignores_requests() {
        let mut layer = WindLayer::new(wgpu::TextureFormat::Bgra8UnormSrgb);
        assert!(!layer.is_active());
        assert!(!layer.request_step(Instant::now()));
        assert!(layer.next_due().is_none());
        layer.teardown();
        layer.teardown();
        assert!(layer.token().is_none());
    }

    #[test]
    fn test_set_animate_off_cancels() {
        let mut layer = WindLayer::new(wgpu::TextureFormat::Bgra8UnormSrgb);
        layer.scheduler.request(Instant::now());
        layer.set_animate(false, Instant::now());
        assert!(!layer.config().animate);
        assert!(layer.next_due().is_none());
    }
}
