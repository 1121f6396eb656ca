//! Layer configuration.
//!
//! [`ParticleConfig`] is the configuration surface of a wind layer. Values
//! are split into two kinds:
//!
//! - **Structural**: particle count, max age, line width, color ramp and
//!   the field identity. These size GPU buffers or bake into textures and
//!   are captured by [`PipelineToken`]; any change rebuilds the pipeline.
//! - **Per-tick**: speed factor, speed range, animate, longitude wrapping.
//!   These are read every step and never trigger a rebuild.
//!
//! [`DemoConfig`] is the JSON file the `windflow` binary reads.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::bounds::GeoBounds;
use crate::error::ConfigError;
use crate::field::VelocityField;
use crate::interpolate::{interpolate_field, WindSample, DEFAULT_EXPONENT};
use crate::ramp::ColorRamp;

/// Configuration of one wind particle layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Number of particle lanes.
    pub num_particles: u32,
    /// Trail length in generations.
    pub max_age: u32,
    /// Advection scale before per-zoom scaling.
    pub speed_factor: f32,
    /// Flat RGBA color used when no ramp is set.
    pub color: [u8; 4],
    /// Speed color ramp.
    pub color_ramp: Option<ColorRamp>,
    /// Speeds mapped to the start and end of the ramp.
    pub speed_range: [f32; 2],
    /// Line width in pixels.
    pub width: f32,
    /// Request a new step after every drawn frame.
    pub animate: bool,
    /// Wrap longitudes into [-180, 180).
    pub wrap_longitude: bool,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            num_particles: 5000,
            max_age: 100,
            speed_factor: 1.0,
            color: [255, 255, 255, 255],
            color_ramp: None,
            speed_range: [0.0, 30.0],
            width: 1.0,
            animate: true,
            wrap_longitude: true,
        }
    }
}

impl ParticleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_particles(mut self, num_particles: u32) -> Self {
        self.num_particles = num_particles;
        self
    }

    pub fn with_max_age(mut self, max_age: u32) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_speed_factor(mut self, speed_factor: f32) -> Self {
        self.speed_factor = speed_factor;
        self
    }

    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn with_color_ramp(mut self, ramp: ColorRamp) -> Self {
        self.color_ramp = Some(ramp);
        self
    }

    pub fn with_speed_range(mut self, min: f32, max: f32) -> Self {
        self.speed_range = [min, max];
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn with_animate(mut self, animate: bool) -> Self {
        self.animate = animate;
        self
    }

    pub fn with_wrap_longitude(mut self, wrap: bool) -> Self {
        self.wrap_longitude = wrap;
        self
    }

    /// Zero particles, zero max age or a non-positive width disable the layer.
    pub fn is_enabled(&self) -> bool {
        self.num_particles > 0 && self.max_age > 0 && self.width > 0.0
    }

    /// Ramp sampled at draw time: the configured ramp, or the flat color.
    pub fn effective_ramp(&self) -> ColorRamp {
        self.color_ramp
            .clone()
            .unwrap_or_else(|| ColorRamp::constant(self.color))
    }

    /// Read from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Everything that forces a pipeline rebuild.
///
/// The layer keeps the token it built with and compares it against the token
/// of each update. Equal tokens keep the pipeline, different tokens tear it
/// down and set it up again.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineToken {
    pub field_id: u64,
    pub num_particles: u32,
    pub max_age: u32,
    pub width: f32,
    pub ramp: ColorRamp,
}

impl PipelineToken {
    pub fn new(config: &ParticleConfig, field: &VelocityField) -> Self {
        Self {
            field_id: field.id(),
            num_particles: config.num_particles,
            max_age: config.max_age,
            width: config.width,
            ramp: config.effective_ramp(),
        }
    }

    /// Which structural values differ, for logging.
    pub fn changes(&self, other: &PipelineToken) -> Vec<&'static str> {
        let mut changes = Vec::new();
        if self.field_id != other.field_id {
            changes.push("field");
        }
        if self.num_particles != other.num_particles {
            changes.push("num_particles");
        }
        if self.max_age != other.max_age {
            changes.push("max_age");
        }
        if self.width != other.width {
            changes.push("width");
        }
        if self.ramp != other.ramp {
            changes.push("color_ramp");
        }
        changes
    }
}

/// Where the demo gets its velocity field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Geographic extent of the field.
    pub bounds: GeoBounds,
    /// Decode range for image fields.
    pub unscale: [f32; 2],
    /// PNG or JPEG wind image, relative to the config file.
    pub image: Option<PathBuf>,
    /// Point observations to interpolate when no image is given.
    pub samples: Vec<WindSample>,
    /// Grid spacing in degrees for interpolated fields.
    pub resolution: f32,
    /// IDW distance exponent.
    pub exponent: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            bounds: GeoBounds::WORLD,
            unscale: [-20.0, 20.0],
            image: None,
            samples: Vec::new(),
            resolution: 1.0,
            exponent: DEFAULT_EXPONENT,
        }
    }
}

impl FieldConfig {
    /// Build the configured field. `Ok(None)` when neither an image nor
    /// samples are configured.
    pub fn build(&self, base_dir: &Path) -> Result<Option<VelocityField>, ConfigError> {
        if let Some(image) = &self.image {
            let path = base_dir.join(image);
            return Ok(Some(VelocityField::from_image(
                path,
                self.bounds,
                self.unscale,
            )?));
        }
        if !self.samples.is_empty() {
            let field =
                interpolate_field(&self.samples, self.bounds, self.resolution, self.exponent)?;
            return Ok(Some(field));
        }
        Ok(None)
    }
}

/// Initial camera for the demo.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// `[longitude, latitude]`.
    pub center: [f32; 2],
    pub zoom: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 20.0],
            zoom: 1.5,
        }
    }
}

impl ViewConfig {
    pub fn center(&self) -> Vec2 {
        Vec2::from(self.center)
    }
}

/// Contents of the demo's JSON config file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub particles: ParticleConfig,
    pub field: FieldConfig,
    pub view: ViewConfig,
}

impl DemoConfig {
    /// Read from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::ColorStop;

    fn field() -> VelocityField {
        VelocityField::from_texels(vec![[0.5; 4]], 1, 1, GeoBounds::WORLD, [0.0, 1.0]).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ParticleConfig::default();
        assert_eq!(config.num_particles, 5000);
        assert_eq!(config.max_age, 100);
        assert_eq!(config.speed_range, [0.0, 30.0]);
        assert!(config.animate);
        assert!(config.is_enabled());
    }

    #[test]
    fn test_zero_values_disable() {
        assert!(!ParticleConfig::new().with_num_particles(0).is_enabled());
        assert!(!ParticleConfig::new().with_max_age(0).is_enabled());
        assert!(!ParticleConfig::new().with_width(0.0).is_enabled());
    }

    #[test]
    fn test_token_ignores_per_tick_values() {
        let f = field();
        let a = ParticleConfig::default();
        let b = a
            .clone()
            .with_speed_factor(3.0)
            .with_speed_range(0.0, 10.0)
            .with_animate(false)
            .with_wrap_longitude(false);
        assert_eq!(PipelineToken::new(&a, &f), PipelineToken::new(&b, &f));
    }

    #[test]
    fn test_token_tracks_structural_values() {
        let f = field();
        let base = ParticleConfig::default();
        let token = PipelineToken::new(&base, &f);
        let variants = [
            base.clone().with_num_particles(10),
            base.clone().with_max_age(5),
            base.clone().with_width(2.0),
            base.clone().with_color([255, 0, 0, 255]),
            base.clone().with_color_ramp(ColorRamp::wind()),
        ];
        for config in &variants {
            assert_ne!(PipelineToken::new(config, &f), token);
        }
        assert_ne!(PipelineToken::new(&base, &field()), token);
        assert_eq!(PipelineToken::new(&base, &f.clone()), token);
    }

    #[test]
    fn test_token_changes_lists_fields() {
        let f = field();
        let a = PipelineToken::new(&ParticleConfig::default(), &f);
        let b = PipelineToken::new(&ParticleConfig::default().with_max_age(3), &f);
        assert_eq!(a.changes(&b), vec!["max_age"]);
    }

    #[test]
    fn test_json_partial_config_uses_defaults() {
        let config: ParticleConfig =
            serde_json::from_str(r#"{"num_particles": 200, "color_ramp": [[0.0, [0, 0, 255]], [1.0, [255, 0, 0]]]}"#)
                .unwrap();
        assert_eq!(config.num_particles, 200);
        assert_eq!(config.max_age, 100);
        let ramp = config.color_ramp.unwrap();
        assert_eq!(ramp.stops()[1], ColorStop::rgb(1.0, 255, 0, 0));
    }

    #[test]
    fn test_demo_config_from_json() {
        let config: DemoConfig = serde_json::from_str(
            r#"{
                "particles": {"max_age": 20},
                "field": {"bounds": [-10, -10, 10, 10], "samples": [{"lat": 0, "lon": 0, "speed": 5, "direction": 270}]},
                "view": {"zoom": 4}
            }"#,
        )
        .unwrap();
        assert_eq!(config.particles.max_age, 20);
        assert_eq!(config.field.bounds, GeoBounds::new(-10.0, -10.0, 10.0, 10.0));
        assert_eq!(config.field.samples.len(), 1);
        assert_eq!(config.view.zoom, 4.0);
        let built = config.field.build(Path::new(".")).unwrap();
        assert!(built.is_some());
    }

    #[test]
    fn test_empty_field_config_builds_nothing() {
        let built = FieldConfig::default().build(Path::new(".")).unwrap();
        assert!(built.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("windflow-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("particles.json");
        let config = ParticleConfig::default().with_num_particles(42).with_color_ramp(ColorRamp::wind());
        config.save(&path).unwrap();
        assert_eq!(ParticleConfig::load(&path).unwrap(), config);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
