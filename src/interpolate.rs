//! Velocity fields from sparse wind observations.
//!
//! Station reports give speed and the direction the wind blows *from*. They
//! are converted to `(u, v)` components, spread over a regular grid with
//! inverse-distance weighting, and packed into an 8-bit RGBA raster that
//! decodes through a single unscale range.
//!
//! ```
//! use windflow::bounds::GeoBounds;
//! use windflow::interpolate::{interpolate_field, WindSample};
//!
//! let samples = [
//!     WindSample::new(10.0, -10.0, 5.0, 270.0), // westerly
//!     WindSample::new(-10.0, 10.0, 8.0, 0.0),   // northerly
//! ];
//! let bounds = GeoBounds::new(-20.0, -20.0, 20.0, 20.0);
//! let field = interpolate_field(&samples, bounds, 2.0, 2.0).unwrap();
//! assert_eq!((field.width(), field.height()), (20, 20));
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::bounds::{wrap_longitude, GeoBounds};
use crate::error::FieldError;
use crate::field::VelocityField;

/// Default IDW distance exponent.
pub const DEFAULT_EXPONENT: f32 = 2.0;

/// Distance in degrees under which a grid point takes a sample's value as is.
pub const EXACT_MATCH_EPSILON: f32 = 1e-6;

/// A point observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    pub lat: f32,
    pub lon: f32,
    /// Wind speed in field units.
    pub speed: f32,
    /// Direction the wind comes from, degrees clockwise from north.
    pub direction: f32,
}

impl WindSample {
    pub fn new(lat: f32, lon: f32, speed: f32, direction: f32) -> Self {
        Self {
            lat,
            lon,
            speed,
            direction,
        }
    }

    /// `(lon, lat)` position.
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.lon, self.lat)
    }

    /// Eastward and northward components.
    pub fn components(&self) -> Vec2 {
        let dir = self.direction.to_radians();
        Vec2::new(-self.speed * dir.sin(), -self.speed * dir.cos())
    }
}

/// Planar distance in degrees, measuring longitude the short way round.
fn distance(a: Vec2, b: Vec2) -> f32 {
    let dlng = wrap_longitude(a.x - b.x, None);
    Vec2::new(dlng, a.y - b.y).length()
}

/// Inverse-distance-weighted `(u, v)` at `point`.
///
/// A sample closer than [`EXACT_MATCH_EPSILON`] is returned unchanged.
pub fn idw(samples: &[(Vec2, Vec2)], point: Vec2, exponent: f32) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut weight_sum = 0.0;
    for &(position, value) in samples {
        let d = distance(point, position);
        if d < EXACT_MATCH_EPSILON {
            return value;
        }
        let w = 1.0 / d.powf(exponent);
        sum += value * w;
        weight_sum += w;
    }
    if weight_sum > 0.0 {
        sum / weight_sum
    } else {
        Vec2::ZERO
    }
}

/// Grid dimensions covering `bounds` at `resolution` degrees per texel.
pub fn grid_size(bounds: GeoBounds, resolution: f32) -> (u32, u32) {
    let cells = |span: f32| ((span / resolution).ceil() as u32).max(1);
    (cells(bounds.width()), cells(bounds.height()))
}

/// Interpolate `(u, v)` at every texel center of a `width x height` grid,
/// row-major, north row first.
pub fn interpolate_grid(
    samples: &[WindSample],
    bounds: GeoBounds,
    width: u32,
    height: u32,
    exponent: f32,
) -> Result<Vec<Vec2>, FieldError> {
    if samples.is_empty() {
        return Err(FieldError::NoSamples);
    }
    if width == 0 || height == 0 {
        return Err(FieldError::EmptyGrid { width, height });
    }
    let points: Vec<(Vec2, Vec2)> = samples
        .iter()
        .map(|s| (s.position(), s.components()))
        .collect();

    let mut grid = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let uv = Vec2::new(
                (x as f32 + 0.5) / width as f32,
                (y as f32 + 0.5) / height as f32,
            );
            grid.push(idw(&points, bounds.from_uv(uv), exponent));
        }
    }
    Ok(grid)
}

/// Pack `(u, v)` values into RGBA8 texels normalized over one shared range.
///
/// Returns the bytes and the `[min, max]` unscale range. A constant grid gets
/// a range one unit wide on each side so it still decodes as scaled data.
pub fn rasterize(values: &[Vec2]) -> (Vec<u8>, [f32; 2]) {
    let (mut min, mut max) = values.iter().fold((f32::MAX, f32::MIN), |(lo, hi), v| {
        (lo.min(v.x).min(v.y), hi.max(v.x).max(v.y))
    });
    if values.is_empty() {
        return (Vec::new(), [0.0, 1.0]);
    }
    if max - min < f32::EPSILON {
        min -= 1.0;
        max += 1.0;
    }
    let scale = |c: f32| ((c - min) / (max - min) * 255.0).round().clamp(0.0, 255.0) as u8;
    let mut data = Vec::with_capacity(values.len() * 4);
    for v in values {
        data.extend_from_slice(&[scale(v.x), scale(v.y), 0, 255]);
    }
    (data, [min, max])
}

/// Build a scaled velocity field from observations.
pub fn interpolate_field(
    samples: &[WindSample],
    bounds: GeoBounds,
    resolution: f32,
    exponent: f32,
) -> Result<VelocityField, FieldError> {
    if !bounds.is_valid() {
        return Err(FieldError::InvalidBounds(bounds.to_array()));
    }
    let resolution = if resolution > 0.0 { resolution } else { 1.0 };
    let (width, height) = grid_size(bounds, resolution);
    let grid = interpolate_grid(samples, bounds, width, height, exponent)?;
    let (data, unscale) = rasterize(&grid);
    log::debug!(
        "interpolated {} samples onto {}x{} grid, unscale {:?}",
        samples.len(),
        width,
        height,
        unscale
    );
    VelocityField::from_rgba8(&data, width, height, bounds, unscale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_components_follow_meteorological_convention() {
        assert!(approx(WindSample::new(0.0, 0.0, 5.0, 270.0).components(), Vec2::new(5.0, 0.0)));
        assert!(approx(WindSample::new(0.0, 0.0, 5.0, 0.0).components(), Vec2::new(0.0, -5.0)));
        assert!(approx(WindSample::new(0.0, 0.0, 5.0, 180.0).components(), Vec2::new(0.0, 5.0)));
    }

    #[test]
    fn test_idw_exact_match() {
        let samples = [
            (Vec2::new(0.0, 0.0), Vec2::new(1.0, 2.0)),
            (Vec2::new(10.0, 0.0), Vec2::new(5.0, 5.0)),
        ];
        assert_eq!(idw(&samples, Vec2::new(0.0, 0.0), 2.0), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_idw_midpoint_averages() {
        let samples = [
            (Vec2::new(-1.0, 0.0), Vec2::new(0.0, 0.0)),
            (Vec2::new(1.0, 0.0), Vec2::new(2.0, 4.0)),
        ];
        assert!(approx(idw(&samples, Vec2::ZERO, 2.0), Vec2::new(1.0, 2.0)));
    }

    #[test]
    fn test_idw_exponent_sharpens() {
        let samples = [
            (Vec2::new(0.0, 0.0), Vec2::new(0.0, 0.0)),
            (Vec2::new(4.0, 0.0), Vec2::new(10.0, 0.0)),
        ];
        let soft = idw(&samples, Vec2::new(1.0, 0.0), 1.0);
        let sharp = idw(&samples, Vec2::new(1.0, 0.0), 4.0);
        assert!(sharp.x < soft.x);
    }

    #[test]
    fn test_distance_wraps_antimeridian() {
        assert!((distance(Vec2::new(179.0, 0.0), Vec2::new(-179.0, 0.0)) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_grid_size() {
        assert_eq!(grid_size(GeoBounds::WORLD, 1.0), (360, 180));
        assert_eq!(grid_size(GeoBounds::new(0.0, 0.0, 2.5, 1.0), 1.0), (3, 1));
    }

    #[test]
    fn test_no_samples_is_error() {
        let err = interpolate_grid(&[], GeoBounds::WORLD, 2, 2, 2.0);
        assert!(matches!(err, Err(FieldError::NoSamples)));
    }

    #[test]
    fn test_rasterize_shared_range() {
        let (data, unscale) = rasterize(&[Vec2::new(-4.0, 0.0), Vec2::new(4.0, 2.0)]);
        assert_eq!(unscale, [-4.0, 4.0]);
        assert_eq!(&data[0..4], &[0, 128, 0, 255]);
        assert_eq!(&data[4..8], &[255, 191, 0, 255]);
    }

    #[test]
    fn test_rasterize_constant_grid() {
        let (data, unscale) = rasterize(&[Vec2::splat(3.0); 4]);
        assert_eq!(unscale, [2.0, 4.0]);
        assert!(data.chunks_exact(4).all(|px| px == [128, 128, 0, 255]));
    }

    #[test]
    fn test_interpolated_field_decodes_near_samples() {
        let samples = [WindSample::new(0.0, 0.0, 10.0, 270.0)];
        let field = interpolate_field(&samples, GeoBounds::new(-5.0, -5.0, 5.0, 5.0), 1.0, 2.0)
            .unwrap();
        let v = field.velocity_at(Vec2::new(0.2, 0.2)).unwrap();
        assert!((v.x - 10.0).abs() < 0.1);
        assert!(v.y.abs() < 0.1);
    }
}
