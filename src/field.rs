//! Velocity fields sampled by the advection stage.
//!
//! A field is a raster of texels over a geographic bounding box. Channel R
//! holds the east-west component, channel G the north-south component.
//!
//! # Encodings
//!
//! - **Scaled** (`unscale = [min, max]` with `min < max`): R and G are
//!   normalized to [0, 1] over the range, alpha is 1.0 for valid texels.
//!   This is what 8-bit PNG wind images carry.
//! - **Physical** (`min >= max`): R and G already hold physical units,
//!   NaN in R marks a texel without data.
//!
//! # Example
//!
//! ```
//! use windflow::bounds::GeoBounds;
//! use windflow::field::VelocityField;
//!
//! // 2x1 field: full eastward wind on the left, no data on the right.
//! let data = [255, 128, 0, 255, 0, 0, 0, 0];
//! let field = VelocityField::from_rgba8(&data, 2, 1, GeoBounds::WORLD, [-10.0, 10.0]).unwrap();
//! assert!(field.velocity_at(glam::Vec2::new(-90.0, 0.0)).is_some());
//! assert!(field.velocity_at(glam::Vec2::new(90.0, 0.0)).is_none());
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;

use crate::bounds::GeoBounds;
use crate::error::FieldError;

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// An immutable velocity raster with its geographic placement.
///
/// Each constructed field gets a process-unique [`id`](VelocityField::id).
/// Replacing the field a layer renders with a newly built one changes the
/// pipeline token and triggers a rebuild; clones share the id.
#[derive(Clone, Debug)]
pub struct VelocityField {
    id: u64,
    width: u32,
    height: u32,
    texels: Vec<[f32; 4]>,
    bounds: GeoBounds,
    unscale: [f32; 2],
}

impl VelocityField {
    /// Build a field from raw texels in row-major order, north row first.
    pub fn from_texels(
        texels: Vec<[f32; 4]>,
        width: u32,
        height: u32,
        bounds: GeoBounds,
        unscale: [f32; 2],
    ) -> Result<Self, FieldError> {
        if width == 0 || height == 0 {
            return Err(FieldError::EmptyGrid { width, height });
        }
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(FieldError::SizeMismatch {
                expected,
                actual: texels.len(),
            });
        }
        if !bounds.is_valid() {
            return Err(FieldError::InvalidBounds(bounds.to_array()));
        }
        Ok(Self {
            id: NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            texels,
            bounds,
            unscale,
        })
    }

    /// Build a scaled field from 8-bit RGBA data (4 bytes per texel).
    pub fn from_rgba8(
        data: &[u8],
        width: u32,
        height: u32,
        bounds: GeoBounds,
        unscale: [f32; 2],
    ) -> Result<Self, FieldError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(FieldError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let texels = data
            .chunks_exact(4)
            .map(|px| {
                [
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                    px[3] as f32 / 255.0,
                ]
            })
            .collect();
        Self::from_texels(texels, width, height, bounds, unscale)
    }

    /// Load a scaled field from a PNG or JPEG wind image.
    pub fn from_image<P: AsRef<Path>>(
        path: P,
        bounds: GeoBounds,
        unscale: [f32; 2],
    ) -> Result<Self, FieldError> {
        let img = image::open(path.as_ref())?.into_rgba8();
        let (width, height) = img.dimensions();
        log::debug!(
            "loaded wind image {} ({}x{})",
            path.as_ref().display(),
            width,
            height
        );
        Self::from_rgba8(img.as_raw(), width, height, bounds, unscale)
    }

    /// Build a physical-unit field from `(u, v)` pairs. NaN components mark
    /// texels without data.
    pub fn from_physical(
        values: &[Vec2],
        width: u32,
        height: u32,
        bounds: GeoBounds,
    ) -> Result<Self, FieldError> {
        let texels = values.iter().map(|v| [v.x, v.y, 0.0, 1.0]).collect();
        Self::from_texels(texels, width, height, bounds, [0.0, 0.0])
    }

    /// Build a physical-unit field by evaluating `f` at every texel center.
    ///
    /// `f` receives `(longitude, latitude)` and returns `None` for no data.
    pub fn from_fn<F>(width: u32, height: u32, bounds: GeoBounds, f: F) -> Result<Self, FieldError>
    where
        F: Fn(Vec2) -> Option<Vec2>,
    {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let uv = Vec2::new(
                    (x as f32 + 0.5) / width as f32,
                    (y as f32 + 0.5) / height as f32,
                );
                let v = f(bounds.from_uv(uv)).unwrap_or(Vec2::splat(f32::NAN));
                values.push(v);
            }
        }
        Self::from_physical(&values, width, height, bounds)
    }

    /// Process-unique identity of this field.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Geographic extent covered by the raster.
    #[inline]
    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// Range that normalized samples decode into.
    #[inline]
    pub fn unscale(&self) -> [f32; 2] {
        self.unscale
    }

    /// Raw texels, row-major, north row first.
    #[inline]
    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    /// Whether samples are normalized over the unscale range.
    #[inline]
    pub fn is_scaled(&self) -> bool {
        self.unscale[0] < self.unscale[1]
    }

    /// Texel at integer coordinates (clamped to the raster).
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Nearest texel for a geographic position.
    ///
    /// Uses the same texel addressing as the compute shader's `textureLoad`.
    pub fn sample_raw(&self, position: Vec2) -> [f32; 4] {
        let uv = self.bounds.to_uv(position);
        let x = (uv.x * self.width as f32).floor().clamp(0.0, (self.width - 1) as f32);
        let y = (uv.y * self.height as f32).floor().clamp(0.0, (self.height - 1) as f32);
        self.texel(x as u32, y as u32)
    }

    /// Whether a texel carries data under this field's encoding.
    pub fn has_values(&self, texel: [f32; 4]) -> bool {
        if self.is_scaled() {
            texel[3] == 1.0
        } else {
            !texel[0].is_nan()
        }
    }

    /// Decode a texel into physical `(u, v)`.
    pub fn decode(&self, texel: [f32; 4]) -> Vec2 {
        if self.is_scaled() {
            let [min, max] = self.unscale;
            Vec2::new(
                min * (1.0 - texel[0]) + max * texel[0],
                min * (1.0 - texel[1]) + max * texel[1],
            )
        } else {
            Vec2::new(texel[0], texel[1])
        }
    }

    /// Physical velocity at a position, or `None` outside the bounds or on a
    /// texel without data.
    pub fn velocity_at(&self, position: Vec2) -> Option<Vec2> {
        if !self.bounds.contains(position) {
            return None;
        }
        let texel = self.sample_raw(position);
        self.has_values(texel).then(|| self.decode(texel))
    }
}
