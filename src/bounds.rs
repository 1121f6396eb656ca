//! Geographic bounds and longitude wrapping.
//!
//! Particle positions are stored as `(longitude, latitude)` in degrees. The
//! map is drawn in a planar Web-Mercator space, but the globe is continuous
//! across the antimeridian, so every comparison against a bounding box first
//! wraps the longitude into the box's own window.
//!
//! # Example
//!
//! ```
//! use windflow::bounds::{wrap_bounds, wrap_longitude, GeoBounds};
//!
//! assert_eq!(wrap_longitude(190.0, None), -170.0);
//! // A viewport straddling the antimeridian stays a continuous window.
//! let window = wrap_bounds(GeoBounds::new(170.0, -10.0, 190.0, 10.0));
//! assert_eq!(window.west, 170.0);
//! assert_eq!(window.east, 190.0);
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Latitude limit of the square Web-Mercator world.
///
/// Beyond this the projection diverges, so viewport windows are clamped here.
pub const MERCATOR_MAX_LAT: f32 = 85.051_13;

/// A geographic rectangle in degrees, `[west, south, east, north]`.
///
/// `east` may exceed 180 when the rectangle crosses the antimeridian
/// (see [`wrap_bounds`]).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct GeoBounds {
    pub west: f32,
    pub south: f32,
    pub east: f32,
    pub north: f32,
}

impl GeoBounds {
    /// The whole globe.
    pub const WORLD: GeoBounds = GeoBounds {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    pub fn new(west: f32, south: f32, east: f32, north: f32) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Bounds as `[west, south, east, north]`, the layout used in uniforms.
    pub fn to_array(&self) -> [f32; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f32 {
        self.east - self.west
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f32 {
        self.north - self.south
    }

    /// True when both spans are positive and finite.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0
            && self.height() > 0.0
            && self.to_array().iter().all(|v| v.is_finite())
    }

    /// Whether `position` lies inside the bounds (edges inclusive).
    ///
    /// The longitude is wrapped to start at `west` first, so a position at
    /// -175° is inside a window spanning 170°..190°.
    pub fn contains(&self, position: Vec2) -> bool {
        let lng = wrap_longitude(position.x, Some(self.west));
        let lat = position.y;
        self.west <= lng && lng <= self.east && self.south <= lat && lat <= self.north
    }

    /// Normalized texture coordinate of `position` inside the bounds.
    ///
    /// `u` runs west to east and `v` north to south, matching image row order.
    pub fn to_uv(&self, position: Vec2) -> Vec2 {
        let lng = wrap_longitude(position.x, Some(self.west));
        Vec2::new(
            (lng - self.west) / (self.east - self.west),
            (position.y - self.north) / (self.south - self.north),
        )
    }

    /// Inverse of [`GeoBounds::to_uv`].
    pub fn from_uv(&self, uv: Vec2) -> Vec2 {
        Vec2::new(
            self.west + uv.x * (self.east - self.west),
            self.north + uv.y * (self.south - self.north),
        )
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::WORLD
    }
}

impl From<[f32; 4]> for GeoBounds {
    fn from(b: [f32; 4]) -> Self {
        GeoBounds::new(b[0], b[1], b[2], b[3])
    }
}

impl From<GeoBounds> for [f32; 4] {
    fn from(b: GeoBounds) -> Self {
        b.to_array()
    }
}

/// Wrap a longitude into `[-180, 180)`.
///
/// With `min_lng`, a wrapped value that falls below the minimum is moved one
/// revolution east, so the result lies in the continuous window starting at
/// `min_lng` rather than snapping back to the canonical range.
pub fn wrap_longitude(lng: f32, min_lng: Option<f32>) -> f32 {
    let mut wrapped = if (-180.0..180.0).contains(&lng) {
        lng
    } else {
        let w = (lng + 180.0).rem_euclid(360.0) - 180.0;
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if w >= 180.0 {
            w - 360.0
        } else {
            w
        }
    };
    if let Some(min_lng) = min_lng {
        if wrapped < min_lng {
            wrapped += 360.0;
        }
    }
    wrapped
}

/// Clamp a latitude to the poles.
#[inline]
pub fn clamp_latitude(lat: f32) -> f32 {
    lat.clamp(-90.0, 90.0)
}

/// Clamp a latitude to the Web-Mercator limit.
#[inline]
pub fn clamp_mercator_latitude(lat: f32) -> f32 {
    lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT)
}

/// Canonicalize a bounding box.
///
/// Boxes narrower than a full revolution keep their width: `west` is wrapped
/// freely and `east` is wrapped relative to it, so the pair is a valid
/// non-overlapping interval (possibly with `east > 180`). Wider boxes
/// collapse to `[-180, 180]`. Latitude is clamped to the poles.
pub fn wrap_bounds(bounds: GeoBounds) -> GeoBounds {
    let (west, east) = if bounds.east - bounds.west < 360.0 {
        let west = wrap_longitude(bounds.west, None);
        (west, wrap_longitude(bounds.east, Some(west)))
    } else {
        (-180.0, 180.0)
    };
    GeoBounds::new(
        west,
        clamp_latitude(bounds.south),
        east,
        clamp_latitude(bounds.north),
    )
}

/// Whether a position lies inside a bounding box, longitude-wrap aware.
#[inline]
pub fn is_position_in_bounds(position: Vec2, bounds: &GeoBounds) -> bool {
    bounds.contains(position)
}
