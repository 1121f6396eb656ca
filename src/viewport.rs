//! Web-Mercator viewport consumed by the particle pipeline.
//!
//! The host map owns the camera. Once per tick the pipeline only needs the
//! visible geographic window, the zoom level, and a matrix placing
//! normalized Mercator coordinates in clip space. [`Viewport`] provides all
//! three from a center, zoom and pixel size, the same parameterisation slippy
//! maps use.

use std::f32::consts::PI;

use glam::{Mat4, Vec2};

use crate::bounds::{clamp_mercator_latitude, wrap_bounds, GeoBounds};

/// World size in pixels at zoom 0.
pub const TILE_SIZE: f32 = 512.0;

/// Project `(longitude, latitude)` to normalized Web-Mercator coordinates.
///
/// `x` runs 0..1 west to east across one world copy (values outside that
/// range address neighbouring copies), `y` runs 0..1 north to south.
pub fn lng_lat_to_world(position: Vec2) -> Vec2 {
    let lat = clamp_mercator_latitude(position.y).to_radians();
    Vec2::new(
        (position.x + 180.0) / 360.0,
        (1.0 - (PI / 4.0 + lat / 2.0).tan().ln() / PI) / 2.0,
    )
}

/// Inverse of [`lng_lat_to_world`].
pub fn world_to_lng_lat(world: Vec2) -> Vec2 {
    let lat = (PI * (1.0 - 2.0 * world.y)).sinh().atan().to_degrees();
    Vec2::new(world.x * 360.0 - 180.0, lat)
}

/// Per-tick advection scale: the configured speed factor shrinks by half
/// for every zoom level so apparent speed on screen stays constant.
pub fn tick_speed_factor(speed_factor: f32, zoom: f32) -> f32 {
    speed_factor / 2f32.powf(zoom + 7.0)
}

/// Density-culling factor after a zoom change.
///
/// Zooming out by one level makes the same particles cover a quarter of the
/// screen area; the factor `2^(4 * (previous - current))` exceeds 1 in that
/// case and the advection stage keeps only one lane in every `factor`.
/// Zooming in gives a factor below 1, which never culls: the factor grows
/// with `previous - current`, the opposite sign of a zoom-in delta.
pub fn zoom_change_factor(previous_zoom: Option<f32>, zoom: f32) -> f32 {
    match previous_zoom {
        Some(previous) => 2f32.powf((previous - zoom) * 4.0),
        None => 1.0,
    }
}

/// A map view: center `(longitude, latitude)`, fractional zoom, pixel size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center: Vec2,
    pub zoom: f32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(center: Vec2, zoom: f32, width: u32, height: u32) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
        }
    }

    /// World size in pixels at the current zoom.
    pub fn world_size(&self) -> f32 {
        TILE_SIZE * 2f32.powf(self.zoom)
    }

    /// Visible window in normalized world coordinates as `(min, max)`.
    fn world_window(&self) -> (Vec2, Vec2) {
        let center = lng_lat_to_world(self.center);
        let half = Vec2::new(self.width as f32, self.height as f32) * 0.5 / self.world_size();
        (center - half, center + half)
    }

    /// Visible geographic rectangle before wrapping.
    ///
    /// Longitudes may leave [-180, 180] when the view shows more than one
    /// world copy; latitude is limited to the Mercator world.
    pub fn bounds(&self) -> GeoBounds {
        let (min, max) = self.world_window();
        let north_west = world_to_lng_lat(Vec2::new(min.x, min.y.max(0.0)));
        let south_east = world_to_lng_lat(Vec2::new(max.x, max.y.min(1.0)));
        GeoBounds::new(north_west.x, south_east.y, south_east.x, north_west.y)
    }

    /// Visible window wrapped into canonical longitude, used to cull and
    /// reseed particles.
    pub fn wrapped_bounds(&self) -> GeoBounds {
        wrap_bounds(self.bounds())
    }

    /// Matrix from normalized Mercator world coordinates to clip space.
    pub fn view_proj(&self) -> Mat4 {
        let (min, max) = self.world_window();
        // World y grows southwards, so the bottom edge is the larger value.
        Mat4::orthographic_rh(min.x, max.x, max.y, min.y, -1.0, 1.0)
    }

    /// Pan by a screen-space pixel delta (drag right moves the map right).
    pub fn pan_pixels(&mut self, dx: f32, dy: f32) {
        let world = lng_lat_to_world(self.center) - Vec2::new(dx, dy) / self.world_size();
        let center = world_to_lng_lat(Vec2::new(world.x, world.y.clamp(0.0, 1.0)));
        self.center = Vec2::new(
            crate::bounds::wrap_longitude(center.x, None),
            clamp_mercator_latitude(center.y),
        );
    }

    /// Change zoom by `delta` levels, limited to 0..=20.
    pub fn zoom_by(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(0.0, 20.0);
    }

    /// Update the pixel size, ignoring zero-sized surfaces.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Vec2::ZERO, 1.0, 1024, 1024)
    }
}
