//! WGSL helper functions shared by the advection and draw shaders.
//!
//! Every helper that influences particle positions has a Rust twin in this
//! module so the CPU reference in [`crate::particles`] and the compute
//! shader make the same decisions for the same inputs.
//!
//! # Available Functions
//!
//! ## Random & Hash
//! - `hash(n: u32) -> u32` - Hash a u32 to pseudo-random u32
//! - `rand(seed: u32) -> f32` - Returns random float in [0, 1]
//! - `random_point(seed: u32, index: u32) -> vec2<f32>` - Per-lane point in the unit square
//!
//! ## Geography
//! - `wrap_longitude(lng: f32) -> f32` - Wrap into [-180, 180)
//! - `wrap_longitude_after(lng: f32, min_lng: f32) -> f32` - Wrap into the window starting at `min_lng`
//! - `is_in_bounds(position: vec2<f32>, bounds: vec4<f32>) -> bool`
//! - `bounds_uv(position: vec2<f32>, bounds: vec4<f32>) -> vec2<f32>`
//! - `is_dropped(position: vec2<f32>) -> bool`
//!
//! ## Raster decoding
//! - `raster_has_values(texel: vec4<f32>, unscale: vec2<f32>) -> bool`
//! - `raster_get_values(texel: vec4<f32>, unscale: vec2<f32>) -> vec2<f32>`

use glam::Vec2;

/// WGSL code for random/hash functions.
pub const RANDOM_WGSL: &str = r#"
// Hash functions for pseudo-random number generation
fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

// Random float in [0, 1]
fn rand(seed: u32) -> f32 {
    return f32(hash(seed)) / 4294967295.0;
}

// Independent point in the unit square for each (seed, lane) pair
fn random_point(seed: u32, index: u32) -> vec2<f32> {
    let s = hash(seed ^ index);
    return vec2<f32>(rand(s), rand(s ^ 0x9e3779b9u));
}
"#;

/// WGSL code for longitude wrapping and bounds tests.
///
/// Bounds are packed as `vec4(west, south, east, north)`.
pub const GEO_WGSL: &str = r#"
const DROP_POSITION: vec2<f32> = vec2<f32>(0.0, 0.0);

fn is_dropped(position: vec2<f32>) -> bool {
    return all(position == DROP_POSITION);
}

fn wrap_longitude(lng: f32) -> f32 {
    if lng >= -180.0 && lng < 180.0 {
        return lng;
    }
    var wrapped = lng - 360.0 * floor((lng + 180.0) / 360.0);
    if wrapped >= 180.0 {
        wrapped -= 360.0;
    }
    return wrapped;
}

fn wrap_longitude_after(lng: f32, min_lng: f32) -> f32 {
    var wrapped = wrap_longitude(lng);
    if wrapped < min_lng {
        wrapped += 360.0;
    }
    return wrapped;
}

fn is_in_bounds(position: vec2<f32>, bounds: vec4<f32>) -> bool {
    let lng = wrap_longitude_after(position.x, bounds.x);
    let lat = position.y;
    return bounds.x <= lng && lng <= bounds.z && bounds.y <= lat && lat <= bounds.w;
}

fn bounds_uv(position: vec2<f32>, bounds: vec4<f32>) -> vec2<f32> {
    let lng = wrap_longitude_after(position.x, bounds.x);
    return vec2<f32>(
        (lng - bounds.x) / (bounds.z - bounds.x),
        (position.y - bounds.w) / (bounds.y - bounds.w)
    );
}
"#;

/// WGSL code for decoding velocity texels.
///
/// With a proper unscale range (`min < max`) channels hold values normalized
/// to [0, 1] and alpha marks validity. A degenerate range means the channels
/// already hold physical units and NaN marks missing data.
pub const RASTER_WGSL: &str = r#"
fn is_nan_f32(v: f32) -> bool {
    return (bitcast<u32>(v) & 0x7fffffffu) > 0x7f800000u;
}

fn raster_has_values(texel: vec4<f32>, unscale: vec2<f32>) -> bool {
    if unscale.x < unscale.y {
        return texel.a == 1.0;
    }
    return !is_nan_f32(texel.r);
}

fn raster_get_values(texel: vec4<f32>, unscale: vec2<f32>) -> vec2<f32> {
    if unscale.x < unscale.y {
        return mix(vec2<f32>(unscale.x), vec2<f32>(unscale.y), texel.rg);
    }
    return texel.rg;
}
"#;

/// Get all shared helper functions combined.
pub fn all_utils_wgsl() -> String {
    format!(
        "// Shared helper functions\n{}\n{}\n{}\n",
        RANDOM_WGSL, GEO_WGSL, RASTER_WGSL
    )
}

/// Rust twin of the WGSL `hash`.
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5ad4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x31848bab);
    x ^= x >> 14;
    x
}

/// Rust twin of the WGSL `rand`.
#[inline]
pub fn rand(seed: u32) -> f32 {
    hash(seed) as f32 / 4294967295.0
}

/// Rust twin of the WGSL `random_point`.
#[inline]
pub fn random_point(seed: u32, index: u32) -> Vec2 {
    let s = hash(seed ^ index);
    Vec2::new(rand(s), rand(s ^ 0x9e37_79b9))
}

/// Hermite smoothstep on [0, 1].
#[inline]
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
