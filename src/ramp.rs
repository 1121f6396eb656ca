//! Color ramps mapping particle speed to color.
//!
//! A ramp is an ordered list of stops rasterized into a 256-texel lookup
//! texture. The draw shader maps each particle's speed into [0, 1] through
//! the configured speed range and samples the ramp there.
//!
//! # Example
//!
//! ```
//! use windflow::ramp::{ColorRamp, ColorStop};
//!
//! let ramp = ColorRamp::new(vec![
//!     ColorStop::new(1.0, [255, 255, 255, 255]),
//!     ColorStop::new(0.0, [0, 0, 0, 255]),
//! ]);
//! assert_eq!(ramp.color_at(0.5), [128, 128, 128, 255]);
//! assert_eq!(ramp.to_texture().len(), 256 * 4);
//! ```
//!
//! # JSON form
//!
//! Stops serialize as `[position, [r, g, b]]` or `[position, [r, g, b, a]]`;
//! a missing alpha means opaque.

use serde::{Deserialize, Serialize};

/// Number of texels in a rasterized ramp.
pub const RAMP_WIDTH: usize = 256;

/// A single ramp stop: a position in [0, 1] and an RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f32, Vec<u8>)", into = "(f32, Vec<u8>)")]
pub struct ColorStop {
    pub position: f32,
    pub color: [u8; 4],
}

impl ColorStop {
    pub fn new(position: f32, color: [u8; 4]) -> Self {
        Self { position, color }
    }

    /// Opaque stop.
    pub fn rgb(position: f32, r: u8, g: u8, b: u8) -> Self {
        Self::new(position, [r, g, b, 255])
    }
}

impl TryFrom<(f32, Vec<u8>)> for ColorStop {
    type Error = String;

    fn try_from((position, color): (f32, Vec<u8>)) -> Result<Self, Self::Error> {
        match color.as_slice() {
            [r, g, b] => Ok(ColorStop::new(position, [*r, *g, *b, 255])),
            [r, g, b, a] => Ok(ColorStop::new(position, [*r, *g, *b, *a])),
            other => Err(format!(
                "color stop needs 3 or 4 components, got {}",
                other.len()
            )),
        }
    }
}

impl From<ColorStop> for (f32, Vec<u8>) {
    fn from(stop: ColorStop) -> Self {
        (stop.position, stop.color.to_vec())
    }
}

/// An ordered set of color stops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ColorStop>", into = "Vec<ColorStop>")]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Create a ramp. Stops are sorted ascending by position.
    pub fn new(mut stops: Vec<ColorStop>) -> Self {
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        if stops.is_empty() {
            log::warn!("color ramp has no stops, particles will be transparent");
        }
        Self { stops }
    }

    /// A ramp that yields `color` everywhere.
    pub fn constant(color: [u8; 4]) -> Self {
        Self::new(vec![ColorStop::new(0.0, color)])
    }

    /// Calm blues through greens and yellows to storm reds.
    pub fn wind() -> Self {
        Self::new(vec![
            ColorStop::rgb(0.0, 59, 130, 189),
            ColorStop::rgb(0.1, 102, 194, 165),
            ColorStop::rgb(0.2, 171, 221, 164),
            ColorStop::rgb(0.3, 230, 245, 152),
            ColorStop::rgb(0.4, 254, 224, 139),
            ColorStop::rgb(0.5, 253, 174, 97),
            ColorStop::rgb(0.6, 244, 109, 67),
            ColorStop::rgb(1.0, 213, 62, 79),
        ])
    }

    /// Stops in ascending position order.
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Interpolated color at `t`.
    ///
    /// Before the first stop the first color is used, past the last stop the
    /// last color. An empty ramp is transparent black.
    pub fn color_at(&self, t: f32) -> [u8; 4] {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return [0, 0, 0, 0],
        };
        if t <= first.position {
            return first.color;
        }
        for pair in self.stops.windows(2) {
            let (lo, hi) = (&pair[0], &pair[1]);
            if t <= hi.position {
                let span = hi.position - lo.position;
                if span <= 0.0 {
                    return hi.color;
                }
                let local_t = (t - lo.position) / span;
                return lerp_color(lo.color, hi.color, local_t);
            }
        }
        last.color
    }

    /// Rasterize into `RAMP_WIDTH` RGBA texels sampled at `i / 255`.
    pub fn to_texture(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(RAMP_WIDTH * 4);
        for i in 0..RAMP_WIDTH {
            let t = i as f32 / (RAMP_WIDTH - 1) as f32;
            data.extend_from_slice(&self.color_at(t));
        }
        data
    }
}

impl From<Vec<ColorStop>> for ColorRamp {
    fn from(stops: Vec<ColorStop>) -> Self {
        ColorRamp::new(stops)
    }
}

impl From<ColorRamp> for Vec<ColorStop> {
    fn from(ramp: ColorRamp) -> Self {
        ramp.stops
    }
}

/// Helper function for linear interpolation of u8 values.
fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    let a = a as f32;
    let b = b as f32;
    (a + (b - a) * t).round() as u8
}

fn lerp_color(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    [
        lerp_u8(a[0], b[0], t),
        lerp_u8(a[1], b[1], t),
        lerp_u8(a[2], b[2], t),
        lerp_u8(a[3], b[3], t),
    ]
}
