//! Spherical web-Mercator math.
//!
//! Geographic coordinates go through two stages: [`project`] maps latitude/longitude into the
//! unbounded plane space once per sample, and [`PixelTransform`] maps plane space into pixels once
//! the union of every track's extent (and therefore the scale) is known.

use std::f64::consts::{FRAC_PI_4, PI};

use crate::core::Point;

/// Edge length of a map tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Highest zoom level accepted from configuration or derived automatically.
pub const MAX_ZOOM: u8 = 22;

/// `x = radians(lon)`, `y = ln(tan(π/4 + radians(lat)/2))`.
pub fn project(lat: f64, lon: f64) -> Point {
    Point::new(
        lon.to_radians(),
        (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
    )
}

pub fn plane_to_lon(x: f64) -> f64 {
    x.to_degrees()
}

pub fn plane_to_lat(y: f64) -> f64 {
    (2.0 * (y.exp().atan() - FRAC_PI_4)).to_degrees()
}

/// Fractional tile column of `lon` at `zoom`.
pub fn lon_to_tile_x(zoom: u8, lon: f64) -> f64 {
    (lon + 180.0) / 360.0 * tiles_per_axis(zoom)
}

/// Fractional tile row of `lat` at `zoom`. Rows grow southward.
pub fn lat_to_tile_y(zoom: u8, lat: f64) -> f64 {
    let lat = lat.to_radians();
    (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * tiles_per_axis(zoom)
}

/// Pixels per plane unit when tiles are drawn 1:1 at `zoom`.
pub fn zoom_scale(zoom: u8) -> f64 {
    128.0 * tiles_per_axis(zoom) / PI
}

fn tiles_per_axis(zoom: u8) -> f64 {
    f64::from(1u32 << u32::from(zoom.min(MAX_ZOOM)))
}

/// Axis-aligned box in plane space. Plane `y` grows northward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for PlaneBounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl PlaneBounds {
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(&self, other: &PlaneBounds) -> PlaneBounds {
        PlaneBounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow every side by `d` plane units.
    pub fn expanded(&self, d: f64) -> PlaneBounds {
        PlaneBounds {
            min_x: self.min_x - d,
            min_y: self.min_y - d,
            max_x: self.max_x + d,
            max_y: self.max_y + d,
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Plane space to pixel space: origin at the north-west corner of `bounds`, `y` flipped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelTransform {
    pub min_x: f64,
    pub max_y: f64,
    pub scale: f64,
}

impl PixelTransform {
    pub fn new(bounds: &PlaneBounds, scale: f64) -> Self {
        Self {
            min_x: bounds.min_x,
            max_y: bounds.max_y,
            scale,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.min_x) * self.scale,
            (self.max_y - p.y) * self.scale,
        )
    }
}
