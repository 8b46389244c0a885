//! Background map tiles.
//!
//! The grid math assumes the raster scale equals [`zoom_scale`](crate::projection::zoom_scale) of
//! the grid's zoom, so every tile lands 1:1 on [`TILE_SIZE`] pixels.

use std::fmt;

use rayon::prelude::*;

use crate::{
    error::{TrailError, TrailResult},
    projection::{PlaneBounds, TILE_SIZE, lat_to_tile_y, lon_to_tile_x, plane_to_lat, plane_to_lon},
    raster::Raster,
};

/// Address of one tile in the slippy-map scheme. `y` grows southward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub zoom: u8,
    pub x: i64,
    pub y: i64,
}

impl TileKey {
    pub fn new(zoom: u8, x: i64, y: i64) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Tiles covering a plane-space box, anchored at its south-west corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub zoom: u8,
    pub west: i64,
    pub east: i64,
    /// Tile row holding the southern edge (the largest row index).
    pub south: i64,
    /// Tile row holding the northern edge.
    pub north: i64,
    /// Pixel offset of the west tile's left edge relative to the raster's left edge (`<= 0`).
    pub offset_x: i64,
    /// Pixels of the south tile lying above the southern edge.
    pub offset_y: i64,
}

impl TileGrid {
    pub fn covering(bounds: &PlaneBounds, zoom: u8) -> Self {
        let size = f64::from(TILE_SIZE);

        let west_dbl = lon_to_tile_x(zoom, plane_to_lon(bounds.min_x));
        let west = west_dbl.floor() as i64;
        let offset_x = (size * (west as f64 - west_dbl)).floor() as i64;

        let south_dbl = lat_to_tile_y(zoom, plane_to_lat(bounds.min_y));
        let south = south_dbl.floor() as i64;
        let offset_y = (size * (south_dbl - south as f64)).floor() as i64;

        let east = lon_to_tile_x(zoom, plane_to_lon(bounds.max_x)).floor() as i64;
        let north = lat_to_tile_y(zoom, plane_to_lat(bounds.max_y)).floor() as i64;

        Self {
            zoom,
            west,
            east,
            south,
            north,
            offset_x,
            offset_y,
        }
    }

    /// Columns west to east; within a column, rows south to north.
    pub fn keys(&self) -> Vec<TileKey> {
        let mut out = Vec::new();
        for x in self.west..=self.east {
            for y in (self.north..=self.south).rev() {
                out.push(TileKey::new(self.zoom, x, y));
            }
        }
        out
    }

    /// Top-left pixel of `key` within a raster `raster_height` pixels tall.
    pub fn placement(&self, key: TileKey, raster_height: u32) -> (i64, i64) {
        let size = i64::from(TILE_SIZE);
        let left = size * (key.x - self.west) + self.offset_x;
        let top = i64::from(raster_height) - (size * (self.south - key.y) + self.offset_y);
        (left, top)
    }
}

/// Source of decoded tile images.
pub trait TileSource: Sync {
    fn fetch(&self, key: TileKey) -> TrailResult<image::RgbImage>;
}

/// Tiles addressed by a URL template with `{zoom}`, `{x}` and `{y}` placeholders.
///
/// Only local files are read (`file://` prefix optional); remote templates fail with a
/// [`TrailError::TileFetch`] naming the URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateTileSource {
    template: String,
}

impl TemplateTileSource {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn url_for(&self, key: TileKey) -> String {
        self.template
            .replace("{zoom}", &key.zoom.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{y}", &key.y.to_string())
    }
}

impl TileSource for TemplateTileSource {
    fn fetch(&self, key: TileKey) -> TrailResult<image::RgbImage> {
        let url = self.url_for(key);
        tracing::debug!("reading tile {url}");

        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(TrailError::tile_fetch(
                &url,
                "remote tiles are not fetched; point the template at a local tile directory",
            ));
        }
        let path = url.strip_prefix("file://").unwrap_or(&url);
        let bytes = std::fs::read(path).map_err(|e| TrailError::tile_fetch(&url, e))?;
        let img = image::load_from_memory(&bytes).map_err(|e| TrailError::tile_fetch(&url, e))?;
        Ok(img.to_rgb8())
    }
}

/// Fetch every key in parallel; results keep the order of `keys`.
pub fn fetch_tiles(
    source: &dyn TileSource,
    keys: &[TileKey],
) -> TrailResult<Vec<(TileKey, image::RgbImage)>> {
    keys.par_iter()
        .map(|&key| source.fetch(key).map(|img| (key, img)))
        .collect()
}

/// Washes a tile channel toward white: `in·v + 255·(1 − v)` with `v = visibility / 100`.
fn rescale(channel: u8, visibility: f32) -> u8 {
    let v = visibility / 100.0;
    (f32::from(channel) * v + 255.0 * (1.0 - v)).clamp(0.0, 255.0) as u8
}

/// Copy `tile` into `dst` at `(left, top)`, clipped to the raster.
pub fn composite_tile(dst: &mut Raster, tile: &image::RgbImage, left: i64, top: i64, visibility: f32) {
    let (tw, th) = tile.dimensions();
    for ty in 0..th {
        let y = top + i64::from(ty);
        if y < 0 || y >= i64::from(dst.height) {
            continue;
        }
        for tx in 0..tw {
            let x = left + i64::from(tx);
            if x < 0 || x >= i64::from(dst.width) {
                continue;
            }
            let [r, g, b] = tile.get_pixel(tx, ty).0;
            dst.put_rgb(
                x as u32,
                y as u32,
                [
                    rescale(r, visibility),
                    rescale(g, visibility),
                    rescale(b, visibility),
                ],
            );
        }
    }
}

/// Fetch and composite every tile covering `bounds` onto `dst`.
#[tracing::instrument(level = "debug", skip(dst, source, bounds))]
pub fn draw_map(
    dst: &mut Raster,
    source: &dyn TileSource,
    bounds: &PlaneBounds,
    zoom: u8,
    visibility: f32,
) -> TrailResult<usize> {
    let grid = TileGrid::covering(bounds, zoom);
    let keys = grid.keys();
    tracing::debug!(tiles = keys.len(), ?grid, "tile grid");

    let tiles = fetch_tiles(source, &keys)?;
    for (key, tile) in &tiles {
        let (left, top) = grid.placement(*key, dst.height);
        composite_tile(dst, tile, left, top, visibility);
    }
    Ok(tiles.len())
}
