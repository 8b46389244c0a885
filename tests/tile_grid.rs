use std::sync::Mutex;

use trailreel::{
    AnimationConfig, AnimationEngine, GeoPoint, TileKey, TileSource, TrackStyle, TrailError,
    TrailResult, project,
};

/// Solid tiles whose color encodes the tile address.
struct Recording {
    seen: Mutex<Vec<TileKey>>,
}

impl Recording {
    fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
        }
    }

    fn color(key: TileKey) -> [u8; 3] {
        [(key.x * 40) as u8, (key.y * 40) as u8, 0]
    }
}

impl TileSource for Recording {
    fn fetch(&self, key: TileKey) -> TrailResult<image::RgbImage> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(key);
        }
        Ok(image::RgbImage::from_pixel(
            256,
            256,
            image::Rgb(Self::color(key)),
        ))
    }
}

struct Failing;

impl TileSource for Failing {
    fn fetch(&self, key: TileKey) -> TrailResult<image::RgbImage> {
        Err(TrailError::tile_fetch(format!("tiles/{key}.png"), "tile unavailable"))
    }
}

fn config(visibility: f32) -> AnimationConfig {
    AnimationConfig {
        zoom: Some(3),
        fps: 1.0,
        speedup: Some(1.0),
        tail_duration_ms: 0,
        font_size: 0.0,
        background_map_visibility: visibility,
        tracks: vec![TrackStyle::new("world.gpx")],
        ..AnimationConfig::default()
    }
}

fn world_track() -> Vec<Vec<Vec<GeoPoint>>> {
    vec![vec![vec![
        GeoPoint::timed(-45.0, -80.0, 0),
        GeoPoint::timed(30.0, 30.0, 5_000),
    ]]]
}

#[test]
fn zoom_3_box_requests_exactly_nine_tiles() {
    let source = Recording::new();
    let engine = AnimationEngine::prepare_with(&config(100.0), world_track(), Some(&source))
        .unwrap();
    assert_eq!(engine.layout().zoom, Some(3));

    let mut seen: Vec<(i64, i64)> = source
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|k| (k.x, k.y))
        .collect();
    seen.sort();
    let mut expected = Vec::new();
    for x in 2..=4 {
        for y in (3..=5).rev() {
            expected.push((x, y));
        }
    }
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn tiles_land_under_their_geographic_position() {
    let source = Recording::new();
    let engine = AnimationEngine::prepare_with(&config(100.0), world_track(), Some(&source))
        .unwrap();
    let bg = engine.background();
    let t = engine.layout().transform;

    // (-20, -50) lies well inside tile 2/4; (20, 20) inside tile 4/3.
    for (lat, lon, key) in [(-20.0, -50.0, (2, 4)), (20.0, 20.0, (4, 3))] {
        let p = t.apply(project(lat, lon));
        let px = bg.pixel(p.x as u32, p.y as u32).unwrap();
        let want = Recording::color(TileKey::new(3, key.0, key.1));
        assert_eq!([px[0], px[1], px[2]], want, "at {lat},{lon}");
    }
}

#[test]
fn low_visibility_washes_tiles_toward_white() {
    let source = Recording::new();
    let engine = AnimationEngine::prepare_with(&config(0.0), world_track(), Some(&source))
        .unwrap();
    assert!(
        engine
            .background()
            .data
            .chunks_exact(4)
            .all(|px| px == [255, 255, 255, 255])
    );
}

#[test]
fn tile_failure_aborts_preparation() {
    let err = AnimationEngine::prepare_with(&config(50.0), world_track(), Some(&Failing))
        .unwrap_err();
    assert!(matches!(err, TrailError::TileFetch { .. }));
    assert!(err.to_string().contains("tiles/3/"));
}

#[test]
fn map_without_zoom_derives_one_from_width() {
    let cfg = AnimationConfig {
        zoom: None,
        width: 800,
        ..config(50.0)
    };
    let source = Recording::new();
    let engine = AnimationEngine::prepare_with(&cfg, world_track(), Some(&source)).unwrap();
    // 110 degrees of longitude in 760 px: 2^z * 256 * 110/360 <= 760.
    assert_eq!(engine.layout().zoom, Some(3));
}
