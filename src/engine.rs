//! Two-phase animation driver.
//!
//! [`AnimationEngine::prepare`] resolves everything that stays fixed for the whole run (bounds,
//! zoom, scale, frame schedule, background). [`AnimationEngine::run`] then renders frames in
//! index order, carrying the permanent trail from one frame to the next.

use crate::{
    color::Rgb8,
    config::AnimationConfig,
    core::{FrameIndex, RawTrack},
    error::{TrailError, TrailResult},
    gpx::TrackSource,
    projection::{MAX_ZOOM, PixelTransform, PlaneBounds, project, zoom_scale},
    raster::Raster,
    schedule::FrameScheduler,
    sink::{FrameSink, SinkConfig},
    text::TextRenderer,
    tiles::{TemplateTileSource, TileSource, draw_map},
    timeline::{TrackSegment, TrackTimeline},
    trail::{TrackLayer, TrailRenderer},
};

/// Geometry fixed during phase 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameLayout {
    /// Union of all samples, before the margin is added.
    pub track_bounds: PlaneBounds,
    /// `track_bounds` grown by `margin / scale`; maps onto the full raster.
    pub bounds: PlaneBounds,
    pub zoom: Option<u8>,
    /// Pixels per plane unit.
    pub scale: f64,
    pub width: u32,
    pub height: u32,
    pub transform: PixelTransform,
}

impl FrameLayout {
    /// Fixed zoom wins; otherwise a zoom is derived when a map is drawn, and the scale fits the
    /// requested width (and height, when set) without one.
    pub fn resolve(
        config: &AnimationConfig,
        track_bounds: PlaneBounds,
        with_map: bool,
    ) -> TrailResult<Self> {
        if track_bounds.is_empty() {
            return Err(TrailError::configuration(
                "tracks contain no timed samples",
            ));
        }
        let margin = f64::from(config.margin);

        let zoom = match config.zoom {
            Some(z) => Some(z),
            None if with_map => Some(auto_zoom(config, &track_bounds)?),
            None => None,
        };
        let scale = match zoom {
            Some(z) => zoom_scale(z),
            None => fit_scale(config, &track_bounds)?,
        };

        let bounds = track_bounds.expanded(margin / scale);
        let width = pixel_extent(bounds.width() * scale, "width")?;
        let height = pixel_extent(bounds.height() * scale, "height")?;

        Ok(Self {
            track_bounds,
            bounds,
            zoom,
            scale,
            width,
            height,
            transform: PixelTransform::new(&bounds, scale),
        })
    }
}

fn inner_extent(size: u32, margin: u32) -> f64 {
    f64::from(size) - 2.0 * f64::from(margin)
}

/// Largest zoom whose tiles keep the tracks within the requested size.
fn auto_zoom(config: &AnimationConfig, b: &PlaneBounds) -> TrailResult<u8> {
    if b.width() <= 0.0 {
        return Err(TrailError::configuration(
            "cannot derive a zoom level: tracks have no horizontal extent; set zoom explicitly",
        ));
    }
    let mut z = (std::f64::consts::PI / 128.0 * inner_extent(config.width, config.margin)
        / b.width())
    .log2()
    .floor();
    if let Some(h) = config.height
        && b.height() > 0.0
    {
        let zh = (std::f64::consts::PI / 128.0 * inner_extent(h, config.margin) / b.height())
            .log2()
            .floor();
        z = z.min(zh);
    }
    let zoom = z.clamp(0.0, f64::from(MAX_ZOOM)) as u8;
    tracing::debug!(zoom, "computed zoom");
    Ok(zoom)
}

fn fit_scale(config: &AnimationConfig, b: &PlaneBounds) -> TrailResult<f64> {
    if b.width() <= 0.0 {
        return Err(TrailError::configuration(
            "cannot fit tracks to the requested width: tracks have no horizontal extent; set zoom explicitly",
        ));
    }
    let mut scale = inner_extent(config.width, config.margin) / b.width();
    if let Some(h) = config.height
        && b.height() > 0.0
    {
        scale = scale.min(inner_extent(h, config.margin) / b.height());
    }
    Ok(scale)
}

fn pixel_extent(px: f64, what: &str) -> TrailResult<u32> {
    let px = px.floor();
    if !px.is_finite() || px < 1.0 || px > f64::from(u16::MAX) {
        return Err(TrailError::configuration(format!(
            "image {what} of {px} px is out of range (1..={})",
            u16::MAX
        )));
    }
    Ok(px as u32)
}

/// Load every configured track through `source`, in configuration order.
pub fn load_tracks(config: &AnimationConfig, source: &dyn TrackSource) -> TrailResult<Vec<RawTrack>> {
    config.tracks.iter().map(|style| source.load(style)).collect()
}

#[derive(Debug)]
pub struct AnimationEngine {
    layout: FrameLayout,
    scheduler: FrameScheduler,
    renderer: TrailRenderer,
    background: Raster,
}

impl AnimationEngine {
    /// Phase 1 from configuration: tracks come from `source`, tiles from the configured template.
    pub fn prepare(config: &AnimationConfig, source: &dyn TrackSource) -> TrailResult<Self> {
        let raw = load_tracks(config, source)?;
        let template = config
            .tile_url_template
            .as_deref()
            .map(TemplateTileSource::new);
        Self::prepare_with(
            config,
            raw,
            template.as_ref().map(|t| t as &dyn TileSource),
        )
    }

    /// Phase 1 from already loaded tracks, one [`RawTrack`] per configured track.
    #[tracing::instrument(level = "info", skip_all, fields(tracks = raw.len()))]
    pub fn prepare_with(
        config: &AnimationConfig,
        raw: Vec<RawTrack>,
        tiles: Option<&dyn TileSource>,
    ) -> TrailResult<Self> {
        config.validate()?;
        if raw.len() != config.tracks.len() {
            return Err(TrailError::configuration(format!(
                "{} tracks loaded for {} configured",
                raw.len(),
                config.tracks.len()
            )));
        }

        let mut bounds = PlaneBounds::empty();
        let mut timelines = Vec::with_capacity(raw.len());
        for (style, track) in config.tracks.iter().zip(&raw) {
            if let Some(p) = track.iter().flatten().find(|p| !p.in_range()) {
                return Err(TrailError::parse(format!(
                    "{}: coordinate ({}, {}) is out of range",
                    style.input.display(),
                    p.lat,
                    p.lon
                )));
            }
            let resolved = style.timing().resolve(track);
            let segments: Vec<TrackSegment> = resolved
                .into_iter()
                .map(|seg| {
                    TrackSegment::from_samples(
                        seg.into_iter().map(|(t, p)| (t, project(p.lat, p.lon))),
                    )
                })
                .collect();
            // Only samples that survive the duplicate-timestamp collapse are drawn.
            for (_, p) in segments.iter().flat_map(|s| s.points()) {
                bounds.include(p);
            }
            let timeline = TrackTimeline::from_recorded(segments);
            if timeline.is_empty() {
                tracing::warn!(input = %style.input.display(), "track has no timed samples");
            }
            timelines.push(timeline);
        }

        let (min_time, max_time) = timelines
            .iter()
            .filter_map(TrackTimeline::time_span)
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
            .ok_or_else(|| TrailError::configuration("tracks contain no timed samples"))?;

        let layout = FrameLayout::resolve(config, bounds, tiles.is_some())?;
        tracing::debug!(?layout, "layout resolved");

        let scheduler = FrameScheduler::new(
            min_time,
            max_time,
            i64::try_from(config.tail_duration_ms)
                .map_err(|_| TrailError::configuration("tail duration is out of range"))?,
            config.fps,
            config.pace()?,
        )?;
        tracing::debug!(
            frames = scheduler.frame_count(),
            speedup = scheduler.effective_speedup(),
            "schedule resolved"
        );

        let mut background = Raster::filled(layout.width, layout.height, Rgb8::WHITE);
        if let (Some(source), Some(zoom)) = (tiles, layout.zoom) {
            draw_map(
                &mut background,
                source,
                &layout.bounds,
                zoom,
                config.background_map_visibility,
            )?;
        }

        let text = if config.font_size > 0.0 {
            Some(TextRenderer::load(
                config.font_path.as_deref(),
                config.font_size,
            )?)
        } else {
            None
        };

        let transform = layout.transform;
        let layers = timelines
            .into_iter()
            .zip(config.resolved_styles())
            .map(|(mut timeline, style)| {
                timeline.map_points(|p| transform.apply(p));
                TrackLayer { timeline, style }
            })
            .collect();

        let renderer = TrailRenderer::new(
            layers,
            scheduler.tail_duration(),
            config.marker_size,
            f64::from(config.margin),
            config.time_format.clone(),
            text,
        );

        Ok(Self {
            layout,
            scheduler,
            renderer,
            background,
        })
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn renderer(&self) -> &TrailRenderer {
        &self.renderer
    }

    pub fn background(&self) -> &Raster {
        &self.background
    }

    /// Phase 2: render every frame in index order into `sink`. Returns the number of frames
    /// pushed.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn run(&mut self, sink: &mut dyn FrameSink) -> TrailResult<u64> {
        let total = self.scheduler.frame_count().saturating_sub(1);
        sink.begin(SinkConfig {
            width: self.layout.width,
            height: self.layout.height,
            fps: self.scheduler.fps(),
            frames: total,
        })?;

        let mut canvas = self.background.clone();
        let mut pushed = 0u64;
        for frame in self.scheduler.frames() {
            let time = self.scheduler.frame_time(frame);
            let prev_time = self.scheduler.frame_time(FrameIndex(frame.0 - 1));

            self.renderer.accumulate(&mut canvas, prev_time, time)?;
            let out = self.renderer.render_frame(&canvas, time)?;
            sink.push_frame(frame, &out)?;

            pushed += 1;
            tracing::info!(frame = frame.0, total, "frame rendered");
        }

        sink.end()?;
        tracing::info!(frames = pushed, "done");
        Ok(pushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TrackStyle, core::GeoPoint, sink::InMemorySink};

    fn config(n: usize) -> AnimationConfig {
        AnimationConfig {
            width: 200,
            margin: 10,
            font_size: 0.0,
            tracks: (0..n).map(|i| TrackStyle::new(format!("t{i}.gpx"))).collect(),
            ..AnimationConfig::default()
        }
    }

    #[test]
    fn fit_to_width_spans_the_requested_width() {
        let raw = vec![vec![vec![
            GeoPoint::timed(48.0, 17.0, 0),
            GeoPoint::timed(48.5, 17.5, 3_600_000),
        ]]];
        let engine = AnimationEngine::prepare_with(&config(1), raw, None).unwrap();
        let layout = engine.layout();
        assert!(layout.zoom.is_none());
        assert!((i64::from(layout.width) - 200).abs() <= 1);
        assert!(layout.height > 20);

        let west = layout.transform.apply(project(48.0, 17.0));
        assert!((west.x - 10.0).abs() < 1e-6);
    }

    #[test]
    fn explicit_zoom_sets_the_scale() {
        let raw = vec![vec![vec![
            GeoPoint::timed(48.0, 17.0, 0),
            GeoPoint::timed(48.1, 17.1, 1_000_000),
        ]]];
        let cfg = AnimationConfig {
            zoom: Some(10),
            ..config(1)
        };
        let engine = AnimationEngine::prepare_with(&cfg, raw, None).unwrap();
        assert_eq!(engine.layout().scale, zoom_scale(10));
    }

    #[test]
    fn auto_zoom_respects_width() {
        let mut b = PlaneBounds::empty();
        b.include(project(48.0, 17.0));
        b.include(project(48.5, 18.0));
        let cfg = AnimationConfig {
            width: 820,
            ..AnimationConfig::default()
        };
        let z = auto_zoom(&cfg, &b).unwrap();
        assert!(b.width() * zoom_scale(z) <= 780.0);
        assert!(b.width() * zoom_scale(z + 1) > 780.0);

        let narrow = AnimationConfig {
            height: Some(60),
            ..cfg
        };
        assert!(auto_zoom(&narrow, &b).unwrap() < z);
    }

    #[test]
    fn zero_extent_without_zoom_is_rejected() {
        let raw = vec![vec![vec![
            GeoPoint::timed(48.0, 17.0, 0),
            GeoPoint::timed(48.0, 17.0, 5_000_000),
        ]]];
        let err = AnimationEngine::prepare_with(&config(1), raw, None).unwrap_err();
        assert!(matches!(err, TrailError::Configuration(_)));
    }

    #[test]
    fn untimed_tracks_are_rejected() {
        let raw = vec![vec![vec![GeoPoint::new(48.0, 17.0, None)]]];
        let err = AnimationEngine::prepare_with(&config(1), raw, None).unwrap_err();
        assert!(err.to_string().contains("no timed samples"));
    }

    #[test]
    fn overwritten_samples_do_not_widen_the_bounds() {
        // The far sample at t = 0 is replaced by the later one with the same timestamp.
        let raw = vec![vec![vec![
            GeoPoint::timed(10.0, 10.0, 0),
            GeoPoint::timed(48.0, 17.0, 0),
            GeoPoint::timed(48.1, 17.1, 5_000),
        ]]];
        let engine = AnimationEngine::prepare_with(&config(1), raw, None).unwrap();
        let layout = engine.layout();
        assert!(!layout.track_bounds.contains(project(10.0, 10.0)));

        let mut expected = PlaneBounds::empty();
        expected.include(project(48.0, 17.0));
        expected.include(project(48.1, 17.1));
        assert_eq!(layout.track_bounds, expected);
    }

    #[test]
    fn out_of_range_samples_are_parse_errors() {
        let raw = vec![vec![vec![
            GeoPoint::timed(95.0, 10.0, 0),
            GeoPoint::timed(48.1, 17.1, 5_000),
        ]]];
        let err = AnimationEngine::prepare_with(&config(1), raw, None).unwrap_err();
        assert!(matches!(err, TrailError::Parse(_)));
        assert!(err.to_string().contains("t0.gpx"));
        assert!(err.to_string().contains("95"));
    }

    #[test]
    fn track_count_must_match_configuration() {
        let err = AnimationEngine::prepare_with(&config(2), vec![vec![]], None).unwrap_err();
        assert!(matches!(err, TrailError::Configuration(_)));
    }

    #[test]
    fn run_pushes_every_scheduled_frame() {
        let raw = vec![vec![vec![
            GeoPoint::timed(48.0, 17.0, 0),
            GeoPoint::timed(48.2, 17.4, 60_000),
            GeoPoint::timed(48.4, 17.8, 120_000),
        ]]];
        let cfg = AnimationConfig {
            fps: 1.0,
            speedup: Some(10.0),
            tail_duration_ms: 30_000,
            ..config(1)
        };
        let mut engine = AnimationEngine::prepare_with(&cfg, raw, None).unwrap();
        let mut sink = InMemorySink::new();
        let pushed = engine.run(&mut sink).unwrap();

        assert_eq!(pushed, engine.scheduler().frame_count() - 1);
        assert_eq!(sink.frames().len() as u64, pushed);
        assert_eq!(sink.config().map(|c| c.frames), Some(pushed));
        assert!(sink.is_ended());
        let (w, h) = (engine.layout().width, engine.layout().height);
        assert!(sink.frames().iter().all(|(_, f)| f.width == w && f.height == h));
    }
}
