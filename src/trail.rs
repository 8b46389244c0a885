//! Per-frame drawing of trails, fading tails, markers and the timestamp.
//!
//! Every pass first collects the strokes it needs from the timelines and only then paints them.

use std::fmt::Write as _;

use crate::{
    color::Rgb8,
    config::ResolvedStyle,
    core::{Point, TimeMs},
    error::{TrailError, TrailResult},
    raster::{Painter, Raster},
    text::TextRenderer,
    timeline::TrackTimeline,
};

/// Label baseline offset from the marker center.
const LABEL_OFFSET: (f64, f64) = (8.0, 4.0);

/// Fill of a marker whose track has no sample after the current instant.
pub const ENDED_MARKER_FILL: Rgb8 = Rgb8::WHITE;
pub const MARKER_OUTLINE: Rgb8 = Rgb8::BLACK;

/// A track in pixel space together with how it is drawn.
#[derive(Clone, Debug)]
pub struct TrackLayer {
    pub timeline: TrackTimeline,
    pub style: ResolvedStyle,
}

/// Connected run of points drawn in one color.
#[derive(Clone, Debug, PartialEq)]
pub struct TrailStroke {
    pub points: Vec<Point>,
    pub color: Rgb8,
    pub width: f32,
}

/// One fading tail segment; `ratio` is in `(0, 1]` and grows toward the current instant.
#[derive(Clone, Debug, PartialEq)]
pub struct TailStroke {
    pub from: Point,
    pub to: Point,
    pub ratio: f32,
    pub color: Rgb8,
    pub width: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkerDraw {
    pub track: usize,
    pub center: Point,
    pub fill: Rgb8,
    pub label: Option<String>,
}

/// `(tail − now + sample) / tail`.
pub fn tail_ratio(tail_duration: i64, now: TimeMs, sample: TimeMs) -> f32 {
    if tail_duration <= 0 {
        return 0.0;
    }
    (tail_duration - now + sample) as f32 / tail_duration as f32
}

#[derive(Debug)]
pub struct TrailRenderer {
    tracks: Vec<TrackLayer>,
    tail_duration: i64,
    marker_radius: f64,
    margin: f64,
    time_format: String,
    text: Option<TextRenderer>,
}

impl TrailRenderer {
    pub fn new(
        tracks: Vec<TrackLayer>,
        tail_duration: i64,
        marker_size: f64,
        margin: f64,
        time_format: impl Into<String>,
        text: Option<TextRenderer>,
    ) -> Self {
        Self {
            tracks,
            tail_duration,
            marker_radius: marker_size / 2.0,
            margin,
            time_format: time_format.into(),
            text,
        }
    }

    pub fn tracks(&self) -> &[TrackLayer] {
        &self.tracks
    }

    /// Permanent trail drawn between two consecutive frame times, every segment of every track.
    ///
    /// A segment contributes the samples from its floor at `prev_time` (or, before its first
    /// sample, its ceiling) up to its floor at `time`.
    pub fn trail_strokes(&self, prev_time: TimeMs, time: TimeMs) -> Vec<TrailStroke> {
        let mut out = Vec::new();
        for layer in &self.tracks {
            for seg in layer.timeline.segments() {
                let Some((to, _)) = seg.floor_entry(time) else {
                    continue;
                };
                let Some((from, _)) = seg
                    .floor_entry(prev_time)
                    .or_else(|| seg.ceiling_entry(prev_time))
                else {
                    continue;
                };
                let points: Vec<Point> = seg.range(from, to).map(|(_, p)| p).collect();
                if points.len() < 2 {
                    continue;
                }
                out.push(TrailStroke {
                    points,
                    color: layer.style.color,
                    width: layer.style.line_width,
                });
            }
        }
        out
    }

    /// Fading tail segments at `time`.
    ///
    /// The window ends at each segment's floor sample and reaches `tail_duration` back from it;
    /// a segment is kept when the ratio at its later sample is positive.
    pub fn tail_strokes(&self, time: TimeMs) -> Vec<TailStroke> {
        let mut out = Vec::new();
        if self.tail_duration <= 0 {
            return out;
        }
        for layer in &self.tracks {
            for seg in layer.timeline.segments() {
                let Some((to, _)) = seg.floor_entry(time) else {
                    continue;
                };
                let mut prev: Option<Point> = None;
                for (t, p) in seg.range(to.saturating_sub(self.tail_duration), to) {
                    if let Some(from) = prev {
                        let ratio = tail_ratio(self.tail_duration, time, t);
                        if ratio > 0.0 {
                            out.push(TailStroke {
                                from,
                                to: p,
                                ratio,
                                color: layer.style.color.scale_brightness(1.0 - ratio),
                                width: layer.style.line_width,
                            });
                        }
                    }
                    prev = Some(p);
                }
            }
        }
        out
    }

    /// One marker per track that has a known position at `time`.
    pub fn markers(&self, time: TimeMs) -> Vec<MarkerDraw> {
        self.tracks
            .iter()
            .enumerate()
            .filter_map(|(i, layer)| {
                let m = layer.timeline.marker_at(time)?;
                Some(MarkerDraw {
                    track: i,
                    center: m.position,
                    fill: if m.active {
                        layer.style.color
                    } else {
                        ENDED_MARKER_FILL
                    },
                    label: layer.style.label.clone(),
                })
            })
            .collect()
    }

    /// Extend the persistent trail on `canvas` up to `time`.
    pub fn accumulate(&self, canvas: &mut Raster, prev_time: TimeMs, time: TimeMs) -> TrailResult<()> {
        let strokes = self.trail_strokes(prev_time, time);
        if strokes.is_empty() {
            return Ok(());
        }
        let mut painter = Painter::for_raster(canvas)?;
        for s in &strokes {
            painter.stroke_polyline(&s.points, s.color, f64::from(s.width));
        }
        painter.finish(canvas)
    }

    /// Copy of `canvas` with the tail, markers, labels and timestamp for `time` on top.
    pub fn render_frame(&mut self, canvas: &Raster, time: TimeMs) -> TrailResult<Raster> {
        let tails = self.tail_strokes(time);
        let markers = self.markers(time);
        let timestamp = match self.text {
            Some(_) => Some(self.format_time(time)?),
            None => None,
        };

        let mut frame = canvas.clone();
        let mut painter = Painter::for_raster(&frame)?;
        for t in &tails {
            painter.stroke_line(t.from, t.to, t.color, f64::from(t.width));
        }
        for m in &markers {
            painter.marker(m.center, self.marker_radius, m.fill, MARKER_OUTLINE);
            if let (Some(text), Some(label)) = (self.text.as_mut(), m.label.as_deref()) {
                text.draw(
                    &mut painter,
                    label,
                    m.center.x + LABEL_OFFSET.0,
                    m.center.y + LABEL_OFFSET.1,
                );
            }
        }
        if let (Some(text), Some(stamp)) = (self.text.as_mut(), timestamp) {
            let shaped = text.shape(&stamp);
            let x = f64::from(frame.width) - f64::from(shaped.width) - self.margin;
            let y = f64::from(frame.height) - self.margin;
            text.draw_shaped(&mut painter, &shaped, x, y);
        }
        painter.finish(&mut frame)?;
        Ok(frame)
    }

    /// `time` in UTC, formatted with the configured strftime pattern.
    pub fn format_time(&self, time: TimeMs) -> TrailResult<String> {
        let dt = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(time)
            .ok_or_else(|| TrailError::render(format!("timestamp {time} ms is out of range")))?;
        let mut out = String::new();
        write!(out, "{}", dt.format(&self.time_format)).map_err(|_| {
            TrailError::configuration(format!("invalid time format \"{}\"", self.time_format))
        })?;
        Ok(out)
    }
}
