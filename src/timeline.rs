//! Time-indexed track storage.
//!
//! A [`TrackTimeline`] holds a track's segments in *priority order*: the most recently recorded
//! segment comes first. When several disjoint trips of one track know a position at the same
//! instant, the first segment in that order owns the marker.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::core::{GeoPoint, Point, TimeMs};

/// One recorded segment: timestamp to point. Duplicate timestamps keep the last sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackSegment {
    points: BTreeMap<TimeMs, Point>,
}

impl TrackSegment {
    pub fn from_samples(samples: impl IntoIterator<Item = (TimeMs, Point)>) -> Self {
        Self {
            points: samples.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Greatest sample with time `<= t`.
    pub fn floor_entry(&self, t: TimeMs) -> Option<(TimeMs, Point)> {
        self.points
            .range(..=t)
            .next_back()
            .map(|(&k, &p)| (k, p))
    }

    /// Least sample with time `>= t`.
    pub fn ceiling_entry(&self, t: TimeMs) -> Option<(TimeMs, Point)> {
        self.points.range(t..).next().map(|(&k, &p)| (k, p))
    }

    /// Least sample with time `> t`.
    pub fn higher_entry(&self, t: TimeMs) -> Option<(TimeMs, Point)> {
        self.points
            .range((Bound::Excluded(t), Bound::Unbounded))
            .next()
            .map(|(&k, &p)| (k, p))
    }

    /// Samples with `lo <= time <= hi` in time order. Empty when `lo > hi`.
    pub fn range(&self, lo: TimeMs, hi: TimeMs) -> impl Iterator<Item = (TimeMs, Point)> + '_ {
        let span = (lo <= hi).then(|| self.points.range(lo..=hi));
        span.into_iter().flatten().map(|(&k, &p)| (k, p))
    }

    pub fn first_time(&self) -> Option<TimeMs> {
        self.points.keys().next().copied()
    }

    pub fn last_time(&self) -> Option<TimeMs> {
        self.points.keys().next_back().copied()
    }

    pub fn points(&self) -> impl Iterator<Item = (TimeMs, Point)> + '_ {
        self.points.iter().map(|(&k, &p)| (k, p))
    }

    fn map_points(&mut self, f: impl Fn(Point) -> Point) {
        for p in self.points.values_mut() {
            *p = f(*p);
        }
    }
}

/// Marker position of a track at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerState {
    /// Index of the owning segment in priority order.
    pub segment: usize,
    /// Time of the floor sample.
    pub time: TimeMs,
    pub position: Point,
    /// `true` while the instant lies inside the segment's recorded span, `false` once the
    /// segment has ended.
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackTimeline {
    segments: Vec<TrackSegment>,
}

impl TrackTimeline {
    /// Build from segments in recording order; empty segments are dropped.
    pub fn from_recorded(recorded: Vec<TrackSegment>) -> Self {
        let mut segments: Vec<TrackSegment> =
            recorded.into_iter().filter(|s| !s.is_empty()).collect();
        segments.reverse();
        Self { segments }
    }

    /// Segments in priority order (most recent first).
    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.segments.iter().map(TrackSegment::len).sum()
    }

    /// Earliest and latest sample time over all segments.
    pub fn time_span(&self) -> Option<(TimeMs, TimeMs)> {
        let min = self.segments.iter().filter_map(|s| s.first_time()).min()?;
        let max = self.segments.iter().filter_map(|s| s.last_time()).max()?;
        Some((min, max))
    }

    /// First segment in priority order with a known position at `t` wins.
    pub fn marker_at(&self, t: TimeMs) -> Option<MarkerState> {
        self.segments.iter().enumerate().find_map(|(i, seg)| {
            let (time, position) = seg.floor_entry(t)?;
            Some(MarkerState {
                segment: i,
                time,
                position,
                active: seg.higher_entry(t).is_some(),
            })
        })
    }

    pub fn map_points(&mut self, f: impl Fn(Point) -> Point + Copy) {
        for seg in &mut self.segments {
            seg.map_points(f);
        }
    }
}

/// Resolves raw sample times for one track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleTiming {
    /// Added to every resolved time.
    pub offset_ms: i64,
    /// When set, the k-th sample of the track (counted across segments) is placed at
    /// `base + k * interval`, `base` being the track's first recorded time or 0.
    pub forced_interval_ms: Option<u64>,
}

impl SampleTiming {
    /// Returns `(time, sample)` pairs per segment; samples left without a time are dropped.
    pub fn resolve(&self, raw: &[Vec<GeoPoint>]) -> Vec<Vec<(TimeMs, GeoPoint)>> {
        let forced = self.forced_interval_ms.map(|interval| {
            let base = raw
                .iter()
                .flatten()
                .find_map(|p| p.time)
                .unwrap_or_default();
            (base, i64::try_from(interval).unwrap_or(i64::MAX))
        });

        let mut k: i64 = 0;
        raw.iter()
            .map(|segment| {
                segment
                    .iter()
                    .filter_map(|p| {
                        let time = match forced {
                            Some((base, interval)) => {
                                let t = base.saturating_add(k.saturating_mul(interval));
                                k += 1;
                                Some(t)
                            }
                            None => p.time,
                        }?;
                        Some((time.saturating_add(self.offset_ms), *p))
                    })
                    .collect()
            })
            .collect()
    }
}
