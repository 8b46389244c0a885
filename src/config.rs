use std::path::PathBuf;

use crate::{
    color::{Rgb8, normalize_colors, normalize_line_widths},
    error::{TrailError, TrailResult},
    projection::MAX_ZOOM,
    schedule::Pace,
    sink::FramePattern,
    timeline::SampleTiming,
};

pub const DEFAULT_SPEEDUP: f64 = 1000.0;
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything a render needs besides the track files themselves.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Pixels kept free around the tracks' extent.
    pub margin: u32,
    pub width: u32,
    pub height: Option<u32>,
    pub zoom: Option<u8>,
    pub speedup: Option<f64>,
    pub total_time_secs: Option<f64>,
    pub tail_duration_ms: u64,
    pub fps: f64,
    /// Percentage of the map tiles' contrast kept, 0 to 100.
    pub background_map_visibility: f32,
    pub tile_url_template: Option<String>,
    pub skip_idle: bool,
    pub flashback_color: Rgb8,
    pub flashback_duration_ms: u64,
    pub frame_file_pattern: String,
    pub font_size: f32,
    pub font_path: Option<PathBuf>,
    pub time_format: String,
    pub marker_size: f64,
    pub waypoint_size: f64,
    pub tracks: Vec<TrackStyle>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            margin: 20,
            width: 800,
            height: None,
            zoom: None,
            speedup: None,
            total_time_secs: None,
            tail_duration_ms: 3_600_000,
            fps: 30.0,
            background_map_visibility: 50.0,
            tile_url_template: None,
            skip_idle: true,
            flashback_color: Rgb8::WHITE,
            flashback_duration_ms: 250,
            frame_file_pattern: "frame%08d.png".to_owned(),
            font_size: 12.0,
            font_path: None,
            time_format: DEFAULT_TIME_FORMAT.to_owned(),
            marker_size: 8.0,
            waypoint_size: 6.0,
            tracks: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackStyle {
    pub input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
    pub time_offset_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_point_interval_ms: Option<u64>,
}

impl TrackStyle {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn timing(&self) -> SampleTiming {
        SampleTiming {
            offset_ms: self.time_offset_ms,
            forced_interval_ms: self.forced_point_interval_ms,
        }
    }
}

/// Color and width a track is drawn with once unset entries are filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedStyle {
    pub color: Rgb8,
    pub line_width: f32,
    pub label: Option<String>,
}

impl AnimationConfig {
    pub fn from_json(json: &str) -> TrailResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| TrailError::configuration(format!("invalid configuration json: {e}")))
    }

    pub fn validate(&self) -> TrailResult<()> {
        if self.tracks.is_empty() {
            return Err(TrailError::configuration("at least one track is required"));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(TrailError::configuration("fps must be finite and > 0"));
        }
        self.pace()?;

        if !(0.0..=100.0).contains(&self.background_map_visibility) {
            return Err(TrailError::configuration(
                "background map visibility must be within 0..=100",
            ));
        }
        if self.width <= 2 * self.margin {
            return Err(TrailError::configuration(format!(
                "width {} leaves no room inside a margin of {}",
                self.width, self.margin
            )));
        }
        if let Some(height) = self.height
            && height <= 2 * self.margin
        {
            return Err(TrailError::configuration(format!(
                "height {height} leaves no room inside a margin of {}",
                self.margin
            )));
        }
        if let Some(zoom) = self.zoom
            && zoom > MAX_ZOOM
        {
            return Err(TrailError::configuration(format!(
                "zoom {zoom} exceeds the maximum of {MAX_ZOOM}"
            )));
        }
        if i64::try_from(self.tail_duration_ms).is_err() {
            return Err(TrailError::configuration(format!(
                "tail duration {} ms exceeds the maximum of {} ms",
                self.tail_duration_ms,
                i64::MAX
            )));
        }
        if !self.marker_size.is_finite() || self.marker_size <= 0.0 {
            return Err(TrailError::configuration("marker size must be > 0"));
        }
        if !self.font_size.is_finite() || self.font_size < 0.0 {
            return Err(TrailError::configuration("font size must be >= 0"));
        }
        for (i, track) in self.tracks.iter().enumerate() {
            if let Some(w) = track.line_width
                && (!w.is_finite() || w <= 0.0)
            {
                return Err(TrailError::configuration(format!(
                    "track {i}: line width must be > 0"
                )));
            }
        }

        validate_time_format(&self.time_format)?;
        FramePattern::parse(&self.frame_file_pattern)?;
        Ok(())
    }

    /// Speedup and total time are mutually exclusive; with neither set the default speedup
    /// applies.
    pub fn pace(&self) -> TrailResult<Pace> {
        match (self.speedup, self.total_time_secs) {
            (Some(_), Some(_)) => Err(TrailError::configuration(
                "speedup and total time are mutually exclusive",
            )),
            (Some(s), None) => {
                if !s.is_finite() || s <= 0.0 {
                    return Err(TrailError::configuration("speedup must be finite and > 0"));
                }
                Ok(Pace::Speedup(s))
            }
            (None, Some(secs)) => {
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(TrailError::configuration(
                        "total time must be finite and > 0",
                    ));
                }
                Ok(Pace::TotalTime { secs })
            }
            (None, None) => Ok(Pace::Speedup(DEFAULT_SPEEDUP)),
        }
    }

    /// One entry per track, in track order.
    ///
    /// A track's own color wins; tracks without one take the normalized palette built from the
    /// explicitly configured colors. Line widths resolve the same way.
    pub fn resolved_styles(&self) -> Vec<ResolvedStyle> {
        let n = self.tracks.len();
        let colors: Vec<Rgb8> = self.tracks.iter().filter_map(|t| t.color).collect();
        let widths: Vec<f32> = self.tracks.iter().filter_map(|t| t.line_width).collect();
        let palette = normalize_colors(&colors, n);
        let default_widths = normalize_line_widths(&widths, n);

        self.tracks
            .iter()
            .enumerate()
            .map(|(i, t)| ResolvedStyle {
                color: t.color.unwrap_or(palette[i]),
                line_width: t.line_width.unwrap_or(default_widths[i]),
                label: t.label.clone(),
            })
            .collect()
    }
}

fn validate_time_format(format: &str) -> TrailResult<()> {
    use chrono::format::{Item, StrftimeItems};

    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(TrailError::configuration(format!(
            "invalid time format \"{format}\""
        )));
    }
    Ok(())
}
