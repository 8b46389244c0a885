//! GPX track files.
//!
//! Only `<trk>/<trkseg>/<trkpt>` are read; waypoints, routes and extensions are skipped.

use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::{
    config::TrackStyle,
    core::{GeoPoint, RawTrack},
    error::{TrailError, TrailResult},
};

/// Produces the raw segments of one configured track.
pub trait TrackSource {
    fn load(&self, style: &TrackStyle) -> TrailResult<RawTrack>;
}

/// Reads `style.input` from disk, optionally relative to a base directory.
#[derive(Clone, Debug, Default)]
pub struct GpxFileSource {
    base_dir: Option<PathBuf>,
}

impl GpxFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative inputs resolve against `base_dir` (usually the configuration file's directory).
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    pub fn resolve(&self, input: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if input.is_relative() => base.join(input),
            _ => input.to_path_buf(),
        }
    }
}

impl TrackSource for GpxFileSource {
    #[tracing::instrument(level = "debug", skip_all, fields(input = %style.input.display()))]
    fn load(&self, style: &TrackStyle) -> TrailResult<RawTrack> {
        let path = self.resolve(&style.input);
        let xml = std::fs::read_to_string(&path).map_err(|e| {
            TrailError::parse(format!("error reading input file '{}': {e}", path.display()))
        })?;
        let track = parse_gpx(&xml).map_err(|e| match e {
            TrailError::Parse(msg) => TrailError::parse(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        tracing::debug!(
            segments = track.len(),
            points = track.iter().map(Vec::len).sum::<usize>(),
            "gpx loaded"
        );
        Ok(track)
    }
}

fn xml_error(e: impl std::fmt::Display) -> TrailError {
    TrailError::parse(format!("error parsing GPX: {e}"))
}

/// Every `<trkseg>` of every `<trk>`, in document order.
pub fn parse_gpx(xml: &str) -> TrailResult<RawTrack> {
    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"trkseg" => {
                segments.push(parse_segment(&mut reader)?);
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"trkseg" => {
                segments.push(Vec::new());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(segments)
}

fn parse_segment(reader: &mut Reader<&[u8]>) -> TrailResult<Vec<GeoPoint>> {
    let mut points = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    points.push(parse_point(&e, reader)?);
                } else {
                    reader.read_to_end(e.name()).map_err(xml_error)?;
                }
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"trkpt" => {
                let (lat, lon) = parse_lat_lon(&e)?;
                points.push(GeoPoint::new(lat, lon, None));
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => return Err(TrailError::parse("unterminated <trkseg>")),
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(points)
}

fn parse_point(start: &BytesStart<'_>, reader: &mut Reader<&[u8]>) -> TrailResult<GeoPoint> {
    let (lat, lon) = parse_lat_lon(start)?;
    let mut time = None;
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"time" {
                    let text = read_text_owned(reader, &e)?;
                    time = Some(parse_time(&text)?);
                } else {
                    reader.read_to_end(e.name()).map_err(xml_error)?;
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(TrailError::parse("unterminated <trkpt>")),
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(GeoPoint::new(lat, lon, time))
}

fn parse_lat_lon(e: &BytesStart<'_>) -> TrailResult<(f64, f64)> {
    let mut lat = None;
    let mut lon = None;

    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        let (slot, limit) = match attr.key.local_name().as_ref() {
            b"lat" => (&mut lat, 90.0),
            b"lon" => (&mut lon, 180.0),
            _ => continue,
        };
        let parsed = val
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| (-limit..=limit).contains(v))
            .ok_or_else(|| TrailError::parse(format!("invalid trkpt coordinate \"{val}\"")))?;
        *slot = Some(parsed);
    }

    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => Err(TrailError::parse("trkpt is missing lat or lon")),
    }
}

/// RFC 3339 timestamp to epoch milliseconds.
fn parse_time(text: &str) -> TrailResult<i64> {
    chrono::DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| TrailError::parse(format!("invalid time \"{}\": {e}", text.trim())))
}

/// Text content of an element, including CDATA and entity references.
fn read_text_owned(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> TrailResult<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::CData(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    Ok(text)
}
