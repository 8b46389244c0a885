#![forbid(unsafe_code)]

pub mod color;
pub mod config;
pub mod core;
pub mod encode_ffmpeg;
pub mod engine;
pub mod error;
pub mod gpx;
pub mod projection;
pub mod raster;
pub mod schedule;
pub mod sink;
pub mod text;
pub mod tiles;
pub mod timeline;
pub mod trail;

pub use color::{Hsb, Rgb8, hue_palette, normalize_colors, normalize_line_widths};
pub use config::{AnimationConfig, ResolvedStyle, TrackStyle};
pub use core::{FrameIndex, GeoPoint, Point, RawTrack, TimeMs};
pub use encode_ffmpeg::{FfmpegSink, is_ffmpeg_on_path};
pub use engine::{AnimationEngine, FrameLayout, load_tracks};
pub use error::{TrailError, TrailResult};
pub use gpx::{GpxFileSource, TrackSource, parse_gpx};
pub use projection::{PixelTransform, PlaneBounds, TILE_SIZE, project};
pub use raster::{Painter, Raster};
pub use schedule::{FrameScheduler, Pace};
pub use sink::{FramePattern, FrameSink, InMemorySink, PngSequenceSink, SinkConfig};
pub use text::TextRenderer;
pub use tiles::{TemplateTileSource, TileGrid, TileKey, TileSource, draw_map};
pub use timeline::{MarkerState, SampleTiming, TrackSegment, TrackTimeline};
pub use trail::{TrackLayer, TrailRenderer};
