use std::path::{Path, PathBuf};

use crate::{
    core::FrameIndex,
    error::{TrailError, TrailResult},
    raster::Raster,
};

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Number of frames that will be pushed.
    pub frames: u64,
}

/// Consumer of rendered frames.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order, each
/// index once.
pub trait FrameSink: Send {
    fn begin(&mut self, cfg: SinkConfig) -> TrailResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &Raster) -> TrailResult<()>;
    fn end(&mut self) -> TrailResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, Raster)>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[(FrameIndex, Raster)] {
        &self.frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> TrailResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Raster) -> TrailResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> TrailResult<()> {
        self.ended = true;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Index { width: usize, zero_pad: bool },
}

/// printf-style file name template with exactly one integer placeholder.
///
/// Accepted placeholders are `%d`, `%Nd` and `%0Nd`; `%%` is a literal percent sign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePattern {
    source: String,
    pieces: Vec<Piece>,
}

impl FramePattern {
    pub fn parse(pattern: &str) -> TrailResult<Self> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut placeholders = 0usize;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }

            let zero_pad = chars.next_if_eq(&'0').is_some();
            let mut digits = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                digits.push(d);
            }
            if chars.next() != Some('d') {
                return Err(TrailError::configuration(format!(
                    "frame pattern \"{pattern}\": only %d, %Nd and %0Nd placeholders are supported"
                )));
            }
            let width = if digits.is_empty() {
                0
            } else {
                digits.parse().map_err(|_| {
                    TrailError::configuration(format!(
                        "frame pattern \"{pattern}\": placeholder width out of range"
                    ))
                })?
            };

            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Index { width, zero_pad });
            placeholders += 1;
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        if placeholders != 1 {
            return Err(TrailError::configuration(format!(
                "frame pattern \"{pattern}\" must contain exactly one integer placeholder \
                 (found {placeholders})"
            )));
        }

        let parsed = Self {
            source: pattern.to_owned(),
            pieces,
        };
        if parsed.format(FrameIndex(100)) == parsed.format(FrameIndex(200)) {
            return Err(TrailError::configuration(format!(
                "frame pattern \"{pattern}\" does not vary with the frame index"
            )));
        }
        Ok(parsed)
    }

    pub fn format(&self, idx: FrameIndex) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Index {
                    width,
                    zero_pad: true,
                } => out.push_str(&format!("{:0width$}", idx.0)),
                Piece::Index {
                    width,
                    zero_pad: false,
                } => out.push_str(&format!("{:width$}", idx.0)),
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Writes each frame as an RGB PNG named by a [`FramePattern`].
///
/// A failed write aborts the run; frames written before it stay on disk.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    pattern: FramePattern,
    written: Vec<PathBuf>,
}

impl PngSequenceSink {
    /// Frame names are resolved relative to `dir`.
    pub fn new(dir: impl Into<PathBuf>, pattern: FramePattern) -> Self {
        Self {
            dir: dir.into(),
            pattern,
            written: Vec::new(),
        }
    }

    pub fn path_for(&self, idx: FrameIndex) -> PathBuf {
        self.dir.join(self.pattern.format(idx))
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> TrailResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| TrailError::frame_write(parent.display(), e))?;
    }
    Ok(())
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, _cfg: SinkConfig) -> TrailResult<()> {
        self.written.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Raster) -> TrailResult<()> {
        let path = self.path_for(idx);
        ensure_parent_dir(&path)?;
        image::save_buffer_with_format(
            &path,
            &frame.to_rgb8(),
            frame.width,
            frame.height,
            image::ColorType::Rgb8,
            image::ImageFormat::Png,
        )
        .map_err(|e| TrailError::frame_write(path.display(), e))?;
        self.written.push(path);
        Ok(())
    }

    fn end(&mut self) -> TrailResult<()> {
        Ok(())
    }
}
