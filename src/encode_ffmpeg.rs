use std::{
    io::Write as _,
    path::PathBuf,
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    core::FrameIndex,
    error::{TrailError, TrailResult},
    raster::Raster,
    sink::{FrameSink, SinkConfig, ensure_parent_dir},
};

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Arguments for encoding raw RGBA frames from stdin into an H.264 MP4.
///
/// Odd frame sizes are padded to even dimensions for yuv420p.
pub fn ffmpeg_args(cfg: &SinkConfig, out_path: &std::path::Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect();
    args.push("-s".to_owned());
    args.push(format!("{}x{}", cfg.width, cfg.height));
    args.push("-r".to_owned());
    args.push(cfg.fps.to_string());
    args.extend(
        ["-i", "pipe:0", "-an", "-c:v", "libx264", "-pix_fmt", "yuv420p"]
            .iter()
            .map(|s| (*s).to_owned()),
    );
    if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
        args.push("-vf".to_owned());
        args.push("pad=ceil(iw/2)*2:ceil(ih/2)*2".to_owned());
    }
    args.push("-movflags".to_owned());
    args.push("+faststart".to_owned());
    args.push(out_path.display().to_string());
    args
}

/// Pipes frames into a system `ffmpeg` process.
pub struct FfmpegSink {
    out_path: PathBuf,
    cfg: Option<SinkConfig>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            cfg: None,
            child: None,
            stdin: None,
        }
    }

    fn target(&self) -> String {
        self.out_path.display().to_string()
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> TrailResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(TrailError::configuration(
                "encode width/height must be non-zero",
            ));
        }
        if !cfg.fps.is_finite() || cfg.fps <= 0.0 {
            return Err(TrailError::configuration("encode fps must be > 0"));
        }
        ensure_parent_dir(&self.out_path)?;

        if !is_ffmpeg_on_path() {
            return Err(TrailError::frame_write(
                self.target(),
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(ffmpeg_args(&cfg, &self.out_path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TrailError::frame_write(self.target(), format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TrailError::frame_write(self.target(), "failed to open ffmpeg stdin"))?;

        tracing::debug!(out = %self.out_path.display(), "ffmpeg started");
        self.cfg = Some(cfg);
        self.child = Some(child);
        self.stdin = Some(stdin);
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Raster) -> TrailResult<()> {
        let target = self.target();
        let Some(cfg) = self.cfg.as_ref() else {
            return Err(TrailError::frame_write(target, "encoder was not started"));
        };
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(TrailError::frame_write(
                target,
                format!(
                    "frame {} is {}x{}, expected {}x{}",
                    idx.0, frame.width, frame.height, cfg.width, cfg.height
                ),
            ));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TrailError::frame_write(target, "encoder is already finalized"));
        };
        stdin
            .write_all(&frame.data)
            .map_err(|e| TrailError::frame_write(target, format!("frame {}: {e}", idx.0)))
    }

    fn end(&mut self) -> TrailResult<()> {
        drop(self.stdin.take());
        let Some(child) = self.child.take() else {
            return Ok(());
        };

        let output = child.wait_with_output().map_err(|e| {
            TrailError::frame_write(self.target(), format!("failed to wait for ffmpeg: {e}"))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrailError::frame_write(
                self.target(),
                format!("ffmpeg exited with status {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb8;

    fn cfg(width: u32, height: u32) -> SinkConfig {
        SinkConfig {
            width,
            height,
            fps: 25.0,
            frames: 2,
        }
    }

    #[test]
    fn args_describe_raw_rgba_input() {
        let args = ffmpeg_args(&cfg(640, 480), std::path::Path::new("out/video.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 640x480 -r 25 -i pipe:0"));
        assert!(joined.contains("-c:v libx264 -pix_fmt yuv420p"));
        assert!(!joined.contains("pad="));
        assert_eq!(args.last().map(String::as_str), Some("out/video.mp4"));
    }

    #[test]
    fn odd_sizes_are_padded() {
        let args = ffmpeg_args(&cfg(641, 480), std::path::Path::new("v.mp4"));
        assert!(args.iter().any(|a| a == "pad=ceil(iw/2)*2:ceil(ih/2)*2"));
    }

    #[test]
    fn push_before_begin_is_rejected() {
        let mut sink = FfmpegSink::new("never.mp4");
        let err = sink
            .push_frame(FrameIndex(1), &Raster::filled(2, 2, Rgb8::WHITE))
            .unwrap_err();
        assert!(matches!(err, TrailError::FrameWrite { .. }));
        sink.end().unwrap();
    }

    #[test]
    fn encodes_mp4_when_ffmpeg_is_available() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clip.mp4");
        let mut sink = FfmpegSink::new(&out);
        sink.begin(cfg(33, 17)).unwrap();
        for i in 1..=2 {
            sink.push_frame(FrameIndex(i), &Raster::filled(33, 17, Rgb8::new(200, 10, 10)))
                .unwrap();
        }
        sink.end().unwrap();
        assert!(std::fs::metadata(&out).unwrap().len() > 0);
    }
}
