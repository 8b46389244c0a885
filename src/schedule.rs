use crate::{
    core::{FrameIndex, TimeMs},
    error::{TrailError, TrailResult},
};

const MS_PER_SEC: f64 = 1000.0;
const MAX_FRAMES: f64 = i64::MAX as f64;

/// How simulated time maps onto video time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pace {
    /// Simulated milliseconds per real millisecond.
    Speedup(f64),
    /// Target video length; the speedup is derived from the recorded span.
    TotalTime { secs: f64 },
}

/// Maps frame indices onto simulation timestamps.
///
/// Frame 0 is the blank starting instant and is never emitted; frames run from 1 to
/// `frame_count - 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameScheduler {
    min_time: TimeMs,
    max_time: TimeMs,
    tail_duration: i64,
    fps: f64,
    speedup: f64,
    frame_count: u64,
}

impl FrameScheduler {
    pub fn new(
        min_time: TimeMs,
        max_time: TimeMs,
        tail_duration: i64,
        fps: f64,
        pace: Pace,
    ) -> TrailResult<Self> {
        if min_time > max_time {
            return Err(TrailError::configuration(
                "track time span is inverted (min time after max time)",
            ));
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(TrailError::configuration("fps must be finite and > 0"));
        }

        let speedup = match pace {
            Pace::Speedup(s) => s,
            Pace::TotalTime { secs } => {
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(TrailError::configuration(
                        "total time must be finite and > 0",
                    ));
                }
                (max_time - min_time) as f64 / (secs * MS_PER_SEC)
            }
        };
        if !speedup.is_finite() || speedup <= 0.0 {
            return Err(TrailError::configuration(format!(
                "effective speedup must be finite and > 0 (got {speedup})"
            )));
        }

        let simulated = (max_time as f64) + (tail_duration as f64) - (min_time as f64);
        let frames = simulated * fps / (MS_PER_SEC * speedup);
        if frames.is_nan() || frames < 1.0 {
            return Err(TrailError::configuration(format!(
                "animation is shorter than one frame ({frames:.3} frames)"
            )));
        }
        // Frame indices and their times must stay representable.
        if frames >= MAX_FRAMES {
            return Err(TrailError::configuration(format!(
                "animation needs {frames:.0} frames; lower the tail duration or raise the speedup"
            )));
        }

        Ok(Self {
            min_time,
            max_time,
            tail_duration,
            fps,
            speedup,
            frame_count: frames as u64,
        })
    }

    /// `floor(min + index / fps * 1000 * speedup)`.
    pub fn frame_time(&self, frame: FrameIndex) -> TimeMs {
        let offset = (frame.0 as f64) / self.fps * MS_PER_SEC * self.speedup;
        ((self.min_time as f64) + offset).floor() as TimeMs
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Emitted frames, in the strictly increasing order they must be rendered.
    pub fn frames(&self) -> impl Iterator<Item = FrameIndex> + use<> {
        (1..self.frame_count).map(FrameIndex)
    }

    pub fn effective_speedup(&self) -> f64 {
        self.speedup
    }

    pub fn min_time(&self) -> TimeMs {
        self.min_time
    }

    pub fn max_time(&self) -> TimeMs {
        self.max_time
    }

    pub fn tail_duration(&self) -> i64 {
        self.tail_duration
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_track_example_yields_two_frames() {
        // Tracks span [0, 1000] and [500, 1500]; the tail adds 500 ms.
        let s = FrameScheduler::new(0, 1500, 500, 1.0, Pace::Speedup(1.0)).unwrap();
        assert_eq!(s.frame_count(), 2);
        assert_eq!(s.frames().collect::<Vec<_>>(), vec![FrameIndex(1)]);
        assert_eq!(s.frame_time(FrameIndex(1)), 1000);
    }

    #[test]
    fn frame_times_follow_fps_and_speedup() {
        let s = FrameScheduler::new(1_000, 3_601_000, 0, 30.0, Pace::Speedup(1000.0)).unwrap();
        assert_eq!(s.frame_count(), 108);
        assert_eq!(s.frame_time(FrameIndex(0)), 1_000);
        assert_eq!(s.frame_time(FrameIndex(3)), 101_000);
    }

    #[test]
    fn frame_times_are_floored() {
        let s = FrameScheduler::new(0, 10_000, 0, 3.0, Pace::Speedup(1.0)).unwrap();
        assert_eq!(s.frame_time(FrameIndex(1)), 333);
        assert_eq!(s.frame_time(FrameIndex(2)), 666);
    }

    #[test]
    fn total_time_derives_speedup() {
        let s = FrameScheduler::new(0, 600_000, 0, 25.0, Pace::TotalTime { secs: 60.0 }).unwrap();
        assert!((s.effective_speedup() - 10.0).abs() < 1e-12);
        assert_eq!(s.frame_count(), 1500);
    }

    #[test]
    fn total_time_over_zero_span_is_rejected() {
        let err = FrameScheduler::new(5, 5, 1000, 25.0, Pace::TotalTime { secs: 10.0 }).unwrap_err();
        assert!(matches!(err, TrailError::Configuration(_)));
    }

    #[test]
    fn sub_frame_animation_is_rejected() {
        let err = FrameScheduler::new(0, 10, 0, 1.0, Pace::Speedup(1000.0)).unwrap_err();
        assert!(err.to_string().contains("shorter than one frame"));
    }

    #[test]
    fn unbounded_frame_counts_are_rejected() {
        let err = FrameScheduler::new(0, 1_000, i64::MAX, 30.0, Pace::Speedup(1.0)).unwrap_err();
        assert!(matches!(err, TrailError::Configuration(_)));
        assert!(err.to_string().contains("frames"));
    }

    #[test]
    fn emitted_indices_are_strictly_increasing_and_in_range() {
        let s = FrameScheduler::new(0, 100_000, 5_000, 10.0, Pace::Speedup(50.0)).unwrap();
        let frames: Vec<FrameIndex> = s.frames().collect();
        assert_eq!(frames.len() as u64, s.frame_count() - 1);
        assert!(frames.windows(2).all(|w| w[0] < w[1]));
        assert!(
            frames
                .iter()
                .all(|f| f.0 >= 1 && f.0 < s.frame_count())
        );
    }
}
