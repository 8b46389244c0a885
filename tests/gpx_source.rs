use std::path::PathBuf;

use trailreel::{
    AnimationConfig, AnimationEngine, FrameIndex, FramePattern, GpxFileSource, PngSequenceSink,
    TrackSource, TrackStyle, TrailError, load_tracks,
};

const MORNING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>morning</name>
    <trkseg>
      <trkpt lat="48.1000" lon="17.1000"><ele>140</ele><time>2013-04-01T10:00:00Z</time></trkpt>
      <trkpt lat="48.1100" lon="17.1200"><time>2013-04-01T10:00:30Z</time></trkpt>
      <trkpt lat="48.1200" lon="17.1300"><time>2013-04-01T10:01:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

const EVENING: &str = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="test">
  <trk>
    <trkseg>
      <trkpt lat="48.1300" lon="17.0900"><time>2013-04-01T10:00:20Z</time></trkpt>
      <trkpt lat="48.1400" lon="17.1100"><time>2013-04-01T10:00:50Z</time></trkpt>
    </trkseg>
    <trkseg/>
  </trk>
</gpx>
"#;

fn write_inputs(dir: &std::path::Path) {
    std::fs::write(dir.join("morning.gpx"), MORNING).unwrap();
    std::fs::write(dir.join("evening.gpx"), EVENING).unwrap();
}

fn config() -> AnimationConfig {
    AnimationConfig {
        width: 240,
        fps: 1.0,
        speedup: Some(20.0),
        tail_duration_ms: 10_000,
        font_size: 0.0,
        tracks: vec![
            TrackStyle::new("morning.gpx"),
            TrackStyle::new("evening.gpx"),
        ],
        ..AnimationConfig::default()
    }
}

#[test]
fn relative_inputs_resolve_against_the_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let source = GpxFileSource::with_base_dir(dir.path());
    let tracks = load_tracks(&config(), &source).unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].len(), 1);
    assert_eq!(tracks[0][0].len(), 3);
    // The empty segment is kept as parsed; the timeline drops it later.
    assert_eq!(tracks[1].len(), 2);
    assert!(tracks[1][1].is_empty());
    assert_eq!(tracks[0][0][0].time, Some(1_364_810_400_000));
}

#[test]
fn missing_input_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = GpxFileSource::with_base_dir(dir.path());
    let err = source.load(&TrackStyle::new("absent.gpx")).unwrap_err();
    assert!(matches!(err, TrailError::Parse(_)));
    assert!(err.to_string().contains("absent.gpx"));
}

#[test]
fn gpx_files_render_to_a_png_sequence() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let cfg = config();

    let source = GpxFileSource::with_base_dir(dir.path());
    let mut engine = AnimationEngine::prepare(&cfg, &source).unwrap();
    // 60 s of samples plus a 10 s tail, 20x faster, one frame per second.
    assert_eq!(engine.scheduler().frame_count(), 3);

    let out = dir.path().join("frames");
    let mut sink = PngSequenceSink::new(&out, FramePattern::parse("f%04d.png").unwrap());
    let written = engine.run(&mut sink).unwrap();
    assert_eq!(written, 2);

    let expected: Vec<PathBuf> = (1..=2).map(|i| out.join(format!("f{i:04}.png"))).collect();
    assert_eq!(sink.written(), expected.as_slice());
    assert_eq!(sink.path_for(FrameIndex(2)), expected[1]);

    let img = image::open(&expected[0]).unwrap().to_rgb8();
    assert_eq!(img.width(), engine.layout().width);
    assert_eq!(img.height(), engine.layout().height);
}
