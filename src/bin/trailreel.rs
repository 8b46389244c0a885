use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trailreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Debug logging and full error chains.
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the animation as a numbered PNG sequence.
    Render(RenderArgs),
    /// Render the animation straight into an MP4 (requires `ffmpeg` on PATH).
    Mp4(Mp4Args),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Animation configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Frame file pattern, overriding the configured one (e.g. `out/frame%08d.png`).
    #[arg(long)]
    out: Option<String>,
}

#[derive(Parser, Debug)]
struct Mp4Args {
    /// Animation configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Mp4(args) => cmd_mp4(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.verbose {
                eprintln!("error: {e:?}");
            } else {
                eprintln!("error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_config(path: &Path) -> anyhow::Result<trailreel::AnimationConfig> {
    let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
    let cfg: trailreel::AnimationConfig = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse config JSON '{}'", path.display()))?;
    Ok(cfg)
}

fn config_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn prepare(path: &Path, cfg: &trailreel::AnimationConfig) -> anyhow::Result<trailreel::AnimationEngine> {
    let source = trailreel::GpxFileSource::with_base_dir(config_dir(path));
    let engine = trailreel::AnimationEngine::prepare(cfg, &source)?;
    Ok(engine)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = read_config(&args.config)?;
    if let Some(out) = args.out {
        cfg.frame_file_pattern = out;
    }

    let mut engine = prepare(&args.config, &cfg)?;
    let pattern = trailreel::FramePattern::parse(&cfg.frame_file_pattern)?;
    let mut sink = trailreel::PngSequenceSink::new(".", pattern);
    let frames = engine.run(&mut sink)?;

    eprintln!("wrote {frames} frames");
    eprintln!("To encode the generated frames you may run:");
    eprintln!(
        "ffmpeg -framerate {} -i {} -c:v libx264 -pix_fmt yuv420p video.mp4",
        cfg.fps, cfg.frame_file_pattern
    );
    Ok(())
}

fn cmd_mp4(args: Mp4Args) -> anyhow::Result<()> {
    let cfg = read_config(&args.config)?;
    let mut engine = prepare(&args.config, &cfg)?;
    let mut sink = trailreel::FfmpegSink::new(&args.out);
    engine.run(&mut sink)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
