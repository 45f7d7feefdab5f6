use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

use avatar_compositor::{
    CalibrationStore, ControlButton, InputController, InputEvent, InputOutcome, IntervalScheduler,
    JsonFileBackend, LoadOutcome, PngSequenceSink, RenderLoop, RenderOutcome, SceneConfig,
    SourceDef,
};

#[derive(Parser, Debug)]
#[command(name = "avatar-compositor", version)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default kiosk scene (legs below, keyed head on top).
    Init(InitArgs),
    /// Composite a single frame to PNG.
    Frame(FrameArgs),
    /// Run the render loop at a fixed rate and write a PNG sequence.
    Render(RenderArgs),
    /// Apply calibration button presses to one layer and save the result.
    Nudge(NudgeArgs),
}

#[derive(Parser, Debug)]
struct InitArgs {
    /// Output scene JSON path.
    #[arg(long)]
    out: PathBuf,

    /// Replace an existing file.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct SceneArgs {
    /// Scene JSON. The default scene is used when omitted.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Calibration JSON, read on start and written by `nudge`.
    #[arg(long, default_value = "public/avatar-config.json")]
    calibration: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Layer source as `name=path`; a directory is read as a frame sequence.
    #[arg(long = "source", value_parser = parse_source)]
    sources: Vec<(String, PathBuf)>,

    /// Container width; the height follows the scene's aspect.
    #[arg(long)]
    width: Option<u32>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Layer source as `name=path`; a directory is read as a frame sequence.
    #[arg(long = "source", value_parser = parse_source)]
    sources: Vec<(String, PathBuf)>,

    /// Container width; the height follows the scene's aspect.
    #[arg(long)]
    width: Option<u32>,

    /// Output directory for numbered PNGs.
    #[arg(long)]
    out_dir: PathBuf,

    /// Frames to write.
    #[arg(long, default_value_t = 50)]
    frames: u64,

    /// Refresh rate.
    #[arg(long, default_value_t = 25.0)]
    fps: f64,

    /// Give up after this many ticks without a frame.
    #[arg(long, default_value_t = 250)]
    max_waiting: u64,
}

#[derive(Parser, Debug)]
struct NudgeArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Layer to calibrate.
    #[arg(long)]
    layer: String,

    /// Buttons to press in order: up, down, left, right, zoom-in, zoom-out, reset.
    ///
    /// The result is saved once after the last press.
    #[arg(required = true)]
    buttons: Vec<ControlButton>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Init(args) => cmd_init(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
        Command::Nudge(args) => cmd_nudge(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_source(s: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=path, got '{s}'"))?;
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected name=path, got '{s}'"));
    }
    Ok((name.to_owned(), PathBuf::from(path)))
}

fn load_scene(args: &SceneArgs) -> anyhow::Result<(SceneConfig, PathBuf)> {
    let Some(path) = &args.scene else {
        return Ok((SceneConfig::default_scene(), PathBuf::from(".")));
    };
    let scene = SceneConfig::from_path(path)?;
    scene.validate()?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    Ok((scene, base))
}

fn load_calibration(scene: &SceneConfig, path: &Path) -> CalibrationStore {
    let store = scene.calibration_store();
    let outcome = store.load(&JsonFileBackend::new(path));
    tracing::debug!(?outcome, path = %path.display(), "calibration");
    store
}

/// Command-line sources are relative to the working directory, not the scene file.
fn overrides(sources: &[(String, PathBuf)]) -> anyhow::Result<BTreeMap<String, SourceDef>> {
    sources
        .iter()
        .map(|(name, path)| {
            let abs = std::path::absolute(path)
                .with_context(|| format!("resolve source path '{}'", path.display()))?;
            Ok((name.clone(), SourceDef::infer(abs)))
        })
        .collect()
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    if args.out.exists() && !args.force {
        anyhow::bail!(
            "'{}' already exists (pass --force to replace it)",
            args.out.display()
        );
    }
    SceneConfig::default_scene().write_path(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (scene, base) = load_scene(&args.scene)?;
    let mut compositor = scene.build_compositor()?;
    let sources = scene.build_sources(&base, &overrides(&args.sources)?)?;
    let store = load_calibration(&scene, &args.scene.calibration);
    let canvas = scene.canvas.canvas_for(args.width)?;

    match compositor.render(canvas, &sources, &store.snapshot()) {
        RenderOutcome::Drawn(report) => {
            tracing::debug!(?report, "composited");
        }
        RenderOutcome::Skipped { waiting_on } => {
            anyhow::bail!("no frame for required layers: {}", waiting_on.join(", "));
        }
    }

    let img = compositor
        .frame()
        .to_rgba_image()
        .context("composited frame has an unexpected size")?;
    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    img.save(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (scene, base) = load_scene(&args.scene)?;
    let compositor = scene.build_compositor()?;
    let sources = scene.build_sources(&base, &overrides(&args.sources)?)?;
    let store = Arc::new(load_calibration(&scene, &args.scene.calibration));
    let scheduler = IntervalScheduler::new(args.fps)?;

    let mut lp = RenderLoop::new(compositor, sources, store, scheduler, scene.canvas)?;
    lp.set_nominal_fps(Some(args.fps));
    lp.set_sink(Box::new(PngSequenceSink::new(&args.out_dir)));
    if let Some(w) = args.width {
        lp.resize(w);
    }

    let (frames, max_waiting) = (args.frames, args.max_waiting);
    lp.run_until(|stats| {
        stats.frames_drawn >= frames || (stats.frames_drawn == 0 && stats.ticks >= max_waiting)
    });
    let stats = lp.stats();
    lp.unmount();

    if stats.frames_drawn == 0 {
        anyhow::bail!("required sources never became ready after {} ticks", stats.ticks);
    }
    eprintln!(
        "wrote {} frames to {} ({} skipped, {} errors)",
        stats.frames_drawn,
        args.out_dir.display(),
        stats.frames_skipped,
        stats.errors
    );
    Ok(())
}

fn cmd_nudge(args: NudgeArgs) -> anyhow::Result<()> {
    let (scene, _) = load_scene(&args.scene)?;
    let backend = Arc::new(JsonFileBackend::new(&args.scene.calibration));
    let store = scene.calibration_store();
    if let LoadOutcome::Defaulted {
        reason: Some(reason),
    } = store.load(&*backend)
    {
        anyhow::bail!("refusing to overwrite unreadable calibration: {reason}");
    }
    let store = Arc::new(store);

    let mut ctl = InputController::new(Arc::clone(&store), &args.layer)?.with_backend(backend);
    // The result is saved once at the end.
    for button in args.buttons.into_iter().filter(|b| *b != ControlButton::Save) {
        if let InputOutcome::Updated { transform, .. } = ctl.handle(InputEvent::Button(button)) {
            tracing::debug!(?button, ?transform, "applied");
        }
    }
    match ctl.handle(InputEvent::Button(ControlButton::Save)) {
        InputOutcome::Saved => {}
        InputOutcome::SaveFailed { message } => anyhow::bail!(message),
        other => anyhow::bail!("unexpected save outcome: {other:?}"),
    }

    let t = store
        .get(&args.layer)
        .context("layer vanished from calibration")?;
    eprintln!(
        "{}: offset=({}, {}) scale={} -> {}",
        args.layer,
        t.offset.x,
        t.offset.y,
        t.scale,
        args.scene.calibration.display()
    );
    Ok(())
}
