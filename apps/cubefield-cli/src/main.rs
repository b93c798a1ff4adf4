use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cubefield_common::{ColorRgb, LocalToWorld};
use cubefield_input::{Action, InputState};
use cubefield_kernel::{FrameContext, Game, SceneConfig};
use cubefield_render::{
    COLOR_SLOT, CameraUniforms, DrawIndirectCommand, InstancedRenderer, POSITION_SLOT,
    RecordingContext, TRANSFORM_SLOT, VertexAttribute, instance_attribute_lanes,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cubefield-cli", about = "Headless tools for the cubefield renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and scene summary
    Info {
        /// Scene description (YAML)
        #[arg(long)]
        scene: Option<PathBuf>,
    },
    /// Run frames against the recording backend and report every draw
    Simulate(SimulateArgs),
    /// Print the vertex attribute lanes of the instanced pipeline
    Layout,
}

#[derive(Args, Debug, Clone)]
struct SimulateArgs {
    /// Number of frames to run
    #[arg(short, long, default_value = "5")]
    frames: usize,
    /// Frame delta time in seconds
    #[arg(long, default_value = "0.016")]
    dt: f32,
    /// Spawn one cube every N frames (0 disables)
    #[arg(long, default_value = "0")]
    spawn_every: usize,
    /// Remove the last spawned cube every N frames (0 disables)
    #[arg(long, default_value = "0")]
    remove_every: usize,
    /// Rows per ECS chunk
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Scene description (YAML)
    #[arg(long)]
    scene: Option<PathBuf>,
}

/// One simulated frame as the device saw it.
#[derive(Debug, Clone, PartialEq)]
struct FrameReport {
    frame: usize,
    command: DrawIndirectCommand,
    resized: bool,
    chunks: usize,
    color_allocations: usize,
    transform_allocations: usize,
    in_bounds: bool,
}

fn load_scene(path: Option<&PathBuf>) -> anyhow::Result<SceneConfig> {
    match path {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("loading scene {}", path.display())),
        None => Ok(SceneConfig::default()),
    }
}

fn frame_input(args: &SimulateArgs, frame: usize) -> InputState {
    let mut input = InputState::new();
    let due = |every: usize| every > 0 && frame > 0 && frame % every == 0;
    if due(args.spawn_every) {
        input.press(Action::SpawnCube);
    }
    if due(args.remove_every) {
        input.press(Action::RemoveCube);
    }
    input
}

fn simulate(args: &SimulateArgs, scene: &SceneConfig) -> anyhow::Result<Vec<FrameReport>> {
    let ctx = Rc::new(RecordingContext::new());
    let mut renderer = InstancedRenderer::new(ctx.clone())?;
    let mut game = match args.chunk_size {
        Some(chunk_size) => {
            anyhow::ensure!(chunk_size > 0, "--chunk-size must be at least 1");
            Game::with_chunk_size(scene, chunk_size)
        }
        None => Game::new(scene),
    };

    let mut reports = Vec::with_capacity(args.frames);
    for frame in 0..args.frames {
        let input = frame_input(args, frame);
        game.update(&FrameContext::new(args.dt, &input));

        let camera = CameraUniforms::from(&game.camera_data()?);
        let stats = renderer.draw(&game.instances(), &camera);
        let draw = ctx
            .last_draw()
            .context("renderer did not issue a draw")?;
        ctx.clear_draws();

        reports.push(FrameReport {
            frame,
            command: draw.command,
            resized: stats.resized,
            chunks: stats.chunks_streamed,
            color_allocations: renderer.colors().buffer().allocations(),
            transform_allocations: renderer.transforms().buffer().allocations(),
            in_bounds: draw.is_in_bounds(),
        });
    }
    Ok(reports)
}

fn describe_lane(attribute: &VertexAttribute) -> String {
    let rate = if attribute.divisor == 0 {
        "per-vertex".to_string()
    } else {
        format!("per-instance (divisor {})", attribute.divisor)
    };
    format!(
        "location {}: {} x f32, stride {}, offset {}, {rate}",
        attribute.location, attribute.components, attribute.stride, attribute.offset
    )
}

fn pipeline_layout() -> Vec<(&'static str, Vec<VertexAttribute>)> {
    vec![
        (
            "position",
            vec![VertexAttribute {
                location: POSITION_SLOT,
                components: 3,
                stride: 12,
                offset: 0,
                divisor: 0,
            }],
        ),
        (
            "color",
            instance_attribute_lanes(
                COLOR_SLOT,
                (size_of::<ColorRgb>() / 4) as u32,
                size_of::<ColorRgb>() as u32,
            ),
        ),
        (
            "local_to_world",
            instance_attribute_lanes(
                TRANSFORM_SLOT,
                (size_of::<LocalToWorld>() / 4) as u32,
                size_of::<LocalToWorld>() as u32,
            ),
        ),
    ]
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info { scene } => {
            let scene = load_scene(scene.as_ref())?;
            println!("cubefield-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "scene: {} cubes ({} listed, grid: {})",
                scene.cube_count(),
                scene.cubes.len(),
                scene
                    .grid
                    .as_ref()
                    .map(|g| format!("{}x{}", g.columns, g.rows))
                    .unwrap_or_else(|| "none".to_string())
            );
            println!(
                "camera: position {}, fov {}, clip {}..{}",
                scene.camera.position.0,
                scene.camera.fov_degrees,
                scene.camera.near_clip,
                scene.camera.far_clip
            );
        }
        Commands::Simulate(args) => {
            let scene = load_scene(args.scene.as_ref())?;
            let reports = simulate(&args, &scene)?;
            for r in &reports {
                println!(
                    "frame {:>3}: indices={} instances={} resized={} chunks={} allocations(color={}, transform={}) {}",
                    r.frame,
                    r.command.index_count,
                    r.command.instance_count,
                    r.resized,
                    r.chunks,
                    r.color_allocations,
                    r.transform_allocations,
                    if r.in_bounds { "OK" } else { "OVERRUN" }
                );
            }
            let overruns = reports.iter().filter(|r| !r.in_bounds).count();
            if overruns > 0 {
                anyhow::bail!("{overruns} of {} frames read past an instance stream", reports.len());
            }
        }
        Commands::Layout => {
            for (stream, lanes) in pipeline_layout() {
                println!("{stream}:");
                for lane in &lanes {
                    println!("  {}", describe_lane(lane));
                }
            }
        }
    }

    Ok(())
}
