//! ripplefield - headless wave field runner.
//!
//! Drives the frame orchestrator at a fixed cadence with scripted object
//! motion and logs a report every few frames.
//!
//! ## Usage
//!
//! ```bash
//! # 600 frames on the rayon backend with two orbiting objects
//! ripplefield run --backend parallel --frames 600 --objects 2
//!
//! # Drive the point forcing at a fixed cell from a config file
//! ripplefield run --config water.toml --pulse 32,32
//!
//! # Validate a configuration file
//! ripplefield check water.toml
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

use ripplefield::prelude::*;

/// Real-time 2D wave field driven by moving occluders
#[derive(Parser)]
#[command(name = "ripplefield")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation headless
    Run {
        /// Configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of frames to simulate
        #[arg(short, long, default_value_t = 600)]
        frames: u64,

        /// Solver backend
        #[arg(short, long, value_enum, default_value_t = BackendChoice::Parallel)]
        backend: BackendChoice,

        /// Pointer cell driving the forcing, as X,Y
        #[arg(short, long, value_parser = parse_cell)]
        pulse: Option<[i64; 2]>,

        /// Number of scripted objects orbiting the window centre
        #[arg(short, long, default_value_t = 0)]
        objects: usize,

        /// Log a frame report every N frames
        #[arg(long, default_value_t = 60)]
        report_every: u64,

        /// Frame delta in seconds
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f32,
    },

    /// Validate a configuration file and print its summary
    Check {
        /// Configuration file
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    /// Sequential CPU loop
    Cpu,
    /// Row-parallel CPU loop (rayon)
    Parallel,
    /// wgpu compute kernels
    Wgpu,
}

fn parse_cell(value: &str) -> std::result::Result<[i64; 2], String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{value}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid cell coordinate '{s}': {e}"))
    };
    Ok([parse(x)?, parse(y)?])
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("ripplefield={level}").parse().expect("valid directive"))
        .add_directive(format!("ripplefield_core={level}").parse().expect("valid directive"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn create_backend(
    choice: BackendChoice,
    config: &RippleConfig,
) -> anyhow::Result<Box<dyn SolverBackend>> {
    let resolution = config.resolution()?;
    match choice {
        BackendChoice::Cpu => Ok(Box::new(CpuBackend::new(resolution, Execution::Sequential))),
        BackendChoice::Parallel => Ok(Box::new(CpuBackend::new(resolution, Execution::Parallel))),
        #[cfg(feature = "wgpu")]
        BackendChoice::Wgpu => {
            let backend = WgpuBackend::new(resolution).await?;
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "wgpu"))]
        BackendChoice::Wgpu => bail!("ripplefield was built without the `wgpu` feature"),
    }
}

/// Circular path for scripted object `index` at time `t`.
fn orbit(index: usize, t: f32, centre: [f32; 2], window: f32) -> Vec3 {
    let radius = window * (0.15 + 0.05 * index as f32);
    let phase = index as f32 * std::f32::consts::FRAC_PI_2;
    let angle = t * (0.6 + 0.2 * index as f32) + phase;
    Vec3::new(
        centre[0] + radius * angle.cos(),
        0.0,
        centre[1] + radius * angle.sin(),
    )
}

#[allow(clippy::too_many_arguments)]
async fn run(
    config_path: Option<PathBuf>,
    frames: u64,
    backend: BackendChoice,
    pulse: Option<[i64; 2]>,
    objects: usize,
    report_every: u64,
    dt: f32,
) -> anyhow::Result<()> {
    let config = match &config_path {
        Some(path) => RippleConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RippleConfig::default(),
    };
    if report_every == 0 {
        bail!("--report-every must be at least 1");
    }

    let solver = create_backend(backend, &config).await?;
    let mut orchestrator = FrameOrchestrator::with_backend(&config, solver)?;

    let centre = config.trail.origin;
    let window = config.window_size()?;
    let ids: Vec<ObjectId> = (0..objects)
        .map(|k| {
            orchestrator
                .tracker_mut()
                .registry_mut()
                .register(orbit(k, 0.0, centre, window))
        })
        .collect();

    tracing::info!(
        frames,
        objects,
        resolution = %orchestrator.resolution(),
        "starting run"
    );

    let started = std::time::Instant::now();
    let mut wall_time = 0.0_f32;
    let mut last = None;
    for _ in 0..frames {
        wall_time += dt;
        for (k, id) in ids.iter().enumerate() {
            orchestrator
                .tracker_mut()
                .registry_mut()
                .set_position(*id, orbit(k, wall_time, centre, window));
        }

        let mut input = FrameInput::new(dt);
        input.pointer = pulse;
        let report = orchestrator.tick(&input)?;

        if report.frame % report_every == 0 {
            tracing::info!(
                frame = report.frame,
                sim_time = report.sim_time,
                max_amplitude = report.max_amplitude,
                energy = report.energy,
                objects = report.object_count,
                "frame report"
            );
        }
        last = Some(report);
    }

    let elapsed = started.elapsed();
    if let Some(report) = last {
        let fps = report.frame as f64 / elapsed.as_secs_f64().max(1e-9);
        println!(
            "{} frames in {:.2?} ({:.1} frames/s), final max |h| = {:.5}, energy = {:.5}",
            report.frame, elapsed, fps, report.max_amplitude, report.energy
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            frames,
            backend,
            pulse,
            objects,
            report_every,
            dt,
        } => run(config, frames, backend, pulse, objects, report_every, dt).await,

        Commands::Check { config } => {
            let config = RippleConfig::from_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            config.print_summary();
            Ok(())
        }
    }
}
