// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;

use schwarzschild_render::io::{self, RenderMetadata};
use schwarzschild_render::params::RenderParams;
use schwarzschild_render::scheduler::{RenderController, RenderProgress, RenderStatus};
use schwarzschild_render::spacetime::critical_impact_parameter;
use schwarzschild_render::tile::DebugPixel;

#[derive(Parser)]
#[command(
    name = "schwarzschild-render",
    about = "Offline renderer for a Schwarzschild black hole with a thin accretion disk"
)]
struct Cli {
    /// JSON file with base render parameters (camelCase keys)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Black hole mass M
    #[arg(long)]
    mass: Option<f64>,

    /// Camera distance from the origin
    #[arg(long)]
    distance: Option<f64>,

    /// Camera polar angle in radians
    #[arg(long)]
    theta: Option<f64>,

    /// Camera azimuth in radians
    #[arg(long)]
    phi: Option<f64>,

    /// Field of view in degrees
    #[arg(long)]
    fov: Option<f64>,

    /// Inner disk radius
    #[arg(long)]
    disk_inner: Option<f64>,

    /// Outer disk radius
    #[arg(long)]
    disk_outer: Option<f64>,

    /// Disk flux scale
    #[arg(long)]
    brightness: Option<f64>,

    /// Frame edge length in pixels
    #[arg(short = 'r', long)]
    resolution: Option<u32>,

    /// Tile edge length in pixels
    #[arg(long)]
    tile_size: Option<u32>,

    /// Integration step budget per ray
    #[arg(long)]
    max_steps: Option<u32>,

    /// RK4 step size
    #[arg(long)]
    step_size: Option<f64>,

    /// Tone mapping exposure
    #[arg(long)]
    exposure: Option<f64>,

    /// Escape radius (default 4x camera distance)
    #[arg(long)]
    escape_radius: Option<f64>,

    /// Record the heatmap overlay
    #[arg(long)]
    heatmap: bool,

    /// Disable scientific overlays
    #[arg(long)]
    no_overlays: bool,

    /// Pass strides, comma-separated and decreasing to 1 (e.g., 8,4,2,1)
    #[arg(long, conflicts_with = "single_pass")]
    passes: Option<String>,

    /// Render only the full-resolution pass
    #[arg(long)]
    single_pass: bool,

    /// Number of Rayon worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Record the ray path of one pixel, as x,y
    #[arg(long)]
    debug_pixel: Option<String>,

    /// Directory for the image and metadata files
    #[arg(short = 'o', long, default_value = "renders")]
    output_dir: PathBuf,

    /// File name prefix
    #[arg(long, default_value = "schwarzschild")]
    label: String,

    /// Also write the scientific overlay as <label>_<stamp>_overlay.png
    #[arg(long)]
    overlay: bool,

    /// Print render progress to stderr (see --progress-interval)
    #[arg(long)]
    progress: bool,

    /// Progress reporting interval in milliseconds (used with --progress)
    #[arg(long, default_value = "500")]
    progress_interval: u64,
}

fn parse_list<T: std::str::FromStr>(s: &str, what: &str) -> Result<Vec<T>> {
    s.split(',')
        .map(|p| p.trim().parse::<T>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| anyhow::anyhow!("invalid --{}: expected comma-separated integers", what))
}

fn parse_debug_pixel(s: &str) -> Result<DebugPixel> {
    let parts: Vec<u32> = parse_list(s, "debug-pixel")?;
    if parts.len() != 2 {
        bail!("--debug-pixel expects x,y, got '{}'", s);
    }
    Ok(DebugPixel {
        x: parts[0],
        y: parts[1],
    })
}

fn build_params(cli: &Cli) -> Result<RenderParams> {
    let mut params = match &cli.config {
        Some(path) => io::load_params(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => RenderParams::default(),
    };

    macro_rules! override_field {
        ($($flag:ident => $field:ident),* $(,)?) => {
            $(if let Some(v) = cli.$flag {
                params.$field = v;
            })*
        };
    }
    override_field!(
        mass => mass,
        distance => camera_distance,
        theta => camera_theta,
        phi => camera_phi,
        fov => field_of_view,
        disk_inner => disk_inner_radius,
        disk_outer => disk_outer_radius,
        brightness => disk_brightness,
        resolution => resolution,
        tile_size => tile_size,
        max_steps => max_steps,
        step_size => step_size,
        exposure => exposure,
    );
    if cli.escape_radius.is_some() {
        params.escape_radius = cli.escape_radius;
    }
    if cli.heatmap {
        params.show_heatmap = true;
    }
    if cli.no_overlays {
        params.scientific_mode = false;
    }

    params.validate()?;
    Ok(params)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let params = build_params(&cli)?;
    let mut controller = RenderController::new(params.clone())?;

    if let Some(threads) = cli.threads {
        if threads == 0 {
            bail!("--threads must be at least 1");
        }
        controller = controller.with_threads(threads);
    }
    if cli.single_pass {
        controller = controller.with_passes(vec![1])?;
    } else if let Some(passes) = &cli.passes {
        controller = controller.with_passes(parse_list(passes, "passes")?)?;
    }
    if let Some(pixel) = &cli.debug_pixel {
        let pixel = parse_debug_pixel(pixel)?;
        if pixel.x >= params.resolution || pixel.y >= params.resolution {
            bail!(
                "--debug-pixel {},{} is outside the {}x{} frame",
                pixel.x,
                pixel.y,
                params.resolution,
                params.resolution
            );
        }
        controller = controller.with_debug_pixel(pixel);
    }

    let progress_cb: Option<Box<dyn Fn(RenderProgress) + Sync>> = if cli.progress {
        let interval_ms = cli.progress_interval;
        let last_print = AtomicU64::new(0);
        let start = Instant::now();
        Some(Box::new(move |p: RenderProgress| {
            let now_ms = start.elapsed().as_millis() as u64;
            let prev = last_print.load(Ordering::Relaxed);
            if p.status != RenderStatus::Running || now_ms >= prev + interval_ms {
                last_print.store(now_ms, Ordering::Relaxed);
                eprintln!(
                    "[{:.1}s] {:?} pass={} stride={} progress={:.1}% tiles={}/{} rays={} eta={:.1}s shadow={}",
                    p.elapsed.as_secs_f64(),
                    p.status,
                    p.pass,
                    p.stride,
                    100.0 * p.progress,
                    p.tiles_processed,
                    p.total_tiles,
                    p.rays,
                    p.eta.as_secs_f64(),
                    p.shadow_radius
                        .map_or_else(|| "-".to_string(), |r| format!("{:.3}", r)),
                );
            }
        }))
    } else {
        None
    };

    let output = controller.render(progress_cb.as_deref())?;

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("cannot create {}", cli.output_dir.display()))?;
    let stamp = Utc::now();
    let basename = io::output_basename(&cli.label, &stamp);

    let image_path = cli.output_dir.join(format!("{}.png", basename));
    io::save_frame_png(&output.frame, &image_path)?;
    println!("Saved render -> {}", image_path.display());

    if cli.overlay {
        let overlay_path = cli.output_dir.join(format!("{}_overlay.png", basename));
        io::save_overlay_png(&output.frame, &overlay_path)?;
        println!("Overlay -> {}", overlay_path.display());
    }

    let metadata = RenderMetadata::from_render(&params, &output.stats, stamp);
    let meta_path = cli.output_dir.join(format!("{}.json", basename));
    metadata.save(&meta_path)?;
    println!("Metadata -> {}", meta_path.display());

    if let Some(path) = &output.debug_path {
        println!(
            "Debug pixel {},{}: {} after {} steps, {} path points",
            path.pixel.x,
            path.pixel.y,
            path.hit.label(),
            path.steps,
            path.points.len()
        );
    }
    if let Some(measured) = output.stats.shadow_radius() {
        println!(
            "Measured shadow radius: {:.3} (theoretical {:.3})",
            measured,
            critical_impact_parameter(params.mass)
        );
    }

    Ok(())
}
