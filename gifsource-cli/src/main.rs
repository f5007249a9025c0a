//! GifSource CLI Tool
//!
//! Command-line host for inspecting animated GIFs and playing them through
//! the GifSource scheduler.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gifsource_core::{GifContainer, LoopCount, PlaybackConfig, Renderer, Timeline};
use gifsource_decoder::{GifCodec, GifImageSource, TimelineBuilder};
use image::RgbaImage;
use std::path::PathBuf;
use std::thread;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "gifsource")]
#[command(about = "GifSource - animated GIF timeline inspection and playback")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the frame timeline of a GIF
    Info {
        /// Input GIF file path
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a GIF through the animation scheduler
    Play {
        /// Input GIF file path
        input: PathBuf,

        /// Directory to write each presented canvas to as PNG
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Accumulate frames on every tick instead of prerendering them
        #[arg(long)]
        progressive: bool,

        /// Sleep between ticks as a UI timer would
        #[arg(long)]
        realtime: bool,

        /// Number of loops to play (defaults to the file's loop count, or 1 if it loops forever)
        #[arg(long)]
        loops: Option<u32>,

        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Milliseconds per hundredth of a second of frame delay
        #[arg(long, default_value = "8")]
        interval: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { input, json } => show_info(input, json)?,

        Commands::Play {
            input,
            output,
            progressive,
            realtime,
            loops,
            max_ticks,
            interval,
        } => {
            let config = PlaybackConfig {
                prerender: !progressive,
                interval_ms_per_centisecond: interval,
            };
            play(input, output, config, realtime, loops, max_ticks)?
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Renderer writing each presented canvas to a numbered PNG
struct PngSequenceRenderer {
    output: Option<PathBuf>,
    presented: usize,
}

impl Renderer for PngSequenceRenderer {
    fn present(&mut self, width: u32, height: u32, pixels: &[u8]) -> gifsource_core::Result<()> {
        if let Some(dir) = &self.output {
            let canvas = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
                gifsource_core::Error::Presentation("canvas size does not match pixels".into())
            })?;
            let path = dir.join(format!("frame_{:06}.png", self.presented));
            canvas
                .save(&path)
                .map_err(|e| gifsource_core::Error::Presentation(e.to_string()))?;
        }
        self.presented += 1;
        Ok(())
    }
}

fn show_info(input: PathBuf, json: bool) -> Result<()> {
    let bytes = std::fs::read(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let mut codec = GifCodec::new(bytes).context("Failed to open GIF")?;
    let timeline = TimelineBuilder::new()
        .build(&mut codec)
        .context("Failed to build timeline")?;

    if json {
        let summary = timeline.summary();
        println!("{}", summary.to_json().context("Failed to serialize summary")?);
    } else {
        print_info(&timeline, codec.container());
    }
    Ok(())
}

fn play(
    input: PathBuf,
    output: Option<PathBuf>,
    config: PlaybackConfig,
    realtime: bool,
    loops: Option<u32>,
    max_ticks: Option<u64>,
) -> Result<()> {
    println!("Playing: {}", input.display());

    if let Some(dir) = &output {
        std::fs::create_dir_all(dir).context("Failed to create output directory")?;
    }

    let bytes = std::fs::read(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let renderer = PngSequenceRenderer {
        output,
        presented: 0,
    };
    let mut source = GifImageSource::with_config(0, 0, renderer, config)?;
    source.load_source(bytes)?;
    source.wait_for_load().context("Failed to load GIF")?;

    let loop_limit = match loops {
        Some(n) => n.max(1),
        None => match source.timeline().map(Timeline::loop_count_kind) {
            Some(LoopCount::Finite(n)) => (n as u32).max(1),
            _ => 1,
        },
    };
    println!(
        "Canvas {}x{}, playing {} loop(s){}",
        source.width(),
        source.height(),
        loop_limit,
        if config.prerender { " (prerendered)" } else { "" }
    );

    source.start();
    let mut ticks = 0u64;
    while let Some(outcome) = source.tick() {
        ticks += 1;
        if outcome.loop_completed {
            info!(loops = source.state().loops_completed, "loop completed");
            if source.state().loops_completed >= loop_limit {
                source.stop();
            }
        }
        if max_ticks.is_some_and(|max| ticks >= max) {
            source.stop();
        }
        if realtime && source.is_running() {
            thread::sleep(outcome.next_delay);
        }
    }

    println!(
        "Played {} ticks, presented {} frames",
        ticks,
        source.renderer().presented
    );
    Ok(())
}

fn print_info(timeline: &Timeline, container: &GifContainer) {
    let screen = &container.screen;
    println!("\n=== GIF Timeline ===");
    println!(
        "Canvas: {}x{} (logical screen {}x{})",
        timeline.canvas_width(),
        timeline.canvas_height(),
        screen.width,
        screen.height
    );
    if screen.has_global_color_table {
        println!("Global color table: yes (background index {})", screen.background_index);
    } else {
        println!("Global color table: no");
    }
    println!("Frames: {}", timeline.frame_count());
    println!("Animated: {}", timeline.is_animated());
    match timeline.loop_count_kind() {
        LoopCount::Infinite => println!("Loop count: infinite"),
        LoopCount::Finite(n) => println!("Loop count: {}", n),
    }
    println!(
        "Duration: {} ms ({:.2} seconds)",
        timeline.total_duration_ms(),
        timeline.total_duration_ms() as f64 / 1000.0
    );

    println!("\n=== Frames (first 10) ===");
    for (i, (frame, descriptor)) in timeline
        .frames()
        .iter()
        .zip(&container.frames)
        .take(10)
        .enumerate()
    {
        println!(
            "  [{}] {}x{} at ({}, {}) delay {} cs{}",
            i,
            frame.width,
            frame.height,
            frame.left,
            frame.top,
            frame.delay,
            if descriptor.interlaced { ", interlaced" } else { "" }
        );
    }
    if timeline.frame_count() > 10 {
        println!("  ... and {} more frames", timeline.frame_count() - 10);
    }
}
