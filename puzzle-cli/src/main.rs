//! # Puzzle CLI
//!
//! Headless host for the puzzle filter. Feeds a still picture (PNG or a
//! generated test pattern) through the filter as a stream of frames,
//! replays scripted mouse events, then prints the board state as JSON.
//!
//! ## Usage
//! ```bash
//! # 3x3 jigsaw over a test pattern, dump the desk after 10 frames
//! puzzle --options rows=3:cols=3 --frames 10 --out desk.png
//!
//! # Exchange two slots of a picture and keep the game
//! puzzle --input photo.png --options mode=exchange --click 10,10 --click 200,10 --save game.json
//!
//! # With debug logging
//! RUST_LOG=puzzle=debug puzzle --options rows=5
//! ```

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use puzzle_core::{BoardStatus, ChromaFormat, MouseState, Picture, PuzzleConfig, PuzzleFilter, SaveGame};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Presentation time step between two frames.
const FRAME_STEP: Duration = Duration::from_millis(40);

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptEvent {
    /// Press and release at a point
    Click { x: i32, y: i32 },
    /// Hover, press, move by the offset, release
    Drag { x: i32, y: i32, dx: i32, dy: i32 },
    Shuffle,
}

#[derive(Debug, Clone, PartialEq)]
struct AppOptions {
    options: String,
    input: Option<PathBuf>,
    width: u32,
    height: u32,
    chroma: ChromaFormat,
    frames: u64,
    seed: Option<u64>,
    script: Vec<ScriptEvent>,
    out: Option<PathBuf>,
    save: Option<PathBuf>,
    load: Option<PathBuf>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            options: String::new(),
            input: None,
            width: 320,
            height: 240,
            chroma: ChromaFormat::I420,
            frames: 1,
            seed: None,
            script: Vec::new(),
            out: None,
            save: None,
            load: None,
        }
    }
}

impl AppOptions {
    fn from_args(args: &[String]) -> Result<Self> {
        let mut options = Self::default();

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            if flag == "--shuffle" {
                options.script.push(ScriptEvent::Shuffle);
                i += 1;
                continue;
            }
            let value = args
                .get(i + 1)
                .ok_or_else(|| anyhow::anyhow!("Missing value for {}", flag))?;
            match flag {
                "--options" | "-o" => options.options = value.clone(),
                "--input" | "-i" => options.input = Some(PathBuf::from(value)),
                "--width" => options.width = parse_number(flag, value)?,
                "--height" => options.height = parse_number(flag, value)?,
                "--chroma" => options.chroma = ChromaFormat::parse(value)?,
                "--frames" | "-n" => options.frames = parse_number(flag, value)?,
                "--seed" => options.seed = Some(parse_number(flag, value)?),
                "--click" => {
                    let (x, y) = parse_point(value)?;
                    options.script.push(ScriptEvent::Click { x, y });
                }
                "--drag" => {
                    let (from, by) = value
                        .split_once(':')
                        .ok_or_else(|| anyhow::anyhow!("Drag must look like X,Y:DX,DY, got {:?}", value))?;
                    let (x, y) = parse_point(from)?;
                    let (dx, dy) = parse_point(by)?;
                    options.script.push(ScriptEvent::Drag { x, y, dx, dy });
                }
                "--out" => options.out = Some(PathBuf::from(value)),
                "--save" => options.save = Some(PathBuf::from(value)),
                "--load" => options.load = Some(PathBuf::from(value)),
                other => return Err(anyhow::anyhow!("Unknown argument: {}", other)),
            }
            i += 2;
        }

        if options.width == 0 || options.height == 0 {
            return Err(anyhow::anyhow!("Picture size must not be zero"));
        }
        Ok(options)
    }
}

fn parse_number<T>(flag: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value {:?} for {}: {}", value, flag, e))
}

fn parse_point(value: &str) -> Result<(i32, i32)> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("Point must look like X,Y, got {:?}", value))?;
    Ok((parse_number("x", x.trim())?, parse_number("y", y.trim())?))
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Serialize)]
struct Report {
    config: PuzzleConfig,
    frames: u64,
    events: usize,
    status: Option<BoardStatus>,
}

struct Session {
    filter: PuzzleFilter,
    source: Picture,
    last: Picture,
    pts: Duration,
    frames: u64,
}

impl Session {
    fn step(&mut self) -> Result<()> {
        self.last = self
            .filter
            .filter_at(&self.source, self.pts)
            .with_context(|| format!("Frame {} failed", self.frames))?;
        self.pts += FRAME_STEP;
        self.frames += 1;
        Ok(())
    }

    fn mouse(&mut self, x: i32, y: i32, left: bool) {
        let outcome = self.filter.mouse(&MouseState::new(x, y, left));
        tracing::debug!("Mouse ({}, {}) left={} -> {:?}", x, y, left, outcome);
    }

    fn play(&mut self, event: ScriptEvent) -> Result<()> {
        match event {
            ScriptEvent::Click { x, y } => {
                self.mouse(x, y, true);
                self.mouse(x, y, false);
            }
            ScriptEvent::Drag { x, y, dx, dy } => {
                self.mouse(x, y, false);
                self.step()?;
                self.mouse(x, y, true);
                self.mouse(x + dx, y + dy, true);
                self.mouse(x + dx, y + dy, false);
            }
            ScriptEvent::Shuffle => self.filter.handle().request_shuffle(),
        }
        self.step()
    }
}

fn load_source(options: &AppOptions) -> Result<Picture> {
    let rgb = match &options.input {
        Some(path) => image::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .to_rgb8(),
        None => test_pattern(options.width, options.height),
    };
    Ok(Picture::from_rgb(&rgb, options.chroma)?)
}

/// Colour bars over a diagonal ramp, so misplaced pieces are easy to spot.
fn test_pattern(width: u32, height: u32) -> RgbImage {
    const BARS: [[u8; 3]; 6] = [
        [235, 235, 16],
        [16, 235, 235],
        [16, 235, 16],
        [235, 16, 235],
        [235, 16, 16],
        [16, 16, 235],
    ];
    RgbImage::from_fn(width, height, |x, y| {
        let bar = BARS[(x as usize * BARS.len()) / width.max(1) as usize % BARS.len()];
        let ramp = ((x + y) * 255 / (width + height).max(1)) as u16;
        Rgb(bar.map(|c| ((c as u16 + ramp) / 2) as u8))
    })
}

fn run(options: &AppOptions) -> Result<Report> {
    let config = PuzzleConfig::from_chain(&options.options).context("Invalid filter options")?;
    let source = load_source(options)?;
    let filter = match options.seed {
        Some(seed) => PuzzleFilter::with_seed(config.clone(), seed)?,
        None => PuzzleFilter::new(config.clone())?,
    };

    tracing::info!(
        "Puzzle session: {}x{} {}, options {:?}, {} scripted events",
        source.width(),
        source.height(),
        source.chroma,
        options.options,
        options.script.len()
    );

    let mut session = Session {
        last: source.clone(),
        filter,
        source,
        pts: Duration::ZERO,
        frames: 0,
    };
    session.step()?;

    if let Some(path) = &options.load {
        let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let save = SaveGame::from_json(&json).with_context(|| format!("Invalid save game {}", path.display()))?;
        if !session.filter.load(&save)? {
            tracing::warn!("Save game {} does not match this board", path.display());
        }
    }

    for event in &options.script {
        session.play(*event)?;
    }
    while session.frames < options.frames.max(1) + 1 {
        session.step()?;
    }

    if let Some(path) = &options.out {
        session
            .last
            .to_rgb()
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Desk written to {}", path.display());
    }

    if let Some(path) = &options.save {
        let json = session.filter.save()?.to_json()?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Game saved to {}", path.display());
    }

    Ok(Report {
        config: session.filter.config().clone(),
        frames: session.frames,
        events: options.script.len(),
        status: session.filter.board().map(|b| b.status()),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("puzzle=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = AppOptions::from_args(&args)?;
    let report = run(&options)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
