use anyhow::{anyhow, Context, Result};
use asciireel::replay::{self, CancellationToken, PlaybackSummary};
use asciireel::session::{self, SamplingPlan};
use asciireel::{
    terminal, AppConfig, CrosstermDisplay, FfmpegSource, FrameSource, PlaybackConfig,
    PlayerError, Preset, Progress, ProgressPhase, TerminalSize,
};
use clap::Parser;
use crossterm::style::Stylize;
use dialoguer::FuzzySelect;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use walkdir::WalkDir;

fn load_config() -> Result<AppConfig> {
    // Look for asciireel.json in app support, current dir fallback, then built-in default
    let mut tried: Vec<PathBuf> = Vec::new();
    if let Some(mut d) = dirs::data_dir() {
        d.push("asciireel");
        d.push("asciireel.json");
        tried.push(d);
    }
    tried.push(PathBuf::from("asciireel.json"));

    for p in &tried {
        if p.exists() {
            log::info!("using config {}", p.display());
            return AppConfig::from_file(p);
        }
    }

    Ok(AppConfig::default())
}

#[derive(Parser, Debug)]
#[command(version, about = "Play a video file as looping ASCII art in the terminal.")]
struct Args {
    /// Input video file
    input: Option<PathBuf>,

    /// Frames per second sampled from the video (also the playback rate unless --replay-fps is set)
    #[arg(long)]
    fps: Option<u32>,

    /// Frames per second shown during playback
    #[arg(long)]
    replay_fps: Option<u32>,

    /// Only convert the first N seconds of the video
    #[arg(long, value_name = "SECONDS")]
    max_duration: Option<f64>,

    /// Output width in characters (capped to the terminal)
    #[arg(long)]
    width: Option<u32>,

    /// Output height in rows (capped to the terminal)
    #[arg(long)]
    height: Option<u32>,

    /// Seconds to wait before playback starts
    #[arg(long, value_name = "SECONDS")]
    delay: Option<f64>,

    /// Use default preset
    #[arg(long, default_value_t = false, conflicts_with_all = &["small", "smooth"])]
    default: bool,

    /// Use a small, low frame rate preset
    #[arg(long, short, default_value_t = false, conflicts_with_all = &["default", "smooth"])]
    small: bool,

    /// Use a higher frame rate preset
    #[arg(long, default_value_t = false, conflicts_with_all = &["default", "small"])]
    smooth: bool,

    /// Log details to standard output
    #[arg(long, default_value_t = false)]
    log_details: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = Args::parse();
    let is_interactive = !(args.default || args.small || args.smooth);

    if args.input.is_none() {
        if !is_interactive {
            return Err(anyhow!("Input file must be provided when using a preset."));
        }
        let files = find_media_files();
        if files.is_empty() {
            return Err(anyhow!("No video files found in current directory."));
        }
        let selection = FuzzySelect::with_theme(&dialoguer::theme::ColorfulTheme::default())
            .with_prompt("Choose a video")
            .default(0)
            .items(&files)
            .interact()?;
        args.input = Some(PathBuf::from(&files[selection]));
    }
    let input_path = args
        .input
        .clone()
        .ok_or_else(|| anyhow!("Input file must be provided"))?;

    let cfg = load_config()?;
    let active_preset_name = if args.small {
        "small"
    } else if args.smooth {
        "smooth"
    } else {
        cfg.default_preset.as_str()
    };
    let active = cfg.preset(active_preset_name)?;

    let config = playback_config(&args, active, terminal::query_size())?;
    let delay_secs = args.delay.unwrap_or(cfg.countdown_secs);
    let delay = countdown(delay_secs)?;

    // --- Conversion ---
    let mut source = FfmpegSource::open(&input_path)?;
    let plan = SamplingPlan::new(&source.info(), &config);

    match plan.budget {
        Some(n) => println!("Converting video to ASCII frames... (Target: {} frames)", n),
        None => println!("Converting video to ASCII frames..."),
    }
    println!("ASCII dimensions: {}x{}", config.width, config.height);

    let progress_bar = conversion_progress_bar(plan.budget)?;

    let result = session::build_buffer(&mut source, &config, |progress: Progress| {
        match progress.phase {
            ProgressPhase::ConvertingFrames => {
                progress_bar.set_position(progress.completed as u64);
                progress_bar.set_message(progress.message);
            }
            ProgressPhase::Complete => progress_bar.finish_and_clear(),
        }
    });
    drop(source);

    let buffer = match result {
        Ok(buffer) => buffer,
        Err(PlayerError::EmptyResult) => {
            progress_bar.abandon();
            println!("No frames were processed. Please check your video file.");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            progress_bar.abandon();
            return Err(e).with_context(|| format!("converting {}", input_path.display()));
        }
    };

    println!("Conversion complete! Generated {} ASCII frames.", buffer.len());

    if args.log_details {
        println!("\n--- Playback Details ---");
        println!(
            "Version: {}\nInput: {}\nFrames: {}\nDimensions: {}x{}\nSampling interval: {}\nExtraction FPS: {}\nReplay FPS: {}",
            env!("CARGO_PKG_VERSION"),
            input_path.display(),
            buffer.len(),
            config.width,
            config.height,
            plan.interval,
            config.extraction_fps,
            config.replay_fps
        );
    }

    // --- Playback ---
    let cancel = CancellationToken::new();
    replay::install_interrupt_handler(&cancel).context("installing Ctrl+C handler")?;

    println!(
        "Starting playback in {} seconds... (Press Ctrl+C to exit)",
        delay_secs
    );
    let summary = if cancel.wait_timeout(delay) {
        PlaybackSummary {
            frames_displayed: 0,
        }
    } else {
        let mut display = CrosstermDisplay::stdout();
        replay::replay(&buffer, config.replay_fps, &mut display, &cancel)?
    };

    println!("\n{}", "[Exiting ASCII video player]".green().bold());
    println!("Played {} frames total.", summary.frames_displayed);

    Ok(ExitCode::SUCCESS)
}

/// Resolve the run settings from the preset, then apply command line
/// overrides. Explicit sizes are still capped to what the terminal can show.
fn playback_config(
    args: &Args,
    preset: &Preset,
    terminal_size: Option<TerminalSize>,
) -> Result<PlaybackConfig> {
    let (max_cols, max_rows) = terminal::resolve_dimensions(terminal_size);
    let mut config = PlaybackConfig::from_preset(preset, terminal_size);

    let width = args.width.map_or(config.width, |w| w.min(max_cols as u32));
    let height = args.height.map_or(config.height, |h| h.min(max_rows as u32));
    config = config.with_dimensions(width, height);

    if let Some(fps) = args.fps {
        config = config.with_extraction_fps(fps).with_replay_fps(fps);
    }
    if let Some(fps) = args.replay_fps {
        config = config.with_replay_fps(fps);
    }
    if let Some(secs) = args.max_duration {
        config = config.with_max_duration(secs);
    }
    config.validate()?;
    Ok(config)
}

fn countdown(secs: f64) -> Result<Duration> {
    if secs < 0.0 {
        return Err(anyhow!("--delay must be zero or positive, got {}", secs));
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("--delay {} is out of range", secs))
}

fn conversion_progress_bar(budget: Option<usize>) -> Result<ProgressBar> {
    let pb = match budget {
        Some(n) => {
            let pb = ProgressBar::new(n as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .context("building progress bar style")?
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} frames {msg}")
                    .context("building spinner style")?,
            );
            pb
        }
    };
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn find_media_files() -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(".")
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path().extension().is_some_and(|ext| {
                    matches!(
                        ext.to_str(),
                        Some("mp4" | "mkv" | "mov" | "avi" | "webm" | "gif")
                    )
                })
        })
        .map(|e| e.path().to_str().unwrap_or("").to_string())
        .collect();
    files.sort();
    files
}
