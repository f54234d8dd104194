use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use region_watch::platform::native_desktop;
use region_watch::vision::config::{DEFAULT_INTERVAL_MS, DEFAULT_THRESHOLD};
use region_watch::vision::DryRunInput;
use region_watch::{
    Calibrator, ConfigurationSet, Pacing, Result, RunnerOptions, Scheduler, WatchConfig,
    WatchError, Watcher,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch one or more configurations, rotating on every click
    Run {
        /// Configuration files (.toml or .json), in rotation order
        #[arg(required = true)]
        configs: Vec<PathBuf>,
        /// Log clicks instead of injecting them
        #[arg(long)]
        dry_run: bool,
        /// Space cycle starts evenly instead of waiting after each cycle
        #[arg(long)]
        fixed_rate: bool,
        /// Run the first cycle right away
        #[arg(long)]
        immediate: bool,
        /// Capture from a directory of screenshots instead of the screen
        #[arg(long, value_name = "DIR")]
        replay: Option<PathBuf>,
    },
    /// Record a configuration by pointing at the region and snapshotting it
    Calibrate {
        /// Where to save the configuration
        #[arg(short, long)]
        out: PathBuf,
        /// Number of reference states to record
        #[arg(long, default_value_t = 1)]
        states: usize,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
        #[arg(long, default_value_t = DEFAULT_INTERVAL_MS)]
        interval_ms: u64,
        /// Seconds to wait after each prompt
        #[arg(long, default_value_t = 5)]
        settle_secs: u64,
        #[arg(long)]
        name: Option<String>,
    },
    /// Validate configuration files
    Check {
        #[arg(required = true)]
        configs: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run {
            configs,
            dry_run,
            fixed_rate,
            immediate,
            replay,
        } => run(configs, dry_run, fixed_rate, immediate, replay),
        Command::Calibrate {
            out,
            states,
            threshold,
            interval_ms,
            settle_secs,
            name,
        } => calibrate(out, states, threshold, interval_ms, settle_secs, name),
        Command::Check { configs } => check(configs),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(
    configs: Vec<PathBuf>,
    dry_run: bool,
    fixed_rate: bool,
    immediate: bool,
    replay: Option<PathBuf>,
) -> Result<()> {
    let set = ConfigurationSet::load_all(&configs)?;

    let mut desktop = native_desktop();
    if dry_run {
        desktop = desktop.with_input(Arc::new(DryRunInput));
    }
    if let Some(dir) = replay {
        desktop = with_replay(desktop, dir)?;
    }

    let mut options = RunnerOptions::default();
    if fixed_rate {
        options = options.with_pacing(Pacing::FixedRate);
    }
    if immediate {
        options = options.immediately();
    }

    let mut watcher = Watcher::new();
    watcher.start(Scheduler::new(set, desktop), options)?;
    println!("Watching {} configuration(s). Press Enter to stop.", configs.len());

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        // No terminal attached: keep watching until the process is killed
        Ok(0) | Err(_) => watcher.wait(),
        Ok(_) => watcher.stop(),
    }

    println!("{}", watcher.status_json());
    Ok(())
}

#[cfg(feature = "replay")]
fn with_replay(desktop: region_watch::Desktop, dir: PathBuf) -> Result<region_watch::Desktop> {
    let replay = region_watch::vision::ReplayCapture::from_directory(&dir, true)?;
    Ok(desktop.with_capture(Arc::new(replay)))
}

#[cfg(not(feature = "replay"))]
fn with_replay(_desktop: region_watch::Desktop, _dir: PathBuf) -> Result<region_watch::Desktop> {
    Err(WatchError::unsupported(
        "replay capture requires the 'replay' feature. Build with: cargo build --features replay",
    ))
}

fn calibrate(
    out: PathBuf,
    states: usize,
    threshold: f64,
    interval_ms: u64,
    settle_secs: u64,
    name: Option<String>,
) -> Result<()> {
    let desktop = native_desktop();
    let mut calibrator = Calibrator::new(desktop.pointer, desktop.capture)
        .with_states(states)
        .with_threshold(threshold)
        .with_interval(interval_ms)
        .with_settle_delay(Duration::from_secs(settle_secs))
        .on_prompt(|msg| println!("{}", msg));
    if let Some(name) = name {
        calibrator = calibrator.with_name(name);
    }

    let config = calibrator.run()?;
    config.save(&out)?;
    println!("Saved configuration to {}", out.display());
    Ok(())
}

fn check(configs: Vec<PathBuf>) -> Result<()> {
    let mut failed = 0;
    for path in &configs {
        match WatchConfig::load(path) {
            Ok(config) => {
                let (w, h) = config.dimensions();
                println!(
                    "ok      {}: '{}' {}x{} at {}, {} state(s), threshold {}, every {} ms",
                    path.display(),
                    config.label(),
                    w,
                    h,
                    config.top_left,
                    config.states.len(),
                    config.similarity_threshold,
                    config.interval_ms
                );
            }
            Err(e) => {
                failed += 1;
                println!("invalid {}: {}", path.display(), e);
            }
        }
    }

    if failed > 0 {
        return Err(WatchError::config(format!(
            "{} of {} configuration(s) rejected",
            failed,
            configs.len()
        )));
    }
    Ok(())
}
