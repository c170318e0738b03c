//! Posture Rules CLI
//!
//! Classifies pre-estimated keypoint frames in batch or live mode.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, RecvTimeoutError};
use posture_rules::{
    config::Config,
    core::{declared_codes, AnalysisSession, BatchReport, UnreadableRecord},
    pose::{load_frames, recorded::parse_frame_line},
    stats::create_shared_stats,
    VERSION,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "posture-rules")]
#[command(version = VERSION)]
#[command(about = "Rule-based posture classification over pose keypoints", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a recorded sequence of sampled keypoint frames
    Analyze {
        /// Frames as a JSON array (.json) or JSON Lines (.jsonl)
        #[arg(long, short)]
        input: PathBuf,

        /// Activity rule set to apply
        #[arg(long)]
        activity: Option<String>,

        /// Frame rate of the source video
        #[arg(long)]
        fps: Option<f64>,

        /// Decoded frames between consecutive sampled frames
        #[arg(long)]
        stride: Option<u32>,

        /// Classification threads
        #[arg(long)]
        workers: Option<usize>,

        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also save the report into the configured export directory
        #[arg(long)]
        export: bool,
    },

    /// Classify JSON Lines frames from stdin as they arrive
    Live {
        /// Activity rule set to apply
        #[arg(long)]
        activity: Option<String>,
    },

    /// List activities, their rules and thresholds
    Activities,

    /// Show configuration
    Config {
        /// Write the default configuration if none exists
        #[arg(long)]
        init: bool,
    },

    /// Serve the analysis endpoints over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            input,
            activity,
            fps,
            stride,
            workers,
            output,
            export,
        } => load_config(cli.config.as_deref()).and_then(|mut config| {
            if let Some(fps) = fps {
                config.fps = fps;
            }
            if let Some(stride) = stride {
                config.stride = stride;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            cmd_analyze(&config, &input, activity.as_deref(), output, export)
        }),
        Commands::Live { activity } => {
            load_config(cli.config.as_deref()).and_then(|c| cmd_live(&c, activity.as_deref()))
        }
        Commands::Activities => {
            load_config(cli.config.as_deref()).and_then(|c| cmd_activities(&c))
        }
        Commands::Config { init } => cmd_config(cli.config.as_deref(), init),
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            load_config(cli.config.as_deref()).and_then(|c| cmd_serve(&c, port))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(p) => Config::load_from(p).with_context(|| format!("loading config {p:?}"))?,
        None => Config::load().context("loading config")?,
    };
    Ok(config)
}

fn build_session(config: &Config, activity: Option<&str>) -> anyhow::Result<AnalysisSession> {
    let registry = config.registry()?;
    let settings = config.session_settings()?;
    let activity = activity.unwrap_or(&config.default_activity);
    Ok(AnalysisSession::new(&registry, activity, settings)?)
}

fn cmd_analyze(
    config: &Config,
    input: &Path,
    activity: Option<&str>,
    output: Option<PathBuf>,
    export: bool,
) -> anyhow::Result<()> {
    let session = build_session(config, activity)?;
    let frames = load_frames(input).with_context(|| format!("reading frames from {input:?}"))?;

    tracing::info!(
        activity = session.rule_set().activity(),
        frames = frames.len(),
        fps = config.fps,
        stride = config.stride,
        "analyzing recorded frames"
    );

    let report = if config.workers > 1 {
        session.analyze_batch_parallel(&frames, config.workers)
    } else {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("installing Ctrl+C handler")?;
        session.analyze_batch_cancellable(&frames, &cancel)
    };

    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            std::fs::write(&path, &json).with_context(|| format!("writing {path:?}"))?;
            eprintln!("Wrote report to {path:?}");
        }
        None => println!("{json}"),
    }

    if export {
        export_report(config, &json)?;
    }

    print_batch_overview(&report);
    eprintln!();
    eprintln!("{}", session.stats().summary());
    Ok(())
}

fn export_report(config: &Config, json: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.export_path)
        .with_context(|| format!("creating {:?}", config.export_path))?;
    let export_path = config.export_path.join(format!(
        "report_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&export_path, json).with_context(|| format!("writing {export_path:?}"))?;
    eprintln!("Exported report to {export_path:?}");
    Ok(())
}

fn print_batch_overview(report: &BatchReport) {
    eprintln!();
    eprintln!(
        "Frames: {} ({} with issues){}",
        report.frames.len(),
        report.bad_frame_count(),
        if report.cancelled { " [cancelled]" } else { "" }
    );
    for span in &report.summary.bad {
        let issues: Vec<&str> = span.issues.iter().map(|c| c.as_str()).collect();
        eprintln!("  {}s - {}s: {}", span.from, span.to, issues.join(", "));
    }
}

fn cmd_live(config: &Config, activity: Option<&str>) -> anyhow::Result<()> {
    let stats = create_shared_stats();
    let session = build_session(config, activity)?.with_stats(stats.clone());

    tracing::info!(
        activity = session.rule_set().activity(),
        "reading JSON Lines frames from stdin, Ctrl+C to stop"
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("installing Ctrl+C handler")?;

    let (sender, receiver) = bounded(256);
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for (i, line) in stdin.lock().lines().enumerate() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if sender.send(parse_frame_line(&line, i + 1)).is_err() {
                break;
            }
        }
    });

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(Ok(frame)) => {
                let report = session.analyze_live(&frame);
                println!("{}", serde_json::to_string(&report)?);
            }
            Ok(Err(e)) => {
                tracing::warn!("unreadable frame: {}", e);
                println!("{}", serde_json::to_string(&UnreadableRecord::from(&e))?);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    eprintln!();
    eprintln!("{}", stats.summary());
    Ok(())
}

fn cmd_activities(config: &Config) -> anyhow::Result<()> {
    let registry = config.registry()?;
    for key in registry.activities() {
        let rule_set = registry.resolve(&key)?;
        println!("{key}");
        let codes: Vec<&str> = declared_codes(&rule_set).iter().map(|c| c.as_str()).collect();
        println!("  issues: {}", codes.join(", "));
        for (name, value) in rule_set.thresholds().iter() {
            println!("  {name} = {value}");
        }
        println!();
    }
    Ok(())
}

fn cmd_config(path: Option<&Path>, init: bool) -> anyhow::Result<()> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);

    if init && !config_path.exists() {
        Config::default().save_to(&config_path)?;
        println!("Wrote default configuration to {config_path:?}");
    }

    let config = load_config(path)?;
    config.validate()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(feature = "server")]
fn cmd_serve(config: &Config, port: u16) -> anyhow::Result<()> {
    use posture_rules::server::{run, ServerConfig};

    let server_config = ServerConfig::from_config(port, config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (addr, shutdown_tx) = run(server_config).await?;
        eprintln!("Listening on http://{addr} (Ctrl+C to stop)");
        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        Ok::<(), anyhow::Error>(())
    })
}
