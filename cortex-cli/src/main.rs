// Cortex Command Line Interface
// Live tonotopic map training from a tone generator or the microphone

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use cortex_som::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cortex")]
#[command(about = "Cortex - live self-organizing tonotopic map", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the map on a live stream
    Run {
        /// Configuration file (TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Stop after this many training steps
        #[arg(long)]
        steps: Option<u64>,

        /// Audio source
        #[arg(long, value_enum, default_value = "tone")]
        source: Source,

        /// Input device name (microphone source)
        #[arg(long)]
        device: Option<String>,

        /// Directory for the final weights and snapshot
        #[arg(long, short, default_value = "./cortex_results")]
        output: PathBuf,

        /// Log a progress line every N steps
        #[arg(long, default_value = "50")]
        report_every: u64,
    },

    /// Print the default configuration as TOML
    Config,

    /// List input devices
    #[cfg(feature = "microphone")]
    Devices,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Built-in tone generator, paced in real time
    Tone,
    /// System microphone
    Microphone,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            config,
            steps,
            source,
            device,
            output,
            report_every,
        } => {
            let config = match config {
                Some(path) => CortexConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => CortexConfig::default(),
            };
            run(config, steps, source, device, output, report_every).await?;
        }
        Commands::Config => {
            print!("{}", CortexConfig::default().to_toml_string()?);
        }
        #[cfg(feature = "microphone")]
        Commands::Devices => {
            for name in AudioCapture::list_devices()? {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

enum Producer {
    Tone(std::thread::JoinHandle<u64>),
    #[cfg(feature = "microphone")]
    Microphone(AudioCapture),
}

fn start_producer(
    source: Source,
    device: Option<String>,
    config: &CortexConfig,
    buffer: Arc<StreamBuffer>,
    shutdown: ShutdownSignal,
) -> anyhow::Result<Producer> {
    match source {
        Source::Tone => {
            let chunk_duration = Duration::from_secs_f64(
                config.features.chunk_size as f64 / config.features.sample_rate as f64,
            );
            let generator = ToneGenerator::low_mid_alternation(&config.features);
            let handle = spawn_tone_source(generator, buffer, shutdown, None, Some(chunk_duration))?;
            Ok(Producer::Tone(handle))
        }
        #[cfg(feature = "microphone")]
        Source::Microphone => {
            let capture = AudioCapture::start(&config.features, device, buffer, shutdown)?;
            Ok(Producer::Microphone(capture))
        }
        #[cfg(not(feature = "microphone"))]
        Source::Microphone => {
            let _ = (device, buffer, shutdown);
            anyhow::bail!("microphone support not compiled in; rebuild with --features microphone")
        }
    }
}

async fn run(
    config: CortexConfig,
    steps: Option<u64>,
    source: Source,
    device: Option<String>,
    output: PathBuf,
    report_every: u64,
) -> anyhow::Result<()> {
    let buffer = Arc::new(StreamBuffer::new(config.stream.buffer_capacity));
    let shutdown = ShutdownSignal::new();

    let coordinator = Coordinator::new(&config, buffer.clone(), shutdown.clone())?;
    let handle = coordinator.spawn()?;
    let producer = match start_producer(source, device, &config, buffer.clone(), shutdown.clone()) {
        Ok(producer) => producer,
        Err(e) => {
            stop_coordinator(&shutdown, &buffer, handle).await;
            return Err(e);
        }
    };

    // Visualization stand-in: follow the latest snapshot
    let mut receiver = handle.subscribe();
    let watch_shutdown = shutdown.clone();
    let report_every = report_every.max(1);
    let mut viewer = tokio::spawn(async move {
        let mut last_reported = 0u64;
        while receiver.changed().await.is_ok() {
            let snapshot = match receiver.borrow_and_update().clone() {
                Some(snapshot) => snapshot,
                None => continue,
            };

            if snapshot.step >= last_reported + report_every {
                last_reported = snapshot.step;
                let latest = snapshot.history.last().copied();
                info!(
                    "step {} winner {:?} alpha {:.4} sigma {:.3} features {:?}",
                    snapshot.step, snapshot.winner, snapshot.learning_rate, snapshot.radius, latest
                );
            }

            if steps.map_or(false, |max| snapshot.step >= max) {
                watch_shutdown.trigger();
            }
        }
    });

    let viewer_done = tokio::select! {
        result = signal::ctrl_c() => {
            result.context("installing Ctrl+C handler")?;
            info!("Interrupted, stopping");
            false
        }
        _ = &mut viewer => true,
    };
    shutdown.trigger();

    let report = tokio::task::spawn_blocking(move || handle.join()).await??;

    match producer {
        Producer::Tone(handle) => {
            if handle.join().is_err() {
                warn!("Tone source thread panicked");
            }
        }
        #[cfg(feature = "microphone")]
        Producer::Microphone(mut capture) => capture.stop(),
    }
    if !viewer_done {
        let _ = viewer.await;
    }

    info!(
        "Finished: {:?} after {} steps, {} chunks dropped",
        report.reason, report.final_snapshot.step, report.stats.dropped
    );
    save_results(&output, &report)?;
    Ok(())
}

/// Stop a coordinator whose producer never started
async fn stop_coordinator(shutdown: &ShutdownSignal, buffer: &StreamBuffer, handle: PipelineHandle) {
    shutdown.trigger();
    buffer.close();
    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(report)) => info!("Coordinator stopped: {:?}", report.reason),
        Ok(Err(e)) => warn!("Coordinator failed while stopping: {}", e),
        Err(e) => warn!("Coordinator join task failed: {}", e),
    }
}

fn save_results(dir: &Path, report: &PipelineReport) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let weights_path = dir.join("final_som_weights.json");
    let weights = serde_json::json!({
        "rows": report.final_weights.rows(),
        "cols": report.final_weights.cols(),
        "dim": report.final_weights.dim(),
        "weights": report.final_weights.to_nested(),
    });
    std::fs::write(&weights_path, serde_json::to_string_pretty(&weights)?)?;

    let snapshot_path = dir.join("final_snapshot.json");
    let mut snapshot = report.final_snapshot.to_json();
    snapshot["stats"] = serde_json::to_value(report.stats)?;
    std::fs::write(&snapshot_path, serde_json::to_string_pretty(&snapshot)?)?;

    info!("Results saved to {}", dir.display());
    Ok(())
}
