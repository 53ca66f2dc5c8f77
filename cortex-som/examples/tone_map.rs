//! Tone map example
//! Trains a small map on generated low and mid tones and prints the low-band component plane

use cortex_som::*;
use std::sync::Arc;
use tracing::info;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut config = CortexConfig::default();
    config.som.rows = 8;
    config.som.cols = 8;
    config.validate().map_err(|e| format!("Invalid config: {}", e))?;

    let buffer = Arc::new(StreamBuffer::new(config.stream.buffer_capacity));
    let shutdown = ShutdownSignal::new();

    let coordinator = Coordinator::new(&config, buffer.clone(), shutdown.clone())?;
    let handle = coordinator.spawn()?;

    let source = spawn_tone_source(
        ToneGenerator::low_mid_alternation(&config.features),
        buffer,
        shutdown,
        Some(300),
        None,
    )?;

    let pushed = source.join().map_err(|_| "tone source panicked")?;
    let report = handle.join()?;
    info!(
        "Pushed {} chunks, trained {} steps, dropped {}",
        pushed, report.stats.processed, report.stats.dropped
    );

    if let Some(plane) = report.final_snapshot.component_plane(0) {
        println!("log low-band energy per neuron:");
        for row in plane {
            let cells: Vec<String> = row.iter().map(|v| format!("{:7.2}", v)).collect();
            println!("{}", cells.join(" "));
        }
    }

    Ok(())
}
