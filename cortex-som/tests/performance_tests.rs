//! Performance tests for cortex-som

#[cfg(test)]
mod tests {
    use cortex_som::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn tone(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 44100.0;
                (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5
            })
            .collect()
    }

    #[test]
    fn test_feature_extraction_performance() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let samples = tone(440.0, 2048);

        let start = Instant::now();
        let result = extractor.extract_samples(&samples);
        let duration = start.elapsed();

        assert!(result.is_ok());
        // One chunk must be processed well within its ~46ms of audio
        assert!(duration.as_millis() < 100, "Extraction took too long: {:?}", duration);
    }

    #[test]
    fn test_feature_extraction_throughput() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let samples = tone(1500.0, 2048);

        let iterations = 200;
        let start = Instant::now();
        for _ in 0..iterations {
            let _ = extractor.extract_samples(&samples).unwrap();
        }
        let duration = start.elapsed();

        let per_chunk = duration / iterations;
        assert!(per_chunk < Duration::from_millis(20), "Per-chunk time: {:?}", per_chunk);
    }

    #[test]
    fn test_train_step_performance() {
        let mut engine = SomEngine::new(&SomConfig::default()).unwrap();
        let input = [5.0, -2.0, 0.3];

        let iterations = 1_000;
        let start = Instant::now();
        for _ in 0..iterations {
            engine.train_step(&input).unwrap();
        }
        let duration = start.elapsed();

        assert_eq!(engine.step(), iterations as u64);
        // 20x20 map: a step must stay far below one chunk period
        assert!(duration.as_secs() < 5, "Training took too long: {:?}", duration);
    }

    #[test]
    fn test_buffer_push_throughput() {
        let buffer = StreamBuffer::new(32);
        let chunk = vec![0.0f32; 2048];

        let start = Instant::now();
        for _ in 0..10_000 {
            buffer.push(chunk.clone());
        }
        let duration = start.elapsed();

        assert_eq!(buffer.len(), 32);
        assert!(duration.as_secs() < 2, "Pushes took too long: {:?}", duration);
    }

    #[test]
    fn test_pipeline_keeps_up_with_unpaced_source() {
        let config = CortexConfig::default();
        let buffer = Arc::new(StreamBuffer::new(config.stream.buffer_capacity));
        let shutdown = ShutdownSignal::new();

        let coordinator = Coordinator::new(&config, buffer.clone(), shutdown.clone()).unwrap();
        let start = Instant::now();
        let handle = coordinator.spawn().unwrap();
        let source = spawn_tone_source(
            ToneGenerator::low_mid_alternation(&config.features),
            buffer,
            shutdown,
            Some(200),
            None,
        )
        .unwrap();

        let pushed = source.join().unwrap();
        let report = handle.join().unwrap();
        let duration = start.elapsed();

        assert_eq!(pushed, 200);
        assert_eq!(report.stats.processed + report.stats.dropped, 200);
        assert!(duration.as_secs() < 30, "Pipeline took too long: {:?}", duration);
    }
}
