//! Unit tests for cortex-som components

#[cfg(test)]
mod tests {
    use cortex_som::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_cortex_config_default() {
        let config = CortexConfig::default();
        assert_eq!(config.som.rows, 20);
        assert_eq!(config.som.cols, 20);
        assert_eq!(config.som.dim, FeatureVector::DIM);
        assert_eq!(config.features.sample_rate, 44100);
        assert_eq!(config.features.chunk_size, 2048);
        assert_eq!(config.features.low_band, (50.0, 200.0));
        assert_eq!(config.features.mid_band, (800.0, 3200.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_som_config_validation() {
        let mut config = SomConfig::default();
        assert!(config.validate().is_ok());

        config.rows = 0;
        assert!(config.validate().is_err());

        config.rows = 20;
        config.dim = 0;
        assert!(config.validate().is_err());

        config.dim = 3;
        config.min_learning_rate = 0.0;
        assert!(config.validate().is_err());

        config.min_learning_rate = 0.9;
        assert!(config.validate().is_err()); // floor above initial

        config.min_learning_rate = 0.01;
        config.radius_decay = 0.0;
        assert!(config.validate().is_err());

        config.radius_decay = 100.0;
        config.initial_radius = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_config_validation() {
        let mut config = StreamConfig::default();
        assert!(config.validate().is_ok());

        config.buffer_capacity = 0;
        assert!(config.validate().is_err());

        config.buffer_capacity = 32;
        config.pop_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_round_trip_through_file() {
        let mut config = CortexConfig::default();
        config.som.rows = 8;
        config.som.seed = 1234;
        config.features.mid_band = (1000.0, 4000.0);

        let text = config.to_toml_string().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let loaded = CortexConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = CortexConfig::from_toml_str(
            r#"
            history_capacity = 64

            [som]
            rows = 10
            cols = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.history_capacity, 64);
        assert_eq!(config.som.rows, 10);
        assert_eq!(config.som.cols, 12);
        assert_eq!(config.som.initial_radius, 3.0);
        assert_eq!(config.features, FeatureConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = CortexConfig::from_toml_str("[som]\nrows = 0\n");
        assert!(matches!(result, Err(CortexError::Config(_))));
    }

    #[test]
    fn test_winner_ties_break_by_row_then_column() {
        let mut neurons = vec![vec![vec![10.0, 10.0, 10.0]; 6]; 2];
        neurons[0][5] = vec![1.0, 0.0, 0.0];
        neurons[1][0] = vec![-1.0, 0.0, 0.0];
        let grid = SomGrid::from_nested(neurons).unwrap();

        let config = SomConfig {
            rows: 2,
            cols: 6,
            ..SomConfig::default()
        };
        let engine = SomEngine::with_grid(&config, grid).unwrap();

        assert_eq!(engine.winner(&[0.0, 0.0, 0.0]).unwrap(), (0, 5));
    }

    #[test]
    fn test_winner_with_all_equal_weights_is_origin() {
        let config = SomConfig {
            rows: 3,
            cols: 3,
            ..SomConfig::default()
        };
        let grid = SomGrid::new(3, 3, 3, vec![0.5; 27]).unwrap();
        let engine = SomEngine::with_grid(&config, grid).unwrap();
        assert_eq!(engine.winner(&[0.1, 0.2, 0.3]).unwrap(), (0, 0));
    }

    #[test]
    fn test_neighborhood_weight_at_winner_is_exactly_one() {
        for radius in [0.01, 0.5, 1.0, 3.0, 100.0] {
            assert_eq!(neighborhood_weight((7, 2), (7, 2), radius), 1.0);
        }
    }

    #[test]
    fn test_buffer_overflow_keeps_most_recent() {
        let capacity = 4;
        let buffer = StreamBuffer::new(capacity);

        for i in 0..=capacity {
            buffer.push(vec![i as f32; 8]);
        }

        assert_eq!(buffer.len(), capacity);
        assert_eq!(buffer.stats().dropped, 1);

        for expected in 1..=capacity {
            match buffer.pop(Duration::from_millis(1)) {
                PopResult::Chunk(chunk) => {
                    assert_eq!(chunk.sequence(), expected as u64);
                    assert_eq!(chunk.samples()[0], expected as f32);
                }
                other => panic!("Expected chunk, got {:?}", other),
            }
        }
        assert_eq!(buffer.pop(Duration::from_millis(1)), PopResult::Empty);
    }

    #[test]
    fn test_push_reports_overflow() {
        let buffer = StreamBuffer::new(1);
        assert_eq!(buffer.push(vec![0.0; 4]), PushOutcome::Queued);
        assert_eq!(buffer.push(vec![1.0; 4]), PushOutcome::DroppedOldest);
    }

    #[test]
    fn test_closed_buffer_drains_then_reports_closed() {
        let buffer = StreamBuffer::new(4);
        buffer.push(vec![0.0; 4]);
        buffer.push(vec![1.0; 4]);
        buffer.close();

        assert!(matches!(buffer.pop(Duration::from_millis(1)), PopResult::Chunk(_)));
        assert!(matches!(buffer.pop(Duration::from_millis(1)), PopResult::Chunk(_)));
        assert_eq!(buffer.pop(Duration::from_millis(1)), PopResult::Closed);
        assert_eq!(buffer.pop(Duration::from_millis(1)), PopResult::Closed);
    }

    #[test]
    fn test_feature_vector_array_order() {
        let features = FeatureVector::new(1.0, 2.0, 3.0);
        assert_eq!(features.to_array(), [1.0, 2.0, 3.0]);
        assert_eq!(FeatureVector::from([1.0, 2.0, 3.0]), features);
    }

    #[test]
    fn test_component_plane_shape() {
        let grid = SomGrid::random(4, 5, 3, 9).unwrap();
        let plane = grid.component_plane(0).unwrap();
        assert_eq!(plane.len(), 4);
        assert!(plane.iter().all(|row| row.len() == 5));
        assert_eq!(plane[2][3], grid.weight(2, 3)[0]);
        assert!(grid.component_plane(3).is_none());
    }
}
