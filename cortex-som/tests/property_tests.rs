use cortex_som::*;
use proptest::prelude::*;

fn small_features() -> FeatureConfig {
    FeatureConfig {
        sample_rate: 8000,
        chunk_size: 256,
        low_band: (50.0, 200.0),
        mid_band: (800.0, 3200.0),
    }
}

proptest! {
    #[test]
    fn test_extract_is_finite_and_deterministic(
        samples in prop::collection::vec(-1.0f32..1.0f32, 256)
    ) {
        let extractor = FeatureExtractor::new(small_features()).unwrap();
        let first = extractor.extract_samples(&samples).unwrap();
        let second = extractor.extract_samples(&samples).unwrap();

        prop_assert!(first.is_finite());
        prop_assert_eq!(first, second);
        prop_assert!(first.intensity >= 0.0 && first.intensity <= 1.0);
        prop_assert!(first.log_low >= ENERGY_FLOOR.ln());
        prop_assert!(first.log_mid >= ENERGY_FLOOR.ln());
    }

    #[test]
    fn test_decay_is_non_increasing_and_positive(
        initial in 0.01f64..1.0,
        floor_ratio in 0.001f64..1.0,
        tau in 1.0f64..10_000.0,
        t in 0u64..1_000_000,
    ) {
        let floor = initial * floor_ratio;
        let schedule = DecaySchedule::new(initial, floor, tau).unwrap();
        let now = schedule.value(t);
        let next = schedule.value(t + 1);

        prop_assert!(now > 0.0);
        prop_assert!(next <= now);
        prop_assert!(next >= floor);
    }

    #[test]
    fn test_neighborhood_decreases_with_grid_distance(
        radius in 0.5f64..10.0,
        row in 0usize..20,
        col in 0usize..20,
    ) {
        let winner = (row, col);
        let mut previous = neighborhood_weight(winner, winner, radius);
        prop_assert_eq!(previous, 1.0);

        for k in 1..5 {
            let h = neighborhood_weight(winner, (row + k, col), radius);
            prop_assert!(h < previous);
            prop_assert!(h > 0.0);
            previous = h;
        }
    }

    #[test]
    fn test_winner_is_a_closest_neuron(
        seed in any::<u64>(),
        input in prop::collection::vec(-1.0f64..2.0, 3),
    ) {
        let config = SomConfig { rows: 5, cols: 7, seed, ..SomConfig::default() };
        let engine = SomEngine::new(&config).unwrap();
        let (wr, wc) = engine.winner(&input).unwrap();

        let dist = |w: &[f64]| -> f64 {
            w.iter().zip(&input).map(|(a, b)| (a - b) * (a - b)).sum()
        };
        let best = dist(engine.grid().weight(wr, wc));
        for r in 0..5 {
            for c in 0..7 {
                prop_assert!(best <= dist(engine.grid().weight(r, c)));
            }
        }
    }

    #[test]
    fn test_train_step_keeps_weights_finite(
        inputs in prop::collection::vec(prop::collection::vec(-30.0f64..30.0, 3), 1..50)
    ) {
        let config = SomConfig { rows: 4, cols: 4, ..SomConfig::default() };
        let mut engine = SomEngine::new(&config).unwrap();

        for (i, input) in inputs.iter().enumerate() {
            let outcome = engine.train_step(input).unwrap();
            prop_assert_eq!(outcome.step, i as u64 + 1);
            prop_assert!(outcome.learning_rate > 0.0);
            prop_assert!(outcome.radius > 0.0);
        }
        prop_assert!(engine.grid().as_slice().iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_buffer_never_exceeds_capacity(
        capacity in 1usize..16,
        pushes in 0usize..64,
    ) {
        let buffer = StreamBuffer::new(capacity);
        for i in 0..pushes {
            buffer.push(vec![i as f32; 2]);
            prop_assert!(buffer.len() <= capacity);
        }
        let stats = buffer.stats();
        prop_assert_eq!(stats.pushed, pushes as u64);
        prop_assert_eq!(stats.dropped, pushes.saturating_sub(capacity) as u64);
    }
}
