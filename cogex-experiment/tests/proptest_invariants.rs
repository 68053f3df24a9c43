//! Property-based invariants for stimulus generation and difficulty control.
//!
//! 1. A generated block holds exactly floor(n * ratio) congruent stimuli.
//! 2. Generated words and inks come from the configured sets.
//! 3. The rolling window never exceeds its capacity.
//! 4. No adjustment before the window is full.
//! 5. High accuracy steps the duration down to the floor, never lowers the level.
//! 6. Low accuracy steps the duration up to the ceiling and drops one level.
//! 7. An audit event is logged exactly when something changed.

use cogex_core::{Color, Stimulus, TaskType, TrialResult};
use cogex_experiment::adaptive::level_for_duration;
use cogex_experiment::config::AdaptationConfig;
use cogex_experiment::generator::congruent_count;
use cogex_experiment::{AdjustmentReason, DifficultyController, StimulusGenerator};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

// ── Helpers ─────────────────────────────────────────────────────────────

fn result(correct: bool) -> TrialResult {
    TrialResult {
        trial_index: 0,
        task_type: TaskType::Interference,
        practice: false,
        stimulus: Stimulus::color_word(Color::Green, Color::Red),
        response: Some('r'),
        reaction_time_ms: Some(450.0),
        correct,
        timed_out: false,
        block_index: 1,
        difficulty_level: 2,
        stimulus_duration_ms: 2000,
        error_flags: None,
        timestamp_ns: 0,
    }
}

fn adaptation_strategy() -> impl Strategy<Value = AdaptationConfig> {
    (1usize..10, 1u8..=5, 50u64..500, 50u64..500, 200u64..1200, 0u64..3000).prop_map(
        |(window_size, initial_level, dec, inc, floor, span)| AdaptationConfig {
            window_size,
            initial_level,
            duration_decrease_ms: dec,
            duration_increase_ms: inc,
            duration_floor_ms: floor,
            duration_ceiling_ms: floor + span,
            ..AdaptationConfig::default()
        },
    )
}

fn filled(config: AdaptationConfig, correct: bool) -> DifficultyController {
    let mut c = DifficultyController::new(config.clone()).unwrap();
    for _ in 0..config.window_size {
        c.record_trial(&result(correct));
    }
    c
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Block generation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn block_has_exact_congruent_share(
        n in 0usize..200,
        seed in any::<u64>(),
        size in 2usize..=6,
    ) {
        let colors = Color::set_of(size);
        let mut generator = StimulusGenerator::new(StdRng::seed_from_u64(seed));
        let block = generator.generate_block(n, &colors, &colors, 0.25);
        prop_assert_eq!(block.len(), n);
        let congruent = block.iter().filter(|s| s.is_congruent() == Some(true)).count();
        prop_assert_eq!(congruent, n / 4);
        prop_assert_eq!(congruent, congruent_count(n, 0.25));
    }

    #[test]
    fn block_follows_any_ratio(n in 0usize..200, seed in any::<u64>(), ratio in 0.0f64..=1.0) {
        let colors = Color::set_of(4);
        let mut generator = StimulusGenerator::new(StdRng::seed_from_u64(seed));
        let block = generator.generate_block(n, &colors, &colors, ratio);
        let congruent = block.iter().filter(|s| s.is_congruent() == Some(true)).count();
        prop_assert_eq!(congruent, (n as f64 * ratio).floor() as usize);
    }

    #[test]
    fn stimuli_stay_within_configured_sets(
        seed in any::<u64>(),
        size in 2usize..=6,
        p in 0.0f64..=1.0,
    ) {
        let colors = Color::set_of(size);
        let words = Color::set_of(4);
        let mut generator = StimulusGenerator::new(StdRng::seed_from_u64(seed));
        for _ in 0..50 {
            match generator.generate(&colors, &words, p) {
                Stimulus::ColorWord { word, ink, congruent, correct_response } => {
                    prop_assert!(words.contains(&word));
                    prop_assert!(colors.contains(&ink) || ink == word);
                    prop_assert_eq!(congruent, word == ink);
                    prop_assert_eq!(correct_response, ink.key());
                }
                other => prop_assert!(false, "unexpected stimulus {:?}", other),
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3-4. Window bookkeeping
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn window_never_exceeds_capacity(
        config in adaptation_strategy(),
        outcomes in prop::collection::vec(any::<bool>(), 0..60),
    ) {
        let size = config.window_size;
        let mut c = DifficultyController::new(config).unwrap();
        for (i, ok) in outcomes.iter().enumerate() {
            c.record_trial(&result(*ok));
            prop_assert!(c.window().count() <= size);
            prop_assert_eq!(c.ready_to_adjust(), i + 1 >= size);
        }
        prop_assert_eq!(c.summary().total_trials, outcomes.len());
    }

    #[test]
    fn partial_window_never_adjusts(config in adaptation_strategy(), correct in any::<bool>()) {
        let mut c = DifficultyController::new(config.clone()).unwrap();
        let before = *c.current();
        for _ in 0..config.window_size - 1 {
            c.record_trial(&result(correct));
            let adj = c.adjust(0);
            prop_assert!(!adj.adjusted);
            prop_assert_eq!(adj.reason, AdjustmentReason::InsufficientData);
        }
        prop_assert_eq!(*c.current(), before);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5-7. Adjustment laws
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn high_accuracy_step_law(config in adaptation_strategy(), rounds in 1usize..20) {
        let mut c = filled(config.clone(), true);
        for _ in 0..rounds {
            let before = *c.current();
            let events = c.history().len();
            let adj = c.adjust(1);
            let after = *c.current();

            let expected = before
                .stimulus_duration_ms
                .saturating_sub(config.duration_decrease_ms)
                .max(config.duration_floor_ms)
                .min(before.stimulus_duration_ms);
            prop_assert_eq!(after.stimulus_duration_ms, expected);
            prop_assert_eq!(after.level, before.level.max(level_for_duration(expected)));
            prop_assert!(after.level >= before.level);
            prop_assert_eq!(adj.adjusted, after != before);
            prop_assert_eq!(c.history().len(), events + usize::from(adj.adjusted));
        }
    }

    #[test]
    fn low_accuracy_step_law(config in adaptation_strategy(), rounds in 1usize..20) {
        let mut c = filled(config.clone(), false);
        for _ in 0..rounds {
            let before = *c.current();
            let events = c.history().len();
            let adj = c.adjust(1);
            let after = *c.current();

            let expected = (before.stimulus_duration_ms + config.duration_increase_ms)
                .min(config.duration_ceiling_ms)
                .max(before.stimulus_duration_ms);
            prop_assert_eq!(after.stimulus_duration_ms, expected);
            prop_assert_eq!(after.level, before.level.saturating_sub(1).max(1));
            prop_assert_eq!(after.color_set_size, config.level(after.level).colors);
            prop_assert_eq!(c.history().len(), events + usize::from(adj.adjusted));
        }
    }
}
