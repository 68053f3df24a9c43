//! Headless stand-in for a human participant.

use std::ops::RangeInclusive;

use cogex_core::{Color, Stimulus};
use cogex_experiment::ExperimentConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Chance of answering correctly when answering at all.
    pub accuracy: f64,
    /// Chance of not answering a stimulus that calls for a key press.
    pub lapse_rate: f64,
    pub reaction_ms: RangeInclusive<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            accuracy: 0.85,
            lapse_rate: 0.05,
            reaction_ms: 350..=900,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedResponse {
    pub key: char,
    pub delay_ms: u64,
}

pub struct SimulatedParticipant {
    rng: StdRng,
    profile: Profile,
}

impl SimulatedParticipant {
    pub fn new(seed: u64, profile: Profile) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profile,
        }
    }

    /// Decides how to answer `stimulus`. `colors` is the color set whose
    /// keys are valid for color-word trials.
    pub fn react(
        &mut self,
        stimulus: &Stimulus,
        colors: &[Color],
        config: &ExperimentConfig,
    ) -> Option<PlannedResponse> {
        let right = self.rng.random_bool(self.profile.accuracy.clamp(0.0, 1.0));
        let key = match *stimulus {
            Stimulus::ColorWord {
                correct_response, ..
            } => {
                if right {
                    Some(correct_response)
                } else {
                    colors.iter().map(|c| c.key()).find(|k| *k != correct_response)
                }
            }
            Stimulus::Letter { is_target, .. } => {
                let recall = &config.recall;
                Some(if is_target == right {
                    recall.match_key
                } else {
                    recall.no_match_key
                })
            }
            // Withholding on a no-go cue is the right answer.
            Stimulus::Cue { go, .. } => (go == right).then_some(config.inhibition.respond_key),
        }?;

        if self.rng.random_bool(self.profile.lapse_rate.clamp(0.0, 1.0)) {
            return None;
        }
        let delay_ms = self.rng.random_range(self.profile.reaction_ms.clone());
        Some(PlannedResponse { key, delay_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect() -> Profile {
        Profile {
            accuracy: 1.0,
            lapse_rate: 0.0,
            reaction_ms: 400..=400,
        }
    }

    #[test]
    fn perfect_participant_answers_correctly() {
        let config = ExperimentConfig::default();
        let mut p = SimulatedParticipant::new(1, perfect());
        let colors = Color::set_of(4);

        let stroop = Stimulus::color_word(Color::Red, Color::Green);
        assert_eq!(
            p.react(&stroop, &colors, &config),
            Some(PlannedResponse {
                key: 'g',
                delay_ms: 400
            })
        );
        let target = Stimulus::Letter {
            letter: 'A',
            is_target: true,
        };
        assert_eq!(p.react(&target, &colors, &config).map(|r| r.key), Some('f'));
        let nogo = Stimulus::Cue {
            letter: 'O',
            go: false,
        };
        assert_eq!(p.react(&nogo, &colors, &config), None);
    }

    #[test]
    fn inaccurate_participant_presses_a_valid_wrong_key() {
        let config = ExperimentConfig::default();
        let mut p = SimulatedParticipant::new(
            2,
            Profile {
                accuracy: 0.0,
                ..perfect()
            },
        );
        let colors = Color::set_of(4);
        let response = p
            .react(&Stimulus::color_word(Color::Blue, Color::Blue), &colors, &config)
            .unwrap();
        assert_ne!(response.key, 'b');
        assert!(colors.iter().any(|c| c.key() == response.key));

        let go = Stimulus::Cue {
            letter: 'X',
            go: true,
        };
        assert_eq!(p.react(&go, &colors, &config), None);
    }

    #[test]
    fn reaction_times_stay_in_range() {
        let config = ExperimentConfig::default();
        let mut p = SimulatedParticipant::new(
            3,
            Profile {
                accuracy: 1.0,
                lapse_rate: 0.0,
                reaction_ms: 300..=700,
            },
        );
        let stim = Stimulus::Letter {
            letter: 'C',
            is_target: false,
        };
        for _ in 0..100 {
            let r = p.react(&stim, &Color::set_of(4), &config).unwrap();
            assert!((300..=700).contains(&r.delay_ms));
            assert_eq!(r.key, 'j');
        }
    }
}
