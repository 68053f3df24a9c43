use std::path::Path;

use cogex_core::{Color, TaskType};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::trial::TrialDurations;

/// Session configuration. Loaded once and immutable while a session runs.
///
/// Every section has `#[serde(default)]`, so a JSON file only needs the
/// fields it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub name: String,
    pub version: String,
    pub blocks: BlockConfig,
    pub practice: PracticeConfig,
    pub stimuli: StimulusConfig,
    pub interference: InterferenceTiming,
    pub adaptation: AdaptationConfig,
    pub recall: RecallConfig,
    pub inhibition: InhibitionConfig,
    pub task_rotation: Vec<TaskType>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "Adaptive Cognitive Control Task".to_string(),
            version: "1.0.0".to_string(),
            blocks: BlockConfig::default(),
            practice: PracticeConfig::default(),
            stimuli: StimulusConfig::default(),
            interference: InterferenceTiming::default(),
            adaptation: AdaptationConfig::default(),
            recall: RecallConfig::default(),
            inhibition: InhibitionConfig::default(),
            task_rotation: vec![
                TaskType::Interference,
                TaskType::RecallMatch,
                TaskType::Inhibition,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub total: usize,
    pub trials_per_block: usize,
    pub show_progress_after_block: bool,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            total: 5,
            trials_per_block: 10,
            show_progress_after_block: true,
        }
    }
}

/// Fixed, non-adaptive interference trials run before the main blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub trials: usize,
    pub fixation_ms: Option<u64>,
    pub stimulus_ms: u64,
    pub response_window_ms: u64,
    pub feedback_ms: Option<u64>,
    pub difficulty_level: u8,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            trials: 5,
            fixation_ms: Some(500),
            stimulus_ms: 2500,
            response_window_ms: 3500,
            feedback_ms: Some(800),
            difficulty_level: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub words: Vec<Color>,
    pub congruent_probability: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            words: Color::set_of(4),
            congruent_probability: 0.25,
        }
    }
}

/// Timing of adaptive interference trials. The stimulus duration itself
/// comes from the difficulty controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterferenceTiming {
    pub fixation_ms: Option<u64>,
    /// Response window = stimulus duration + this extension.
    pub response_extension_ms: u64,
    pub feedback_ms: Option<u64>,
}

impl Default for InterferenceTiming {
    fn default() -> Self {
        Self {
            fixation_ms: Some(500),
            response_extension_ms: 1000,
            feedback_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProfile {
    pub level: u8,
    pub name: String,
    pub colors: usize,
    pub stimulus_ms: u64,
}

impl LevelProfile {
    fn new(level: u8, name: &str, colors: usize, stimulus_ms: u64) -> Self {
        Self {
            level,
            name: name.to_string(),
            colors,
            stimulus_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    pub window_size: usize,
    pub high_accuracy_threshold: f64,
    pub low_accuracy_threshold: f64,
    pub duration_decrease_ms: u64,
    pub duration_increase_ms: u64,
    pub duration_floor_ms: u64,
    pub duration_ceiling_ms: u64,
    pub initial_level: u8,
    pub levels: Vec<LevelProfile>,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            high_accuracy_threshold: 0.90,
            low_accuracy_threshold: 0.60,
            duration_decrease_ms: 200,
            duration_increase_ms: 300,
            duration_floor_ms: 800,
            duration_ceiling_ms: 3500,
            initial_level: 2,
            levels: vec![
                LevelProfile::new(1, "Beginner", 4, 2500),
                LevelProfile::new(2, "Intermediate", 4, 2000),
                LevelProfile::new(3, "Advanced", 4, 1500),
                LevelProfile::new(4, "Expert", 6, 1200),
                LevelProfile::new(5, "Master", 6, 900),
            ],
        }
    }
}

impl AdaptationConfig {
    /// Table entry for `level`. Only valid after [`AdaptationConfig::validate`].
    pub fn level(&self, level: u8) -> &LevelProfile {
        let idx = usize::from(level.clamp(1, 5)) - 1;
        &self.levels[idx]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("high_accuracy_threshold", self.high_accuracy_threshold)?;
        check_probability("low_accuracy_threshold", self.low_accuracy_threshold)?;
        if self.low_accuracy_threshold > self.high_accuracy_threshold {
            return Err(ConfigError::ThresholdsInverted {
                low: self.low_accuracy_threshold,
                high: self.high_accuracy_threshold,
            });
        }
        check_min("window_size", self.window_size as u64, 1)?;
        check_min("duration_decrease_ms", self.duration_decrease_ms, 1)?;
        check_min("duration_increase_ms", self.duration_increase_ms, 1)?;
        check_min("duration_floor_ms", self.duration_floor_ms, 1)?;
        if self.duration_floor_ms > self.duration_ceiling_ms {
            return Err(ConfigError::DurationBoundsInverted {
                floor_ms: self.duration_floor_ms,
                ceiling_ms: self.duration_ceiling_ms,
            });
        }

        let found: Vec<u8> = self.levels.iter().map(|l| l.level).collect();
        if found != [1, 2, 3, 4, 5] {
            return Err(ConfigError::LevelTable { found });
        }
        let max = Color::PALETTE.len();
        for entry in &self.levels {
            if !(2..=max).contains(&entry.colors) {
                return Err(ConfigError::LevelColors {
                    level: entry.level,
                    colors: entry.colors,
                    max,
                });
            }
            check_min("level stimulus_ms", entry.stimulus_ms, 1)?;
        }
        if !(1..=5).contains(&self.initial_level) {
            return Err(ConfigError::InitialLevel(self.initial_level));
        }
        Ok(())
    }
}

/// Letter-stream working-memory task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    pub n_back: usize,
    pub letters: Vec<char>,
    pub target_probability: f64,
    pub fixation_ms: Option<u64>,
    /// Display time; the response deadline is the same instant.
    pub stimulus_ms: u64,
    pub feedback_ms: Option<u64>,
    pub match_key: char,
    pub no_match_key: char,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            n_back: 2,
            letters: "ABCDEFGH".chars().collect(),
            target_probability: 0.3,
            fixation_ms: Some(500),
            stimulus_ms: 500,
            feedback_ms: Some(800),
            match_key: 'f',
            no_match_key: 'j',
        }
    }
}

/// Go/no-go task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InhibitionConfig {
    pub go_letter: char,
    pub nogo_letters: Vec<char>,
    pub go_probability: f64,
    pub fixation_ms: Option<u64>,
    pub stimulus_ms: u64,
    pub response_window_ms: u64,
    pub feedback_ms: Option<u64>,
    pub respond_key: char,
}

impl Default for InhibitionConfig {
    fn default() -> Self {
        Self {
            go_letter: 'X',
            nogo_letters: vec!['O', 'M', 'N', 'P'],
            go_probability: 0.7,
            fixation_ms: None,
            stimulus_ms: 800,
            response_window_ms: 1500,
            feedback_ms: Some(500),
            respond_key: ' ',
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Rejects malformed values instead of clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.adaptation.validate()?;

        check_min("blocks.total", self.blocks.total as u64, 1)?;
        check_min("blocks.trials_per_block", self.blocks.trials_per_block as u64, 1)?;
        if self.task_rotation.is_empty() {
            return Err(ConfigError::Empty("task_rotation"));
        }

        check_min("practice.stimulus_ms", self.practice.stimulus_ms, 1)?;
        check_min("practice.response_window_ms", self.practice.response_window_ms, 1)?;
        if !(1..=5).contains(&self.practice.difficulty_level) {
            return Err(ConfigError::PracticeLevel(self.practice.difficulty_level));
        }

        check_probability("stimuli.congruent_probability", self.stimuli.congruent_probability)?;
        if self.stimuli.words.is_empty() {
            return Err(ConfigError::Empty("stimuli.words"));
        }
        // Color sets are palette prefixes, so the smallest one bounds them all.
        let answerable = self
            .adaptation
            .levels
            .iter()
            .map(|l| l.colors)
            .chain([self.adaptation.level(self.practice.difficulty_level).colors])
            .min()
            .unwrap_or(0);
        let allowed = Color::set_of(answerable);
        if let Some(&word) = self.stimuli.words.iter().find(|w| !allowed.contains(w)) {
            return Err(ConfigError::WordOutsideColorSet {
                word,
                colors: answerable,
            });
        }

        check_min("recall.n_back", self.recall.n_back as u64, 1)?;
        check_min("recall.letters", self.recall.letters.len() as u64, 2)?;
        check_min("recall.stimulus_ms", self.recall.stimulus_ms, 1)?;
        check_probability("recall.target_probability", self.recall.target_probability)?;
        if self.recall.match_key == self.recall.no_match_key {
            return Err(ConfigError::DuplicateKeys(self.recall.match_key));
        }

        check_probability("inhibition.go_probability", self.inhibition.go_probability)?;
        if self.inhibition.nogo_letters.is_empty() {
            return Err(ConfigError::Empty("inhibition.nogo_letters"));
        }
        check_min("inhibition.stimulus_ms", self.inhibition.stimulus_ms, 1)?;
        check_min(
            "inhibition.response_window_ms",
            self.inhibition.response_window_ms,
            1,
        )?;
        Ok(())
    }

    pub fn practice_durations(&self) -> TrialDurations {
        TrialDurations {
            fixation_ms: self.practice.fixation_ms,
            stimulus_ms: self.practice.stimulus_ms,
            response_window_ms: self.practice.response_window_ms,
            feedback_ms: self.practice.feedback_ms,
        }
    }

    pub fn interference_durations(&self, stimulus_ms: u64) -> TrialDurations {
        TrialDurations {
            fixation_ms: self.interference.fixation_ms,
            stimulus_ms,
            response_window_ms: stimulus_ms + self.interference.response_extension_ms,
            feedback_ms: self.interference.feedback_ms,
        }
    }

    pub fn recall_durations(&self) -> TrialDurations {
        TrialDurations {
            fixation_ms: self.recall.fixation_ms,
            stimulus_ms: self.recall.stimulus_ms,
            response_window_ms: self.recall.stimulus_ms,
            feedback_ms: self.recall.feedback_ms,
        }
    }

    pub fn inhibition_durations(&self) -> TrialDurations {
        TrialDurations {
            fixation_ms: self.inhibition.fixation_ms,
            stimulus_ms: self.inhibition.stimulus_ms,
            response_window_ms: self.inhibition.response_window_ms,
            feedback_ms: self.inhibition.feedback_ms,
        }
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { name, value })
    }
}

fn check_min(name: &'static str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooSmall { name, min, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config = ExperimentConfig::from_json_str(
            r#"{ "blocks": { "total": 3 }, "adaptation": { "window_size": 8 },
                 "task_rotation": ["stroop", "gonogo"] }"#,
        )
        .unwrap();
        assert_eq!(config.blocks.total, 3);
        assert_eq!(config.blocks.trials_per_block, 10);
        assert_eq!(config.adaptation.window_size, 8);
        assert_eq!(config.adaptation.high_accuracy_threshold, 0.90);
        assert_eq!(
            config.task_rotation,
            vec![TaskType::Interference, TaskType::Inhibition]
        );
    }

    #[test]
    fn threshold_outside_unit_interval_is_fatal() {
        let err = ExperimentConfig::from_json_str(
            r#"{ "adaptation": { "high_accuracy_threshold": 1.2 } }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ProbabilityOutOfRange {
                name: "high_accuracy_threshold",
                ..
            }
        ));
    }

    #[test]
    fn zero_window_is_fatal() {
        let mut config = ExperimentConfig::default();
        config.adaptation.window_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooSmall {
                name: "window_size",
                ..
            })
        ));
    }

    #[test]
    fn inverted_thresholds_and_bounds_are_fatal() {
        let mut config = ExperimentConfig::default();
        config.adaptation.low_accuracy_threshold = 0.95;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdsInverted { .. })
        ));

        let mut config = ExperimentConfig::default();
        config.adaptation.duration_floor_ms = 4000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationBoundsInverted { .. })
        ));
    }

    #[test]
    fn level_table_must_be_complete() {
        let mut config = ExperimentConfig::default();
        config.adaptation.levels.pop();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LevelTable { .. })
        ));
    }

    #[test]
    fn words_outside_smallest_color_set_are_fatal() {
        let mut config = ExperimentConfig::default();
        config.stimuli.words = vec![Color::Red, Color::Purple];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WordOutsideColorSet {
                word: Color::Purple,
                colors: 4
            })
        ));

        // Shrinking the practice set also shrinks what words may be used.
        let mut config = ExperimentConfig::default();
        config.adaptation.levels[0].colors = 3;
        config.stimuli.words = Color::set_of(4);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WordOutsideColorSet {
                word: Color::Yellow,
                colors: 3
            })
        ));

        let mut config = ExperimentConfig::default();
        config.stimuli.words = vec![Color::Green, Color::Blue];
        config.validate().unwrap();
    }

    #[test]
    fn practice_level_out_of_range_names_practice() {
        let mut config = ExperimentConfig::default();
        config.practice.difficulty_level = 7;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::PracticeLevel(7)));
        assert!(err.to_string().starts_with("practice difficulty level"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            ExperimentConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn interference_window_extends_stimulus() {
        let config = ExperimentConfig::default();
        let d = config.interference_durations(1800);
        assert_eq!(d.stimulus_ms, 1800);
        assert_eq!(d.response_window_ms, 2800);
        assert_eq!(d.fixation_ms, Some(500));
        assert_eq!(d.feedback_ms, None);
        assert_eq!(config.recall_durations().response_window_ms, 500);
    }
}
