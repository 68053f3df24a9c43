//! Rolling-window difficulty controller.
//!
//! Keeps the last `window_size` trial outcomes and, once the window is full,
//! moves the stimulus duration and difficulty level toward the accuracy band
//! configured by the high/low thresholds.

use std::collections::VecDeque;
use std::fmt;

use cogex_core::{Color, TrialResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AdaptationConfig;
use crate::error::ConfigError;

/// Duration thresholds (ms) mapping a stimulus duration to a level: a
/// duration at or above the `i`-th entry maps to level `i + 1`; anything
/// shorter maps to level 5.
pub const LEVEL_BREAKPOINTS_MS: [u64; 4] = [2200, 1800, 1300, 1000];

pub fn level_for_duration(duration_ms: u64) -> u8 {
    LEVEL_BREAKPOINTS_MS
        .iter()
        .position(|&bp| duration_ms >= bp)
        .map_or(5, |idx| idx as u8 + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub correct: bool,
    pub reaction_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyState {
    pub level: u8,
    pub stimulus_duration_ms: u64,
    pub color_set_size: usize,
}

impl DifficultyState {
    pub fn color_set(&self) -> Vec<Color> {
        Color::set_of(self.color_set_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    InsufficientData,
    WithinTargetRange,
    HighAccuracy {
        duration_decreased: bool,
        level_increased: bool,
    },
    LowAccuracy {
        duration_increased: bool,
        level_decreased: bool,
    },
}

impl fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InsufficientData => f.write_str("Need more data"),
            Self::WithinTargetRange => {
                f.write_str("Performance within target range - no adjustment")
            }
            Self::HighAccuracy {
                duration_decreased,
                level_increased,
            } => {
                f.write_str("High accuracy")?;
                match (duration_decreased, level_increased) {
                    (true, true) => {
                        f.write_str(" - decreased stimulus time and increased difficulty level")
                    }
                    (true, false) => f.write_str(" - decreased stimulus time"),
                    (false, true) => f.write_str(" - increased difficulty level"),
                    (false, false) => f.write_str(" - already at fastest setting"),
                }
            }
            Self::LowAccuracy {
                duration_increased,
                level_decreased,
            } => {
                f.write_str("Low accuracy")?;
                match (duration_increased, level_decreased) {
                    (true, true) => {
                        f.write_str(" - increased stimulus time and decreased difficulty level")
                    }
                    (true, false) => f.write_str(" - increased stimulus time"),
                    (false, true) => f.write_str(" - decreased difficulty level"),
                    (false, false) => f.write_str(" - already at easiest setting"),
                }
            }
        }
    }
}

/// Report returned by every [`DifficultyController::adjust`] call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub adjusted: bool,
    pub previous_level: u8,
    pub new_level: u8,
    pub previous_duration_ms: u64,
    pub new_duration_ms: u64,
    pub accuracy: f64,
    pub reason: AdjustmentReason,
}

/// Audit entry for an adjustment that changed something.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEvent {
    pub previous_level: u8,
    pub new_level: u8,
    pub previous_duration_ms: u64,
    pub new_duration_ms: u64,
    pub accuracy_at_adjustment: f64,
    pub reason: AdjustmentReason,
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_trials: usize,
    pub correct_trials: usize,
    pub accuracy: f64,
    pub mean_rt_ms: f64,
    pub current_level: u8,
    pub level_name: String,
    pub adjustments: usize,
}

/// Serializable export of the controller's full state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub window: Vec<WindowEntry>,
    pub rolling_accuracy: f64,
    pub window_mean_rt_ms: f64,
    pub difficulty: DifficultyState,
    pub history: Vec<AdjustmentEvent>,
    pub summary: SessionSummary,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    trials: usize,
    correct: usize,
    rt_sum_ms: f64,
    rt_count: usize,
}

#[derive(Debug, Clone)]
pub struct DifficultyController {
    config: AdaptationConfig,
    window: VecDeque<WindowEntry>,
    state: DifficultyState,
    history: Vec<AdjustmentEvent>,
    totals: Totals,
}

impl DifficultyController {
    pub fn new(config: AdaptationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = Self::initial_state(&config);
        Ok(Self {
            window: VecDeque::with_capacity(config.window_size),
            config,
            state,
            history: Vec::new(),
            totals: Totals::default(),
        })
    }

    fn initial_state(config: &AdaptationConfig) -> DifficultyState {
        let entry = config.level(config.initial_level);
        DifficultyState {
            level: config.initial_level,
            stimulus_duration_ms: entry.stimulus_ms,
            color_set_size: entry.colors,
        }
    }

    /// Pushes the trial outcome into the window, evicting the oldest entry
    /// past capacity.
    pub fn record_trial(&mut self, result: &TrialResult) {
        self.window.push_back(WindowEntry {
            correct: result.correct,
            reaction_time_ms: result.reaction_time_ms,
        });
        while self.window.len() > self.config.window_size {
            self.window.pop_front();
        }

        self.totals.trials += 1;
        if result.correct {
            self.totals.correct += 1;
        }
        if let Some(rt) = result.reaction_time_ms {
            self.totals.rt_sum_ms += rt;
            self.totals.rt_count += 1;
        }
    }

    pub fn rolling_accuracy(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let correct = self.window.iter().filter(|e| e.correct).count();
        correct as f64 / self.window.len() as f64
    }

    /// Mean of the reaction times present in the window.
    pub fn window_mean_rt(&self) -> f64 {
        let rts: Vec<f64> = self.window.iter().filter_map(|e| e.reaction_time_ms).collect();
        if rts.is_empty() {
            0.0
        } else {
            rts.iter().sum::<f64>() / rts.len() as f64
        }
    }

    pub fn ready_to_adjust(&self) -> bool {
        self.window.len() >= self.config.window_size
    }

    /// Retunes duration and level from the rolling accuracy. Duration and
    /// level are evaluated independently; an event is logged only when one
    /// of them actually changed.
    pub fn adjust(&mut self, timestamp_ns: u64) -> Adjustment {
        let accuracy = self.rolling_accuracy();
        let previous = self.state;
        let mut report = Adjustment {
            adjusted: false,
            previous_level: previous.level,
            new_level: previous.level,
            previous_duration_ms: previous.stimulus_duration_ms,
            new_duration_ms: previous.stimulus_duration_ms,
            accuracy,
            reason: AdjustmentReason::InsufficientData,
        };
        if !self.ready_to_adjust() {
            return report;
        }

        let cfg = &self.config;
        let (duration, level, reason) = if accuracy >= cfg.high_accuracy_threshold {
            let duration = previous
                .stimulus_duration_ms
                .saturating_sub(cfg.duration_decrease_ms)
                .max(cfg.duration_floor_ms)
                .min(previous.stimulus_duration_ms);
            let candidate = level_for_duration(duration);
            let level = previous.level.max(candidate);
            (
                duration,
                level,
                AdjustmentReason::HighAccuracy {
                    duration_decreased: duration < previous.stimulus_duration_ms,
                    level_increased: level > previous.level,
                },
            )
        } else if accuracy <= cfg.low_accuracy_threshold {
            let duration = (previous.stimulus_duration_ms + cfg.duration_increase_ms)
                .min(cfg.duration_ceiling_ms)
                .max(previous.stimulus_duration_ms);
            let level = previous.level.saturating_sub(1).max(1);
            (
                duration,
                level,
                AdjustmentReason::LowAccuracy {
                    duration_increased: duration > previous.stimulus_duration_ms,
                    level_decreased: level < previous.level,
                },
            )
        } else {
            (
                previous.stimulus_duration_ms,
                previous.level,
                AdjustmentReason::WithinTargetRange,
            )
        };

        self.state.stimulus_duration_ms = duration;
        if level != previous.level {
            self.state.level = level;
            self.state.color_set_size = self.config.level(level).colors;
        }

        report.new_level = level;
        report.new_duration_ms = duration;
        report.reason = reason;
        report.adjusted = level != previous.level || duration != previous.stimulus_duration_ms;

        if report.adjusted {
            info!(
                from_level = previous.level,
                to_level = level,
                from_ms = previous.stimulus_duration_ms,
                to_ms = duration,
                accuracy,
                "difficulty adjusted"
            );
            self.history.push(AdjustmentEvent {
                previous_level: previous.level,
                new_level: level,
                previous_duration_ms: previous.stimulus_duration_ms,
                new_duration_ms: duration,
                accuracy_at_adjustment: accuracy,
                reason,
                timestamp_ns,
            });
        } else {
            debug!(accuracy, %reason, "no adjustment");
        }
        report
    }

    pub fn current(&self) -> &DifficultyState {
        &self.state
    }

    pub fn level_name(&self) -> &str {
        &self.config.level(self.state.level).name
    }

    pub fn color_set(&self) -> Vec<Color> {
        self.state.color_set()
    }

    pub fn history(&self) -> &[AdjustmentEvent] {
        &self.history
    }

    pub fn last_adjustment(&self) -> Option<&AdjustmentEvent> {
        self.history.last()
    }

    pub fn window(&self) -> impl Iterator<Item = &WindowEntry> {
        self.window.iter()
    }

    pub fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    /// Whole-session totals; not limited to the window.
    pub fn summary(&self) -> SessionSummary {
        let t = &self.totals;
        SessionSummary {
            total_trials: t.trials,
            correct_trials: t.correct,
            accuracy: if t.trials > 0 {
                t.correct as f64 / t.trials as f64
            } else {
                0.0
            },
            mean_rt_ms: if t.rt_count > 0 {
                t.rt_sum_ms / t.rt_count as f64
            } else {
                0.0
            },
            current_level: self.state.level,
            level_name: self.level_name().to_string(),
            adjustments: self.history.len(),
        }
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            window: self.window.iter().copied().collect(),
            rolling_accuracy: self.rolling_accuracy(),
            window_mean_rt_ms: self.window_mean_rt(),
            difficulty: self.state,
            history: self.history.clone(),
            summary: self.summary(),
        }
    }

    /// Back to the initial difficulty with empty window, history and totals.
    pub fn reset(&mut self) {
        self.window.clear();
        self.history.clear();
        self.totals = Totals::default();
        self.state = Self::initial_state(&self.config);
    }
}
