use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stimulus::Stimulus;

/// The three paradigms a session rotates through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Color/word interference.
    #[serde(alias = "stroop")]
    Interference,
    /// Working-memory recall (n-back match/no-match).
    #[serde(alias = "nback")]
    RecallMatch,
    /// Response inhibition (go/no-go).
    #[serde(alias = "gonogo")]
    Inhibition,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskType::Interference => "interference",
            TaskType::RecallMatch => "recall_match",
            TaskType::Inhibition => "inhibition",
        })
    }
}

/// Trial state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Fixation,
    Stimulus,
    ResponseCollected,
    Timeout,
    Feedback,
    Done,
}

impl TrialState {
    pub fn accepts_input(&self) -> bool {
        matches!(self, TrialState::Stimulus)
    }
}

/// Inhibition-specific error classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFlags {
    /// Responded on a withhold stimulus.
    pub commission: bool,
    /// Failed to respond on a respond stimulus.
    pub omission: bool,
}

/// Recorded result per trial. Emitted exactly once when a trial reaches
/// `Done` and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_index: usize,
    pub task_type: TaskType,
    pub practice: bool,
    pub stimulus: Stimulus,
    pub response: Option<char>,
    pub reaction_time_ms: Option<f64>,
    pub correct: bool,
    pub timed_out: bool,
    pub block_index: usize,
    pub difficulty_level: u8,
    pub stimulus_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_flags: Option<ErrorFlags>,
    pub timestamp_ns: u64,
}

impl TrialResult {
    pub fn congruent(&self) -> Option<bool> {
        self.stimulus.is_congruent()
    }

    pub fn commission_error(&self) -> bool {
        self.error_flags.is_some_and(|f| f.commission)
    }

    pub fn omission_error(&self) -> bool {
        self.error_flags.is_some_and(|f| f.omission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_accepts_legacy_identifiers() {
        let parsed: Vec<TaskType> =
            serde_json::from_str(r#"["stroop", "nback", "gonogo", "recall_match"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                TaskType::Interference,
                TaskType::RecallMatch,
                TaskType::Inhibition,
                TaskType::RecallMatch
            ]
        );
    }

    #[test]
    fn only_the_stimulus_state_takes_input() {
        let open: Vec<TrialState> = [
            TrialState::Fixation,
            TrialState::Stimulus,
            TrialState::ResponseCollected,
            TrialState::Timeout,
            TrialState::Feedback,
            TrialState::Done,
        ]
        .into_iter()
        .filter(TrialState::accepts_input)
        .collect();
        assert_eq!(open, vec![TrialState::Stimulus]);
    }

    #[test]
    fn error_flags_are_omitted_for_other_tasks() {
        let result = TrialResult {
            trial_index: 0,
            task_type: TaskType::RecallMatch,
            practice: false,
            stimulus: Stimulus::Letter {
                letter: 'A',
                is_target: true,
            },
            response: None,
            reaction_time_ms: None,
            correct: false,
            timed_out: true,
            block_index: 2,
            difficulty_level: 2,
            stimulus_duration_ms: 500,
            error_flags: None,
            timestamp_ns: 0,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error_flags").is_none());
        assert!(json["response"].is_null());
        assert!(json["reaction_time_ms"].is_null());
        assert!(!result.commission_error());
    }
}
