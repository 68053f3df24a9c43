//! Per-paradigm behavior plugged into the shared trial state machine.

use cogex_core::{Color, ErrorFlags, Stimulus, TaskType};

/// Scoring of a finished response phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub correct: bool,
    pub error_flags: Option<ErrorFlags>,
}

impl Outcome {
    fn plain(correct: bool) -> Self {
        Self {
            correct,
            error_flags: None,
        }
    }
}

/// What differs between paradigms: the stimulus to render, which inputs
/// count as responses, and how a response (or its absence) is scored.
pub trait TaskPolicy {
    fn task_type(&self) -> TaskType;

    fn stimulus(&self) -> &Stimulus;

    /// Valid-response predicate. Other keys are dropped without effect.
    fn accepts(&self, key: char) -> bool;

    /// Whether the first accepted response closes the response window.
    fn ends_on_response(&self) -> bool {
        true
    }

    fn score(&self, response: Option<char>) -> Outcome;
}

impl<P: TaskPolicy + ?Sized> TaskPolicy for Box<P> {
    fn task_type(&self) -> TaskType {
        (**self).task_type()
    }
    fn stimulus(&self) -> &Stimulus {
        (**self).stimulus()
    }
    fn accepts(&self, key: char) -> bool {
        (**self).accepts(key)
    }
    fn ends_on_response(&self) -> bool {
        (**self).ends_on_response()
    }
    fn score(&self, response: Option<char>) -> Outcome {
        (**self).score(response)
    }
}

/// Color/word interference: respond with the key of the ink color.
#[derive(Debug, Clone)]
pub struct InterferencePolicy {
    stimulus: Stimulus,
    ink: Color,
    choices: Vec<char>,
}

impl InterferencePolicy {
    /// `colors` is the active color set; its keys are the valid responses.
    pub fn new(word: Color, ink: Color, colors: &[Color]) -> Self {
        Self {
            stimulus: Stimulus::color_word(word, ink),
            ink,
            choices: colors.iter().map(|c| c.key()).collect(),
        }
    }

    /// Returns `None` for stimuli that are not color words.
    pub fn from_stimulus(stimulus: &Stimulus, colors: &[Color]) -> Option<Self> {
        match *stimulus {
            Stimulus::ColorWord { word, ink, .. } => Some(Self::new(word, ink, colors)),
            _ => None,
        }
    }
}

impl TaskPolicy for InterferencePolicy {
    fn task_type(&self) -> TaskType {
        TaskType::Interference
    }
    fn stimulus(&self) -> &Stimulus {
        &self.stimulus
    }
    fn accepts(&self, key: char) -> bool {
        self.choices.contains(&key.to_ascii_lowercase())
    }
    fn score(&self, response: Option<char>) -> Outcome {
        Outcome::plain(response.is_some_and(|k| k.to_ascii_lowercase() == self.ink.key()))
    }
}

/// N-back recall: match key on targets, no-match key otherwise.
#[derive(Debug, Clone)]
pub struct RecallMatchPolicy {
    stimulus: Stimulus,
    is_target: bool,
    match_key: char,
    no_match_key: char,
}

impl RecallMatchPolicy {
    pub fn new(letter: char, is_target: bool, match_key: char, no_match_key: char) -> Self {
        Self {
            stimulus: Stimulus::Letter { letter, is_target },
            is_target,
            match_key,
            no_match_key,
        }
    }

    pub fn from_stimulus(stimulus: &Stimulus, match_key: char, no_match_key: char) -> Option<Self> {
        match *stimulus {
            Stimulus::Letter { letter, is_target } => {
                Some(Self::new(letter, is_target, match_key, no_match_key))
            }
            _ => None,
        }
    }
}

impl TaskPolicy for RecallMatchPolicy {
    fn task_type(&self) -> TaskType {
        TaskType::RecallMatch
    }
    fn stimulus(&self) -> &Stimulus {
        &self.stimulus
    }
    fn accepts(&self, key: char) -> bool {
        key == self.match_key || key == self.no_match_key
    }
    fn score(&self, response: Option<char>) -> Outcome {
        let expected = if self.is_target {
            self.match_key
        } else {
            self.no_match_key
        };
        Outcome::plain(response == Some(expected))
    }
}

/// Go/no-go: respond to go cues, withhold on no-go cues.
#[derive(Debug, Clone)]
pub struct InhibitionPolicy {
    stimulus: Stimulus,
    go: bool,
    respond_key: char,
}

impl InhibitionPolicy {
    pub fn new(letter: char, go: bool, respond_key: char) -> Self {
        Self {
            stimulus: Stimulus::Cue { letter, go },
            go,
            respond_key,
        }
    }

    pub fn from_stimulus(stimulus: &Stimulus, respond_key: char) -> Option<Self> {
        match *stimulus {
            Stimulus::Cue { letter, go } => Some(Self::new(letter, go, respond_key)),
            _ => None,
        }
    }
}

impl TaskPolicy for InhibitionPolicy {
    fn task_type(&self) -> TaskType {
        TaskType::Inhibition
    }
    fn stimulus(&self) -> &Stimulus {
        &self.stimulus
    }
    fn accepts(&self, key: char) -> bool {
        key == self.respond_key
    }
    fn ends_on_response(&self) -> bool {
        false
    }
    fn score(&self, response: Option<char>) -> Outcome {
        let responded = response.is_some();
        Outcome {
            correct: responded == self.go,
            error_flags: Some(ErrorFlags {
                commission: !self.go && responded,
                omission: self.go && !responded,
            }),
        }
    }
}
