use serde::{Deserialize, Serialize};
use std::fmt;

/// Ink colors and color words used by the interference task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl Color {
    /// Full palette in level-table order. A color set of size `k` is the
    /// first `k` entries.
    pub const PALETTE: [Color; 6] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Yellow,
        Color::Purple,
        Color::Orange,
    ];

    /// Fixed response key for this color.
    pub fn key(self) -> char {
        match self {
            Color::Red => 'r',
            Color::Blue => 'b',
            Color::Green => 'g',
            Color::Yellow => 'y',
            Color::Purple => 'p',
            Color::Orange => 'o',
        }
    }

    /// The word that names this color, as displayed.
    pub fn word(self) -> &'static str {
        match self {
            Color::Red => "RED",
            Color::Blue => "BLUE",
            Color::Green => "GREEN",
            Color::Yellow => "YELLOW",
            Color::Purple => "PURPLE",
            Color::Orange => "ORANGE",
        }
    }

    /// The first `size` palette entries, capped at the palette length.
    pub fn set_of(size: usize) -> Vec<Color> {
        Self::PALETTE.iter().copied().take(size).collect()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.word().to_ascii_lowercase())
    }
}

/// Render data for one trial. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stimulus {
    /// A color word drawn in an ink color.
    ColorWord {
        word: Color,
        ink: Color,
        congruent: bool,
        correct_response: char,
    },
    /// A letter in a recall-match stream.
    Letter { letter: char, is_target: bool },
    /// A go/no-go cue.
    Cue { letter: char, go: bool },
}

impl Stimulus {
    /// Builds a color-word stimulus, deriving congruency and the correct
    /// key from the ink.
    pub fn color_word(word: Color, ink: Color) -> Self {
        Stimulus::ColorWord {
            word,
            ink,
            congruent: word == ink,
            correct_response: ink.key(),
        }
    }

    pub fn is_congruent(&self) -> Option<bool> {
        match self {
            Stimulus::ColorWord { congruent, .. } => Some(*congruent),
            _ => None,
        }
    }

    /// Short descriptor used in logs and exports.
    pub fn describe(&self) -> String {
        match self {
            Stimulus::ColorWord { word, ink, .. } => format!("{}/{}", word.word(), ink),
            Stimulus::Letter { letter, is_target } => {
                format!("{}{}", letter, if *is_target { "*" } else { "" })
            }
            Stimulus::Cue { letter, go } => {
                format!("{}:{}", letter, if *go { "go" } else { "nogo" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_keys_are_distinct_lowercase() {
        let keys: Vec<char> = Color::PALETTE.iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!['r', 'b', 'g', 'y', 'p', 'o']);
        assert!(keys.iter().all(char::is_ascii_lowercase));
    }

    #[test]
    fn color_word_targets_the_ink() {
        let stim = Stimulus::color_word(Color::Red, Color::Blue);
        match stim {
            Stimulus::ColorWord {
                congruent,
                correct_response,
                ..
            } => {
                assert!(!congruent);
                assert_eq!(correct_response, 'b');
            }
            _ => unreachable!(),
        }
        assert_eq!(stim.describe(), "RED/blue");
    }

    #[test]
    fn set_of_takes_palette_prefix() {
        assert_eq!(
            Color::set_of(4),
            vec![Color::Red, Color::Blue, Color::Green, Color::Yellow]
        );
        assert_eq!(Color::set_of(10).len(), 6);
    }

    #[test]
    fn stimulus_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Stimulus::Cue { letter: 'X', go: true }).unwrap();
        assert_eq!(json, r#"{"kind":"cue","letter":"X","go":true}"#);
    }
}
