use cogex_core::{Color, Stimulus};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

/// Produces stimuli for all three paradigms from a single random source.
#[derive(Debug)]
pub struct StimulusGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> StimulusGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// One color-word stimulus. With probability `congruent_probability` the
    /// ink matches the word; otherwise the ink is drawn uniformly from
    /// `colors` minus the word's color.
    pub fn generate(
        &mut self,
        colors: &[Color],
        words: &[Color],
        congruent_probability: f64,
    ) -> Stimulus {
        let word = words.choose(&mut self.rng).copied().unwrap_or(Color::Red);
        if self.rng.random_bool(congruent_probability.clamp(0.0, 1.0)) {
            Stimulus::color_word(word, word)
        } else {
            self.incongruent(word, colors)
        }
    }

    fn incongruent(&mut self, word: Color, colors: &[Color]) -> Stimulus {
        let others: Vec<Color> = colors.iter().copied().filter(|c| *c != word).collect();
        // A color set holding only the word's color cannot produce an
        // incongruent stimulus; the result is then reported as congruent.
        let ink = others.choose(&mut self.rng).copied().unwrap_or(word);
        Stimulus::color_word(word, ink)
    }

    /// A block of `n` stimuli with exactly `floor(n * congruent_ratio)`
    /// congruent ones, in uniformly shuffled order.
    pub fn generate_block(
        &mut self,
        n: usize,
        colors: &[Color],
        words: &[Color],
        congruent_ratio: f64,
    ) -> Vec<Stimulus> {
        let congruent = congruent_count(n, congruent_ratio);
        let mut block: Vec<Stimulus> = (0..n)
            .map(|i| {
                let p = if i < congruent { 1.0 } else { 0.0 };
                self.generate(colors, words, p)
            })
            .collect();
        block.shuffle(&mut self.rng);
        block
    }

    /// Letter stream for an n-back block. From position `n_back` onward a
    /// position repeats the letter `n_back` earlier with `target_probability`;
    /// the target flag reflects the actual match.
    pub fn generate_letter_stream(
        &mut self,
        n: usize,
        letters: &[char],
        n_back: usize,
        target_probability: f64,
    ) -> Vec<Stimulus> {
        let mut sequence: Vec<char> = Vec::with_capacity(n);
        for i in 0..n {
            let letter = if i >= n_back && self.rng.random_bool(target_probability) {
                sequence[i - n_back]
            } else {
                letters.choose(&mut self.rng).copied().unwrap_or('A')
            };
            sequence.push(letter);
        }
        sequence
            .iter()
            .enumerate()
            .map(|(i, &letter)| Stimulus::Letter {
                letter,
                is_target: i >= n_back && sequence[i - n_back] == letter,
            })
            .collect()
    }

    /// Go/no-go cues: go with `go_probability`, otherwise a uniformly drawn
    /// no-go letter.
    pub fn generate_cues(
        &mut self,
        n: usize,
        go_letter: char,
        nogo_letters: &[char],
        go_probability: f64,
    ) -> Vec<Stimulus> {
        (0..n)
            .map(|_| {
                if self.rng.random_bool(go_probability) {
                    Stimulus::Cue {
                        letter: go_letter,
                        go: true,
                    }
                } else {
                    Stimulus::Cue {
                        letter: nogo_letters.choose(&mut self.rng).copied().unwrap_or('O'),
                        go: false,
                    }
                }
            })
            .collect()
    }
}

/// Number of congruent stimuli in a block of `n`.
pub fn congruent_count(n: usize, congruent_ratio: f64) -> usize {
    ((n as f64 * congruent_ratio.clamp(0.0, 1.0)).floor() as usize).min(n)
}
