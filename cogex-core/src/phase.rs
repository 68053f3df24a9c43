use serde::{Deserialize, Serialize};

/// Session phases, in the order a session walks through them.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Practice,
    /// Main block, 1-based.
    Block { index: usize },
    /// Progress view shown between main blocks.
    Interlude { after_block: usize },
    Debrief,
}

impl SessionPhase {
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::Practice | Self::Block { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Debrief)
    }

    /// Block index as recorded on trial results; practice is block 0.
    pub fn block_index(&self) -> Option<usize> {
        match self {
            Self::Practice => Some(0),
            Self::Block { index } => Some(*index),
            _ => None,
        }
    }

    /// The phase after this one. Interludes are skipped when disabled and
    /// never follow the last block.
    pub fn next(&self, total_blocks: usize, interludes: bool) -> Option<Self> {
        use SessionPhase::*;
        Some(match *self {
            Practice if total_blocks == 0 => Debrief,
            Practice => Block { index: 1 },
            Block { index } if index >= total_blocks => Debrief,
            Block { index } if interludes => Interlude { after_block: index },
            Block { index } => Block { index: index + 1 },
            Interlude { after_block } => Block {
                index: after_block + 1,
            },
            Debrief => return None,
        })
    }
}
