pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::SessionPhase;
pub use stimulus::{Color, Stimulus};
pub use trial::{ErrorFlags, TaskType, TrialResult, TrialState};
