pub mod adaptive;
pub mod config;
pub mod error;
pub mod generator;
pub mod policy;
pub mod session;
pub mod sink;
pub mod trial;

pub use adaptive::{
    Adjustment, AdjustmentEvent, AdjustmentReason, ControllerSnapshot, DifficultyController,
    DifficultyState, SessionSummary,
};
pub use config::ExperimentConfig;
pub use error::ConfigError;
pub use generator::StimulusGenerator;
pub use policy::{InhibitionPolicy, InterferencePolicy, Outcome, RecallMatchPolicy, TaskPolicy};
pub use session::{BlockPlan, BlockProgress, PerformanceBand, Session, SessionEvent};
pub use sink::{NullSink, TrialSink};
pub use trial::{
    TrialContext, TrialDurations, TrialEffect, TrialEvent, TrialMachine, TrialTimer,
    TrialTimestamps,
};
