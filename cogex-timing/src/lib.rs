pub mod scheduler;
pub mod timer;

pub use scheduler::{RealtimeScheduler, Scheduler, TimerId, TimerQueue, VirtualScheduler};
pub use timer::{HighPrecisionTimer, Timer};
