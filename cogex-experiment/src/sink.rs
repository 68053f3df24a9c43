use cogex_core::TrialResult;

use crate::adaptive::SessionSummary;

/// Persistence collaborator. Receives every completed trial in completion
/// order; delivery is fire-and-forget from the session's point of view.
pub trait TrialSink {
    fn submit(&mut self, result: &TrialResult);

    /// Called once when the session reaches its debrief.
    fn finish(&mut self, _summary: &SessionSummary) {}
}

impl TrialSink for Vec<TrialResult> {
    fn submit(&mut self, result: &TrialResult) {
        self.push(result.clone());
    }
}

impl<T: TrialSink + ?Sized> TrialSink for &mut T {
    fn submit(&mut self, result: &TrialResult) {
        (**self).submit(result)
    }

    fn finish(&mut self, summary: &SessionSummary) {
        (**self).finish(summary)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TrialSink for NullSink {
    fn submit(&mut self, _result: &TrialResult) {}
}
