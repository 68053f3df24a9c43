//! Timer-driven trial state machine shared by every paradigm.
//!
//! ```text
//! Fixation -> Stimulus -> (ResponseCollected | Timeout) -> [Feedback] -> Done
//! ```
//!
//! All transitions go through [`TrialMachine::handle`]. Timers are armed on
//! an injected [`Scheduler`], so tests drive a trial on a virtual clock.
//! Reaching `Done` cancels every timer the machine still holds; timer ids it
//! no longer holds and inputs outside `Stimulus` are dropped.

use std::time::Duration;

use cogex_core::{TrialResult, TrialState};
use cogex_timing::{Scheduler, TimerId};
use tracing::{debug, trace};

use crate::policy::{Outcome, TaskPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialTimer {
    FixationEnd,
    /// Stimulus leaves the screen; the response window may stay open.
    StimulusOffset,
    ResponseDeadline,
    FeedbackEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialEvent {
    Timer(TimerId, TrialTimer),
    Input(char),
}

/// Instructions for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialEffect {
    ShowFixation,
    ShowStimulus(cogex_core::Stimulus),
    HideStimulus,
    ShowFeedback { correct: bool },
    Complete(TrialResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialDurations {
    /// `None` starts the trial directly on the stimulus.
    pub fixation_ms: Option<u64>,
    pub stimulus_ms: u64,
    /// Measured from stimulus onset.
    pub response_window_ms: u64,
    /// `None` skips the feedback state.
    pub feedback_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialTimestamps {
    pub start: u64,
    pub stimulus_onset: Option<u64>,
    pub response: Option<u64>,
}

/// Where a trial sits in the session; copied onto its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialContext {
    pub trial_index: usize,
    pub block_index: usize,
    pub difficulty_level: u8,
    pub practice: bool,
}

#[derive(Debug)]
pub struct TrialMachine<P> {
    policy: P,
    durations: TrialDurations,
    context: TrialContext,
    state: TrialState,
    timestamps: TrialTimestamps,
    response: Option<char>,
    outcome: Option<Outcome>,
    pending: Vec<TimerId>,
    stimulus_visible: bool,
    result: Option<TrialResult>,
}

impl<P: TaskPolicy> TrialMachine<P> {
    /// Enters the initial state and arms its timer.
    pub fn start<S: Scheduler<TrialTimer>>(
        policy: P,
        durations: TrialDurations,
        context: TrialContext,
        scheduler: &mut S,
    ) -> (Self, Vec<TrialEffect>) {
        let mut machine = Self {
            policy,
            durations,
            context,
            state: TrialState::Fixation,
            timestamps: TrialTimestamps {
                start: scheduler.now(),
                ..TrialTimestamps::default()
            },
            response: None,
            outcome: None,
            pending: Vec::new(),
            stimulus_visible: false,
            result: None,
        };
        let mut effects = Vec::new();
        match durations.fixation_ms {
            Some(ms) => {
                machine.arm(scheduler, ms, TrialTimer::FixationEnd);
                effects.push(TrialEffect::ShowFixation);
            }
            None => machine.enter_stimulus(scheduler, &mut effects),
        }
        debug!(
            trial = context.trial_index,
            task = %machine.policy.task_type(),
            state = ?machine.state,
            "trial started"
        );
        (machine, effects)
    }

    /// The single transition function.
    pub fn handle<S: Scheduler<TrialTimer>>(
        &mut self,
        event: TrialEvent,
        scheduler: &mut S,
    ) -> Vec<TrialEffect> {
        let mut effects = Vec::new();
        if let TrialEvent::Timer(id, timer) = event {
            if !self.release(id) {
                trace!(%id, ?timer, "stale timer dropped");
                return effects;
            }
        }

        match (self.state, event) {
            (TrialState::Fixation, TrialEvent::Timer(_, TrialTimer::FixationEnd)) => {
                self.enter_stimulus(scheduler, &mut effects);
            }
            (TrialState::Stimulus, TrialEvent::Timer(_, TrialTimer::StimulusOffset)) => {
                self.hide_stimulus(&mut effects);
            }
            (TrialState::Stimulus, TrialEvent::Timer(_, TrialTimer::ResponseDeadline)) => {
                self.close_response_window(scheduler, &mut effects);
            }
            (state, TrialEvent::Input(key))
                if state.accepts_input() && self.response.is_none() && self.policy.accepts(key) =>
            {
                let now = scheduler.now();
                self.response = Some(key);
                self.timestamps.response = Some(now);
                debug!(
                    trial = self.context.trial_index,
                    ?key,
                    rt_ms = ?self.reaction_time_ms(),
                    "response"
                );
                if self.policy.ends_on_response() {
                    self.close_response_window(scheduler, &mut effects);
                }
            }
            (TrialState::Feedback, TrialEvent::Timer(_, TrialTimer::FeedbackEnd)) => {
                self.finish(scheduler, &mut effects);
            }
            (state, event) => {
                trace!(trial = self.context.trial_index, ?state, ?event, "event ignored");
            }
        }
        effects
    }

    fn arm<S: Scheduler<TrialTimer>>(&mut self, scheduler: &mut S, ms: u64, timer: TrialTimer) {
        let id = scheduler.schedule(Duration::from_millis(ms), timer);
        self.pending.push(id);
    }

    fn release(&mut self, id: TimerId) -> bool {
        match self.pending.iter().position(|p| *p == id) {
            Some(idx) => {
                self.pending.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    fn cancel_all<S: Scheduler<TrialTimer>>(&mut self, scheduler: &mut S) {
        for id in self.pending.drain(..) {
            scheduler.cancel(id);
        }
    }

    fn enter_stimulus<S: Scheduler<TrialTimer>>(
        &mut self,
        scheduler: &mut S,
        effects: &mut Vec<TrialEffect>,
    ) {
        self.state = TrialState::Stimulus;
        self.timestamps.stimulus_onset = Some(scheduler.now());
        self.stimulus_visible = true;
        effects.push(TrialEffect::ShowStimulus(self.policy.stimulus().clone()));

        if self.durations.stimulus_ms < self.durations.response_window_ms {
            self.arm(scheduler, self.durations.stimulus_ms, TrialTimer::StimulusOffset);
        }
        self.arm(
            scheduler,
            self.durations.response_window_ms,
            TrialTimer::ResponseDeadline,
        );
    }

    fn hide_stimulus(&mut self, effects: &mut Vec<TrialEffect>) {
        if self.stimulus_visible {
            self.stimulus_visible = false;
            effects.push(TrialEffect::HideStimulus);
        }
    }

    fn close_response_window<S: Scheduler<TrialTimer>>(
        &mut self,
        scheduler: &mut S,
        effects: &mut Vec<TrialEffect>,
    ) {
        self.cancel_all(scheduler);
        self.hide_stimulus(effects);
        self.state = if self.response.is_some() {
            TrialState::ResponseCollected
        } else {
            TrialState::Timeout
        };
        let outcome = self.policy.score(self.response);
        self.outcome = Some(outcome);

        match self.durations.feedback_ms {
            Some(ms) => {
                self.state = TrialState::Feedback;
                self.arm(scheduler, ms, TrialTimer::FeedbackEnd);
                effects.push(TrialEffect::ShowFeedback {
                    correct: outcome.correct,
                });
            }
            None => self.finish(scheduler, effects),
        }
    }

    fn finish<S: Scheduler<TrialTimer>>(
        &mut self,
        scheduler: &mut S,
        effects: &mut Vec<TrialEffect>,
    ) {
        self.cancel_all(scheduler);
        let outcome = self
            .outcome
            .unwrap_or_else(|| self.policy.score(self.response));
        self.state = TrialState::Done;

        let result = TrialResult {
            trial_index: self.context.trial_index,
            task_type: self.policy.task_type(),
            practice: self.context.practice,
            stimulus: self.policy.stimulus().clone(),
            response: self.response,
            reaction_time_ms: self.reaction_time_ms(),
            correct: outcome.correct,
            timed_out: self.response.is_none(),
            block_index: self.context.block_index,
            difficulty_level: self.context.difficulty_level,
            stimulus_duration_ms: self.durations.stimulus_ms,
            error_flags: outcome.error_flags,
            timestamp_ns: scheduler.now(),
        };
        debug!(
            trial = result.trial_index,
            correct = result.correct,
            rt_ms = ?result.reaction_time_ms,
            "trial done"
        );
        effects.push(TrialEffect::Complete(result.clone()));
        self.result = Some(result);
    }

    /// Stimulus onset to accepted response; absent on timeout.
    pub fn reaction_time_ms(&self) -> Option<f64> {
        let onset = self.timestamps.stimulus_onset?;
        let response = self.timestamps.response?;
        Some(response.saturating_sub(onset) as f64 / 1_000_000.0)
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == TrialState::Done
    }

    pub fn result(&self) -> Option<&TrialResult> {
        self.result.as_ref()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn context(&self) -> &TrialContext {
        &self.context
    }

    pub fn durations(&self) -> &TrialDurations {
        &self.durations
    }

    pub fn timestamps(&self) -> &TrialTimestamps {
        &self.timestamps
    }

    pub fn stimulus_visible(&self) -> bool {
        self.stimulus_visible
    }

    /// Timers this trial still holds on the scheduler.
    pub fn pending_timers(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{InhibitionPolicy, InterferencePolicy, RecallMatchPolicy};
    use cogex_core::{Color, ErrorFlags, Stimulus, TaskType};
    use cogex_timing::VirtualScheduler;

    type Sched = VirtualScheduler<TrialTimer>;

    fn ctx() -> TrialContext {
        TrialContext {
            trial_index: 7,
            block_index: 1,
            difficulty_level: 2,
            practice: false,
        }
    }

    fn durations(
        fixation: Option<u64>,
        stimulus: u64,
        window: u64,
        feedback: Option<u64>,
    ) -> TrialDurations {
        TrialDurations {
            fixation_ms: fixation,
            stimulus_ms: stimulus,
            response_window_ms: window,
            feedback_ms: feedback,
        }
    }

    /// Fires the next timer into the machine.
    fn tick<P: TaskPolicy>(m: &mut TrialMachine<P>, s: &mut Sched) -> Vec<TrialEffect> {
        let (id, timer) = s.fire_next().expect("a pending timer");
        m.handle(TrialEvent::Timer(id, timer), s)
    }

    fn completed(effects: &[TrialEffect]) -> Option<&TrialResult> {
        effects.iter().find_map(|e| match e {
            TrialEffect::Complete(r) => Some(r),
            _ => None,
        })
    }

    #[test]
    fn interference_response_to_ink_is_correct() {
        let mut s = Sched::new();
        let policy = InterferencePolicy::new(Color::Red, Color::Blue, &Color::set_of(4));
        let timing = durations(Some(500), 2000, 3000, None);
        let (mut m, effects) = TrialMachine::start(policy, timing, ctx(), &mut s);
        assert_eq!(effects, vec![TrialEffect::ShowFixation]);
        assert_eq!(m.state(), TrialState::Fixation);

        // No input during fixation.
        assert!(m.handle(TrialEvent::Input('b'), &mut s).is_empty());

        let effects = tick(&mut m, &mut s);
        assert!(matches!(effects[0], TrialEffect::ShowStimulus(_)));
        assert_eq!(m.state(), TrialState::Stimulus);

        s.advance(Duration::from_millis(640));
        let effects = m.handle(TrialEvent::Input('b'), &mut s);
        let result = completed(&effects).expect("trial completed");
        assert!(result.correct);
        assert_eq!(result.congruent(), Some(false));
        assert_eq!(result.response, Some('b'));
        assert_eq!(result.reaction_time_ms, Some(640.0));
        assert_eq!(result.task_type, TaskType::Interference);
        assert_eq!(result.block_index, 1);
        assert!(m.is_done());
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn only_first_qualifying_input_counts() {
        let mut s = Sched::new();
        let policy = InterferencePolicy::new(Color::Green, Color::Yellow, &Color::set_of(4));
        let timing = durations(None, 1000, 2000, Some(500));
        let (mut m, _) = TrialMachine::start(policy, timing, ctx(), &mut s);

        // Invalid key is dropped, not scored.
        assert!(m.handle(TrialEvent::Input('z'), &mut s).is_empty());
        s.advance(Duration::from_millis(300));
        let effects = m.handle(TrialEvent::Input('y'), &mut s);
        assert!(effects.contains(&TrialEffect::ShowFeedback { correct: true }));
        assert_eq!(m.state(), TrialState::Feedback);

        assert!(m.handle(TrialEvent::Input('g'), &mut s).is_empty());
        let effects = tick(&mut m, &mut s);
        let result = completed(&effects).unwrap();
        assert_eq!(result.response, Some('y'));
        assert_eq!(result.reaction_time_ms, Some(300.0));
    }

    #[test]
    fn timeout_records_absent_response_and_rt() {
        let mut s = Sched::new();
        let policy = RecallMatchPolicy::new('C', true, 'f', 'j');
        let timing = durations(Some(500), 500, 500, None);
        let (mut m, _) = TrialMachine::start(policy, timing, ctx(), &mut s);
        tick(&mut m, &mut s);
        let effects = tick(&mut m, &mut s);
        let result = completed(&effects).unwrap();
        assert!(!result.correct);
        assert!(result.timed_out);
        assert_eq!(result.response, None);
        assert_eq!(result.reaction_time_ms, None);
    }

    #[test]
    fn stimulus_offset_hides_without_closing_window() {
        let mut s = Sched::new();
        let policy = InterferencePolicy::new(Color::Red, Color::Red, &Color::set_of(4));
        let timing = durations(None, 800, 1800, None);
        let (mut m, _) = TrialMachine::start(policy, timing, ctx(), &mut s);
        let effects = tick(&mut m, &mut s);
        assert_eq!(effects, vec![TrialEffect::HideStimulus]);
        assert_eq!(m.state(), TrialState::Stimulus);
        assert!(!m.stimulus_visible());

        s.advance(Duration::from_millis(200));
        let effects = m.handle(TrialEvent::Input('r'), &mut s);
        let result = completed(&effects).unwrap();
        assert!(result.correct);
        assert_eq!(result.reaction_time_ms, Some(1000.0));
    }

    #[test]
    fn withhold_response_is_commission_error() {
        let mut s = Sched::new();
        let policy = InhibitionPolicy::new('O', false, ' ');
        let timing = durations(None, 800, 1500, None);
        let (mut m, effects) = TrialMachine::start(policy, timing, ctx(), &mut s);
        assert!(matches!(
            effects[0],
            TrialEffect::ShowStimulus(Stimulus::Cue { go: false, .. })
        ));

        s.advance(Duration::from_millis(1200));
        // Recorded, but the window stays open until its deadline.
        assert!(m.handle(TrialEvent::Input(' '), &mut s).is_empty());
        assert_eq!(m.state(), TrialState::Stimulus);
        assert!(m.handle(TrialEvent::Input(' '), &mut s).is_empty());

        let mut result = None;
        while !m.is_done() {
            let effects = tick(&mut m, &mut s);
            result = completed(&effects).cloned().or(result);
        }
        let result = result.unwrap();
        assert!(!result.correct);
        assert_eq!(
            result.error_flags,
            Some(ErrorFlags {
                commission: true,
                omission: false
            })
        );
        assert_eq!(result.reaction_time_ms, Some(1200.0));
        assert_eq!(s.now(), 1_500_000_000);
    }

    #[test]
    fn done_cancels_timers_and_ignores_late_events() {
        let mut s = Sched::new();
        let policy = InterferencePolicy::new(Color::Blue, Color::Green, &Color::set_of(4));
        let timing = durations(None, 1000, 2000, None);
        let (mut m, _) = TrialMachine::start(policy, timing, ctx(), &mut s);
        assert_eq!(s.pending(), 2);

        let effects = m.handle(TrialEvent::Input('g'), &mut s);
        assert!(completed(&effects).is_some());
        assert_eq!(s.pending(), 0);
        assert_eq!(m.pending_timers(), 0);

        // A timer id from before completion is stale now.
        let stale = s.schedule(Duration::from_millis(1), TrialTimer::ResponseDeadline);
        let late = TrialEvent::Timer(stale, TrialTimer::ResponseDeadline);
        assert!(m.handle(late, &mut s).is_empty());
        assert!(m.handle(TrialEvent::Input('b'), &mut s).is_empty());
        assert_eq!(m.result().unwrap().response, Some('g'));
    }
}
