//! Session orchestration: practice, rotating main blocks, progress
//! interludes and the adaptive feedback loop.
//!
//! A session runs exactly one trial at a time. The caller owns the scheduler
//! and forwards timer expiries ([`Session::on_timer`] or
//! [`Session::run_next_timer`]) and key presses ([`Session::on_input`]).
//! Everything the presentation layer needs comes back as [`SessionEvent`]s.

use std::collections::VecDeque;

use cogex_core::{Color, SessionPhase, Stimulus, TaskType, TrialResult};
use cogex_timing::{Scheduler, TimerId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adaptive::{Adjustment, DifficultyController, DifficultyState, SessionSummary};
use crate::config::ExperimentConfig;
use crate::error::ConfigError;
use crate::generator::StimulusGenerator;
use crate::policy::{InhibitionPolicy, InterferencePolicy, RecallMatchPolicy, TaskPolicy};
use crate::sink::TrialSink;
use crate::trial::{
    TrialContext, TrialDurations, TrialEffect, TrialEvent, TrialMachine, TrialTimer,
};

pub type ActiveTrial = TrialMachine<Box<dyn TaskPolicy>>;
type PolicyQueue = VecDeque<Box<dyn TaskPolicy>>;

/// Outline of one block; index 0 is practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPlan {
    pub index: usize,
    pub task_type: TaskType,
    pub trials: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBand {
    Excellent,
    Great,
    Good,
    NeedsFocus,
}

impl PerformanceBand {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 0.9 {
            Self::Excellent
        } else if accuracy >= 0.75 {
            Self::Great
        } else if accuracy >= 0.6 {
            Self::Good
        } else {
            Self::NeedsFocus
        }
    }
}

/// Read-only view offered between main blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockProgress {
    pub block: usize,
    pub total_blocks: usize,
    pub task_type: TaskType,
    pub trials: usize,
    pub accuracy: f64,
    pub mean_rt_ms: f64,
    pub level: u8,
    pub level_name: String,
    pub last_adjustment_reason: Option<String>,
    pub band: PerformanceBand,
}

impl BlockProgress {
    pub fn percent_complete(&self) -> f64 {
        (self.block * 100) as f64 / self.total_blocks.max(1) as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BlockStarted {
        phase: SessionPhase,
        task_type: TaskType,
        trials: usize,
    },
    Trial(TrialEffect),
    Adjusted(Adjustment),
    Interlude(BlockProgress),
    Finished(SessionSummary),
}

/// Parameters snapshotted when a block is generated.
struct ActiveBlock {
    plan: BlockPlan,
    durations: TrialDurations,
    level: u8,
    queue: PolicyQueue,
    first_result: usize,
}

pub struct Session<R: Rng, K: TrialSink> {
    config: ExperimentConfig,
    generator: StimulusGenerator<R>,
    controller: DifficultyController,
    sink: K,
    plan: Vec<BlockPlan>,
    phase: SessionPhase,
    started: bool,
    block: Option<ActiveBlock>,
    current: Option<ActiveTrial>,
    log: Vec<TrialResult>,
    progress: Option<BlockProgress>,
}

impl<R: Rng, K: TrialSink> Session<R, K> {
    /// Validates `config`; a malformed configuration never starts.
    pub fn new(config: ExperimentConfig, rng: R, sink: K) -> Result<Self, ConfigError> {
        config.validate()?;
        let controller = DifficultyController::new(config.adaptation.clone())?;
        let plan = Self::build_plan(&config);
        Ok(Self {
            config,
            generator: StimulusGenerator::new(rng),
            controller,
            sink,
            plan,
            phase: SessionPhase::Practice,
            started: false,
            block: None,
            current: None,
            log: Vec::new(),
            progress: None,
        })
    }

    fn build_plan(config: &ExperimentConfig) -> Vec<BlockPlan> {
        let practice = BlockPlan {
            index: 0,
            task_type: TaskType::Interference,
            trials: config.practice.trials,
        };
        let rotation = &config.task_rotation;
        std::iter::once(practice)
            .chain((1..=config.blocks.total).map(|index| BlockPlan {
                index,
                task_type: rotation[(index - 1) % rotation.len()],
                trials: config.blocks.trials_per_block,
            }))
            .collect()
    }

    pub fn start<S: Scheduler<TrialTimer>>(&mut self, scheduler: &mut S) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.started {
            return events;
        }
        self.started = true;
        info!(
            name = %self.config.name,
            blocks = self.config.blocks.total,
            "session started"
        );
        self.enter_block(SessionPhase::Practice, scheduler, &mut events);
        events
    }

    pub fn on_timer<S: Scheduler<TrialTimer>>(
        &mut self,
        id: TimerId,
        timer: TrialTimer,
        scheduler: &mut S,
    ) -> Vec<SessionEvent> {
        self.dispatch(TrialEvent::Timer(id, timer), scheduler)
    }

    /// Key presses outside a trial's stimulus state are dropped.
    pub fn on_input<S: Scheduler<TrialTimer>>(
        &mut self,
        key: char,
        scheduler: &mut S,
    ) -> Vec<SessionEvent> {
        if !self.phase.allows_input() {
            return Vec::new();
        }
        self.dispatch(TrialEvent::Input(key), scheduler)
    }

    /// Waits for the earliest pending timer and handles every timer due by
    /// then. Returns nothing when no timer is pending.
    pub fn run_next_timer<S: Scheduler<TrialTimer>>(
        &mut self,
        scheduler: &mut S,
    ) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let Some(deadline) = scheduler.next_deadline() else {
            return events;
        };
        scheduler.wait_until(deadline);
        while let Some((id, timer)) = scheduler.pop_due() {
            events.extend(self.on_timer(id, timer, scheduler));
        }
        events
    }

    /// Leaves a progress interlude and starts the next block.
    pub fn resume<S: Scheduler<TrialTimer>>(&mut self, scheduler: &mut S) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if let SessionPhase::Interlude { after_block } = self.phase {
            self.progress = None;
            self.enter_block(
                SessionPhase::Block {
                    index: after_block + 1,
                },
                scheduler,
                &mut events,
            );
        }
        events
    }

    fn dispatch<S: Scheduler<TrialTimer>>(
        &mut self,
        event: TrialEvent,
        scheduler: &mut S,
    ) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let Some(trial) = self.current.as_mut() else {
            return events;
        };
        let mut completed = None;
        for effect in trial.handle(event, scheduler) {
            if let TrialEffect::Complete(result) = &effect {
                completed = Some(result.clone());
            }
            events.push(SessionEvent::Trial(effect));
        }
        if let Some(result) = completed {
            self.current = None;
            self.on_trial_complete(result, scheduler, &mut events);
            self.start_next_trial(scheduler, &mut events);
        }
        events
    }

    fn on_trial_complete<S: Scheduler<TrialTimer>>(
        &mut self,
        result: TrialResult,
        scheduler: &mut S,
        events: &mut Vec<SessionEvent>,
    ) {
        self.sink.submit(&result);
        if result.task_type == TaskType::Interference && !result.practice {
            self.controller.record_trial(&result);
            if self.controller.ready_to_adjust() {
                let adjustment = self.controller.adjust(scheduler.now());
                if adjustment.adjusted {
                    events.push(SessionEvent::Adjusted(adjustment));
                }
            }
        }
        self.log.push(result);
    }

    fn enter_block<S: Scheduler<TrialTimer>>(
        &mut self,
        phase: SessionPhase,
        scheduler: &mut S,
        events: &mut Vec<SessionEvent>,
    ) {
        self.phase = phase;
        let Some(plan) = phase.block_index().and_then(|i| self.plan.get(i).copied()) else {
            return;
        };
        let block = self.generate_block(plan);
        info!(
            block = plan.index,
            task = %plan.task_type,
            trials = block.queue.len(),
            level = block.level,
            stimulus_ms = block.durations.stimulus_ms,
            "block started"
        );
        events.push(SessionEvent::BlockStarted {
            phase,
            task_type: plan.task_type,
            trials: block.queue.len(),
        });
        self.block = Some(block);
        self.start_next_trial(scheduler, events);
    }

    fn generate_block(&mut self, plan: BlockPlan) -> ActiveBlock {
        let config = &self.config;
        let n = plan.trials;
        let difficulty = *self.controller.current();
        let (durations, level, queue): (_, _, PolicyQueue) = match plan.task_type {
            TaskType::Interference => {
                let (durations, level, colors) = if plan.index == 0 {
                    let level = config.practice.difficulty_level;
                    let colors = Color::set_of(config.adaptation.level(level).colors);
                    (config.practice_durations(), level, colors)
                } else {
                    (
                        config.interference_durations(difficulty.stimulus_duration_ms),
                        difficulty.level,
                        difficulty.color_set(),
                    )
                };
                let stimuli = self.generator.generate_block(
                    n,
                    &colors,
                    &config.stimuli.words,
                    config.stimuli.congruent_probability,
                );
                (durations, level, boxed(&stimuli, |s| {
                    InterferencePolicy::from_stimulus(s, &colors)
                }))
            }
            TaskType::RecallMatch => {
                let recall = &config.recall;
                let stimuli = self.generator.generate_letter_stream(
                    n,
                    &recall.letters,
                    recall.n_back,
                    recall.target_probability,
                );
                (config.recall_durations(), difficulty.level, boxed(&stimuli, |s| {
                    RecallMatchPolicy::from_stimulus(s, recall.match_key, recall.no_match_key)
                }))
            }
            TaskType::Inhibition => {
                let inhibition = &config.inhibition;
                let stimuli = self.generator.generate_cues(
                    n,
                    inhibition.go_letter,
                    &inhibition.nogo_letters,
                    inhibition.go_probability,
                );
                (config.inhibition_durations(), difficulty.level, boxed(&stimuli, |s| {
                    InhibitionPolicy::from_stimulus(s, inhibition.respond_key)
                }))
            }
        };
        if queue.len() != n {
            warn!(expected = n, built = queue.len(), "block built fewer trials than planned");
        }
        ActiveBlock {
            plan,
            durations,
            level,
            queue,
            first_result: self.log.len(),
        }
    }

    fn start_next_trial<S: Scheduler<TrialTimer>>(
        &mut self,
        scheduler: &mut S,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(block) = self.block.as_mut() else {
            return;
        };
        let Some(policy) = block.queue.pop_front() else {
            self.end_block(scheduler, events);
            return;
        };
        let context = TrialContext {
            trial_index: self.log.len(),
            block_index: block.plan.index,
            difficulty_level: block.level,
            practice: block.plan.index == 0,
        };
        let (trial, effects) = TrialMachine::start(policy, block.durations, context, scheduler);
        events.extend(effects.into_iter().map(SessionEvent::Trial));
        self.current = Some(trial);
    }

    fn end_block<S: Scheduler<TrialTimer>>(
        &mut self,
        scheduler: &mut S,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(block) = self.block.take() else {
            return;
        };
        let progress = self.block_progress(&block);
        info!(
            block = progress.block,
            accuracy = progress.accuracy,
            mean_rt_ms = progress.mean_rt_ms,
            "block finished"
        );

        let total = self.config.blocks.total;
        match self.phase.next(total, self.config.blocks.show_progress_after_block) {
            Some(SessionPhase::Interlude { after_block }) => {
                self.phase = SessionPhase::Interlude { after_block };
                self.progress = Some(progress.clone());
                events.push(SessionEvent::Interlude(progress));
            }
            Some(next @ SessionPhase::Block { .. }) => self.enter_block(next, scheduler, events),
            _ => {
                self.phase = SessionPhase::Debrief;
                let summary = self.controller.summary();
                info!(
                    trials = summary.total_trials,
                    accuracy = summary.accuracy,
                    level = summary.current_level,
                    adjustments = summary.adjustments,
                    "session finished"
                );
                self.sink.finish(&summary);
                events.push(SessionEvent::Finished(summary));
            }
        }
    }

    fn block_progress(&self, block: &ActiveBlock) -> BlockProgress {
        let results = &self.log[block.first_result..];
        let correct = results.iter().filter(|r| r.correct).count();
        let accuracy = if results.is_empty() {
            0.0
        } else {
            correct as f64 / results.len() as f64
        };
        let rts: Vec<f64> = results.iter().filter_map(|r| r.reaction_time_ms).collect();
        let mean_rt_ms = if rts.is_empty() {
            0.0
        } else {
            rts.iter().sum::<f64>() / rts.len() as f64
        };
        BlockProgress {
            block: block.plan.index,
            total_blocks: self.config.blocks.total,
            task_type: block.plan.task_type,
            trials: results.len(),
            accuracy,
            mean_rt_ms,
            level: self.controller.current().level,
            level_name: self.controller.level_name().to_string(),
            last_adjustment_reason: self.controller.last_adjustment().map(|e| e.reason.to_string()),
            band: PerformanceBand::from_accuracy(accuracy),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_finished()
    }

    pub fn plan(&self) -> &[BlockPlan] {
        &self.plan
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn difficulty(&self) -> &DifficultyState {
        self.controller.current()
    }

    pub fn controller(&self) -> &DifficultyController {
        &self.controller
    }

    pub fn summary(&self) -> SessionSummary {
        self.controller.summary()
    }

    /// The interlude view, while the session sits between blocks.
    pub fn progress(&self) -> Option<&BlockProgress> {
        self.progress.as_ref()
    }

    pub fn current_trial(&self) -> Option<&ActiveTrial> {
        self.current.as_ref()
    }

    /// Completed trials, in completion order.
    pub fn results(&self) -> &[TrialResult] {
        &self.log
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }
}

fn boxed<P, F>(stimuli: &[Stimulus], build: F) -> PolicyQueue
where
    P: TaskPolicy + 'static,
    F: Fn(&Stimulus) -> Option<P>,
{
    stimuli
        .iter()
        .filter_map(build)
        .map(|p| Box::new(p) as Box<dyn TaskPolicy>)
        .collect()
}
