//! Drives a session to completion against any scheduler.

use std::time::Duration;

use anyhow::{Result, bail};
use cogex_core::Color;
use cogex_experiment::{
    Session, SessionEvent, SessionSummary, TrialEffect, TrialSink, TrialTimer,
};
use cogex_timing::Scheduler;
use rand::Rng;
use tracing::{debug, info};

use crate::participant::SimulatedParticipant;

/// A key press due at an absolute scheduler time.
#[derive(Debug, Clone, Copy)]
struct Pending {
    at_ns: u64,
    key: char,
}

pub fn run_session<R, K, S>(
    session: &mut Session<R, K>,
    scheduler: &mut S,
    participant: &mut SimulatedParticipant,
) -> Result<SessionSummary>
where
    R: Rng,
    K: TrialSink,
    S: Scheduler<TrialTimer>,
{
    let mut planned: Option<Pending> = None;
    let mut batch = session.start(scheduler);
    loop {
        let mut interlude = false;
        for event in batch.drain(..) {
            match event {
                SessionEvent::BlockStarted {
                    phase,
                    task_type,
                    trials,
                } => debug!(?phase, task = %task_type, trials, "block"),
                SessionEvent::Trial(TrialEffect::ShowStimulus(stimulus)) => {
                    let colors = active_colors(session);
                    planned = participant
                        .react(&stimulus, &colors, session.config())
                        .map(|r| {
                            let delay_ns = Duration::from_millis(r.delay_ms).as_nanos() as u64;
                            Pending {
                                at_ns: scheduler.now() + delay_ns,
                                key: r.key,
                            }
                        });
                }
                SessionEvent::Trial(TrialEffect::Complete(_)) => planned = None,
                SessionEvent::Trial(_) => {}
                SessionEvent::Adjusted(adj) => {
                    debug!(level = adj.new_level, duration_ms = adj.new_duration_ms, "adjusted")
                }
                SessionEvent::Interlude(progress) => {
                    info!(
                        block = progress.block,
                        of = progress.total_blocks,
                        accuracy = progress.accuracy,
                        level = %progress.level_name,
                        band = ?progress.band,
                        "block complete"
                    );
                    interlude = true;
                }
                SessionEvent::Finished(summary) => return Ok(summary),
            }
        }

        batch = if interlude {
            session.resume(scheduler)
        } else {
            let deadline = scheduler.next_deadline();
            match planned {
                Some(p) if deadline.is_none_or(|d| p.at_ns < d) => {
                    planned = None;
                    scheduler.wait_until(p.at_ns);
                    session.on_input(p.key, scheduler)
                }
                _ if deadline.is_some() => session.run_next_timer(scheduler),
                _ => bail!("session stalled in {:?} with nothing scheduled", session.phase()),
            }
        };
    }
}

/// Color set whose keys the running trial accepts.
fn active_colors<R: Rng, K: TrialSink>(session: &Session<R, K>) -> Vec<Color> {
    let level = session
        .current_trial()
        .map_or(session.difficulty().level, |t| t.context().difficulty_level);
    Color::set_of(session.config().adaptation.level(level).colors)
}
