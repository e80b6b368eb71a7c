use crate::config::RunMode;
use crate::error::{RunnerError, StageError};
use crate::output::synthesize;
use crate::provider::Reasoner;
use crate::record::{Message, RunState, StageId};
use crate::skills::{LoadRecord, SkillSource};
use crate::stage::StageContext;
use crate::state::Checkpointer;
use crate::telemetry::{TraceEvent, TraceKind, TraceSink};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::executor::{execute_stage, settle};
use super::router::{next, Route};

/// Stages that may run side by side. No stage in a phase reads a field
/// written by another stage of the same or a later phase.
const PHASES: [&[StageId]; 2] = [
    &[StageId::Zoning, StageId::Permit],
    &[StageId::Valuation, StageId::Envelope],
];

const MAX_PARALLEL_STAGES: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Checkpoint key; defaults to the parcel id
    pub thread_id: Option<String>,
    /// Continue from the thread's checkpoint when one exists
    pub resume: bool,
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub mode: RunMode,
    pub resumed: bool,
    pub total_duration: Duration,
    /// Skill loads served during this run, hits included
    pub skill_loads: Vec<LoadRecord>,
}

pub struct Orchestrator {
    reasoner: Arc<dyn Reasoner>,
    skills: SkillSource,
    repair_estimate: f64,
    sink: Arc<dyn TraceSink>,
    checkpointer: Arc<dyn Checkpointer>,
    semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        skills: SkillSource,
        sink: Arc<dyn TraceSink>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        Self {
            reasoner,
            skills,
            repair_estimate: 0.0,
            sink,
            checkpointer,
            semaphore: Arc::new(Semaphore::new(MAX_PARALLEL_STAGES)),
        }
    }

    /// Repair budget passed to the valuation stage
    pub fn with_repair_estimate(mut self, repair_estimate: f64) -> Self {
        self.repair_estimate = repair_estimate;
        self
    }

    /// Collaborators for a single run, with a skill cache of its own
    fn context(&self) -> Arc<StageContext> {
        Arc::new(StageContext {
            reasoner: self.reasoner.clone(),
            skills: Arc::new(self.skills.open(self.sink.clone())),
            repair_estimate: self.repair_estimate,
        })
    }

    /// Analyze one parcel. Stage failures end up in the returned state;
    /// only an unusable skill catalog aborts the run.
    pub async fn run(
        &self,
        parcel_id: &str,
        options: &RunOptions,
    ) -> Result<RunReport, RunnerError> {
        let start = Instant::now();
        let thread_id = options.thread_id.as_deref().unwrap_or(parcel_id);

        let (state, resumed) = match self.restore(parcel_id, thread_id, options.resume)? {
            Some(state) => (state, true),
            None => (RunState::new(parcel_id, Some(thread_id)), false),
        };

        if state.is_synthesized() {
            info!("Thread {} already has a report; nothing to do", thread_id);
            return Ok(RunReport {
                state,
                mode: options.mode,
                resumed,
                total_duration: start.elapsed(),
                skill_loads: Vec::new(),
            });
        }

        let ctx = self.context();
        ctx.skills.resolve_catalog().await?;
        let state = match options.mode {
            RunMode::Sequential => self.run_sequential(&ctx, state).await,
            RunMode::Parallel => self.run_parallel(&ctx, state).await?,
        };

        Ok(RunReport {
            state,
            mode: options.mode,
            resumed,
            total_duration: start.elapsed(),
            skill_loads: ctx.skills.audit_trail(),
        })
    }

    fn restore(
        &self,
        parcel_id: &str,
        thread_id: &str,
        resume: bool,
    ) -> Result<Option<RunState>, RunnerError> {
        if !resume {
            return Ok(None);
        }
        match self.checkpointer.load(thread_id)? {
            Some(state) if state.parcel_id() == parcel_id => {
                info!(
                    "Resuming thread {} with {} of {} stages accounted for",
                    thread_id,
                    state.accounted().len(),
                    StageId::ALL.len()
                );
                Ok(Some(state))
            }
            Some(state) => {
                warn!(
                    "Checkpoint for thread {} belongs to parcel {}, starting fresh",
                    thread_id,
                    state.parcel_id()
                );
                Ok(None)
            }
            None => {
                info!("No checkpoint for thread {}, starting fresh", thread_id);
                Ok(None)
            }
        }
    }

    async fn run_sequential(&self, ctx: &StageContext, mut state: RunState) -> RunState {
        loop {
            match next(&state.accounted(), state.is_synthesized()) {
                Route::Stage(id) => {
                    let outcome =
                        execute_stage(id, ctx, self.sink.as_ref(), &state.record).await;
                    settle(&mut state, id, outcome);
                }
                Route::Synthesize => self.synthesize(&mut state),
                Route::Done => return state,
            }
            self.checkpoint(&state);
        }
    }

    async fn run_parallel(
        &self,
        ctx: &Arc<StageContext>,
        mut state: RunState,
    ) -> Result<RunState, RunnerError> {
        for (idx, phase) in PHASES.iter().enumerate() {
            let accounted = state.accounted();
            let pending: Vec<StageId> = phase
                .iter()
                .copied()
                .filter(|id| !accounted.contains(id))
                .collect();
            if pending.is_empty() {
                continue;
            }
            debug!("Phase {}: {:?}", idx + 1, pending);
            self.run_phase(ctx, &mut state, &pending).await?;
            self.checkpoint(&state);
        }

        self.synthesize(&mut state);
        self.checkpoint(&state);
        Ok(state)
    }

    /// Launch every stage of a phase over the same snapshot and fold the
    /// outcomes in once all of them have settled.
    async fn run_phase(
        &self,
        ctx: &Arc<StageContext>,
        state: &mut RunState,
        stages: &[StageId],
    ) -> Result<(), RunnerError> {
        let snapshot = Arc::new(state.record.clone());
        let mut futures = FuturesUnordered::new();

        for &id in stages {
            let permit = self.semaphore.clone().acquire_owned().await?;
            let ctx = ctx.clone();
            let sink = self.sink.clone();
            let record = snapshot.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit; // hold until done
                execute_stage(id, &ctx, sink.as_ref(), &record).await
            });
            futures.push(async move { (id, handle.await) });
        }

        let mut outcomes = Vec::with_capacity(stages.len());
        while let Some((id, joined)) = futures.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Stage {} task panicked: {}", id, e);
                    Err(StageError::Panicked(e.to_string()))
                }
            };
            outcomes.push((id, outcome));
        }

        outcomes.sort_by_key(|(id, _)| *id);
        for (id, outcome) in outcomes {
            settle(state, id, outcome);
        }
        Ok(())
    }

    fn synthesize(&self, state: &mut RunState) {
        let start = Instant::now();
        let (report, recommendation) = synthesize(state);
        info!("Recommendation for {}: {}", state.parcel_id(), recommendation);

        state.report = Some(report);
        state.recommendation = Some(recommendation);
        state.messages.push(Message {
            name: "synthesizer".to_string(),
            content: format!(
                "Generated final report with recommendation: {}",
                recommendation
            ),
        });
        self.sink
            .record(TraceEvent::ok(TraceKind::Synthesis, "synthesizer", start.elapsed()));
    }

    fn checkpoint(&self, state: &RunState) {
        if let Err(e) = self.checkpointer.save(&state.thread_id, state) {
            warn!("Failed to save checkpoint for {}: {}", state.thread_id, e);
        }
    }
}
