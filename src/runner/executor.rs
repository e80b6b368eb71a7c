use crate::error::StageError;
use crate::record::{PropertyRecord, RunState, StageId};
use crate::stage::{run_stage, stage_for, StageContext, StageUpdate};
use crate::telemetry::{TraceEvent, TraceKind, TraceSink};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Run one stage against a snapshot of the record, reporting its boundaries
/// to the trace sink. Never touches the run state.
pub async fn execute_stage(
    id: StageId,
    ctx: &StageContext,
    sink: &dyn TraceSink,
    record: &PropertyRecord,
) -> Result<StageUpdate, StageError> {
    let start = Instant::now();
    sink.record(TraceEvent::ok(TraceKind::StageStart, id.as_str(), Duration::ZERO));
    debug!("Stage {} started", id);

    let result = run_stage(stage_for(id), ctx, record).await;

    let elapsed = start.elapsed();
    sink.record(match &result {
        Ok(_) => TraceEvent::ok(TraceKind::StageEnd, id.as_str(), elapsed),
        Err(e) => TraceEvent::failed(TraceKind::StageEnd, id.as_str(), elapsed, e.to_string()),
    });
    result
}

/// Fold a stage outcome into the run: apply the update and mark the stage
/// completed, or record the failure note.
pub fn settle(state: &mut RunState, id: StageId, outcome: Result<StageUpdate, StageError>) {
    match outcome {
        Ok(update) => {
            debug_assert_eq!(update.stage(), id);
            let narration = update.apply(&mut state.record);
            info!("Completed {}: {}", id, narration);
            state.mark_completed(id, narration);
        }
        Err(e) => {
            let note = e.note(id);
            warn!("{}", note);
            state.mark_failed(id, note);
        }
    }
}
