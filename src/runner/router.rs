use crate::record::StageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Stage(StageId),
    Synthesize,
    Done,
}

/// Next step for a run, given the stages already accounted for.
///
/// Stages are taken in [`StageId::ALL`] order regardless of the order in
/// which they were accounted for.
pub fn next(accounted: &[StageId], synthesized: bool) -> Route {
    match StageId::ALL.iter().find(|id| !accounted.contains(id)) {
        Some(id) => Route::Stage(*id),
        None if synthesized => Route::Done,
        None => Route::Synthesize,
    }
}
