//! Domain stages
//!
//! A stage reads the record, asks the reasoner one question with its skill
//! instructions attached, and turns the answer into a typed update for the
//! fields it owns. Stages never touch `RunState`; the runner decides what a
//! success or failure means for the run.

mod envelope;
mod permit;
mod valuation;
mod zoning;

pub use envelope::{EnvelopeStage, EnvelopeUpdate};
pub use permit::{PermitStage, PermitUpdate};
pub use valuation::{ValuationStage, ValuationUpdate};
pub use zoning::{ZoningStage, ZoningUpdate};

use crate::error::StageError;
use crate::provider::{InvocationContext, Reasoner};
use crate::record::{PropertyRecord, StageId};
use crate::skills::SkillCache;
use std::sync::Arc;
use tracing::debug;

const PREAMBLE: &str = "You are ZoneWise, an expert assistant for zoning analysis, property \
valuation and 3D building envelopes in Brevard County, Florida. Always verify zoning codes \
against municipal sources. For sun analysis the default location is Malabar, FL \
(28.004, -80.5687).";

const JSON_ONLY: &str = "Answer with a single JSON object and nothing else.";

/// Collaborators handed to every stage for one run
pub struct StageContext {
    pub reasoner: Arc<dyn Reasoner>,
    pub skills: Arc<SkillCache>,
    pub repair_estimate: f64,
}

pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Skills whose Level 2 instructions accompany the request
    fn skills(&self) -> &'static [&'static str];

    fn request(&self, record: &PropertyRecord, ctx: &StageContext) -> String;

    /// Turn the reasoner's answer into an update. `record` is the same view
    /// the request was built from.
    fn interpret(&self, response: &str, record: &PropertyRecord)
        -> Result<StageUpdate, StageError>;
}

/// Partial update owned by exactly one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageUpdate {
    Zoning(ZoningUpdate),
    Valuation(ValuationUpdate),
    Permit(PermitUpdate),
    Envelope(EnvelopeUpdate),
}

impl StageUpdate {
    pub fn stage(&self) -> StageId {
        match self {
            StageUpdate::Zoning(_) => StageId::Zoning,
            StageUpdate::Valuation(_) => StageId::Valuation,
            StageUpdate::Permit(_) => StageId::Permit,
            StageUpdate::Envelope(_) => StageId::Envelope,
        }
    }

    /// Write the owned fields into `record`, returning a one-line narration
    pub fn apply(self, record: &mut PropertyRecord) -> String {
        match self {
            StageUpdate::Zoning(u) => u.apply(record),
            StageUpdate::Valuation(u) => u.apply(record),
            StageUpdate::Permit(u) => u.apply(record),
            StageUpdate::Envelope(u) => u.apply(record),
        }
    }
}

static ZONING: ZoningStage = ZoningStage;
static VALUATION: ValuationStage = ValuationStage;
static PERMIT: PermitStage = PermitStage;
static ENVELOPE: EnvelopeStage = EnvelopeStage;

pub fn stage_for(id: StageId) -> &'static dyn Stage {
    match id {
        StageId::Zoning => &ZONING,
        StageId::Valuation => &VALUATION,
        StageId::Permit => &PERMIT,
        StageId::Envelope => &ENVELOPE,
    }
}

/// Run one stage against a read-only view of the record
pub async fn run_stage(
    stage: &dyn Stage,
    ctx: &StageContext,
    record: &PropertyRecord,
) -> Result<StageUpdate, StageError> {
    let catalog = ctx.skills.resolve_catalog().await?;

    let mut instructions = format!("{}\n\n{}", PREAMBLE, catalog.describe());
    for name in stage.skills() {
        let doc = ctx.skills.load_capability(name).await?;
        instructions.push_str(&format!("\n# {} Skill\n\n{}\n", doc.name, doc.body));
    }

    let request = format!("{}\n\n{}", stage.request(record, ctx), JSON_ONLY);
    let context = InvocationContext {
        stage: stage.id(),
        instructions,
    };

    let output = ctx.reasoner.invoke(&request, &context).await?;
    debug!(
        "Stage {} got {} bytes from reasoner in {:?}",
        stage.id(),
        output.text.len(),
        output.duration
    );

    stage.interpret(&output.text, record)
}

/// Reject negative or non-finite amounts
fn check_amount(field: &'static str, value: Option<f64>) -> Result<Option<f64>, StageError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(StageError::InvalidField {
            field,
            reason: format!("{} is not a valid amount", v),
        }),
        other => Ok(other),
    }
}
