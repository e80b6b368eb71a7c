use super::{Stage, StageContext, StageUpdate};
use crate::error::StageError;
use crate::parser::parse_response;
use crate::record::{PermitEntry, PropertyRecord, StageId, Violation};
use serde::Deserialize;

pub struct PermitStage;

#[derive(Debug, Clone, PartialEq)]
pub struct PermitUpdate {
    pub permit_history: Vec<PermitEntry>,
    pub open_violations: Vec<Violation>,
    pub risk_score: u8,
}

#[derive(Debug, Deserialize)]
struct PermitResponse {
    #[serde(default)]
    permit_history: Vec<PermitEntry>,
    #[serde(default)]
    open_violations: Vec<Violation>,
    risk_score: i64,
}

impl PermitUpdate {
    pub fn apply(self, record: &mut PropertyRecord) -> String {
        let violations = match self.open_violations.len() {
            0 => "no open violations".to_string(),
            1 => "1 open violation".to_string(),
            n => format!("{} open violations", n),
        };
        let narration = format!(
            "Risk score: {}/100, {}, {} historical permits",
            self.risk_score,
            violations,
            self.permit_history.len()
        );
        record.permit_history = self.permit_history;
        record.open_violations = self.open_violations;
        record.risk_score = Some(self.risk_score);
        narration
    }
}

impl Stage for PermitStage {
    fn id(&self) -> StageId {
        StageId::Permit
    }

    fn skills(&self) -> &'static [&'static str] {
        &["permit-lookup"]
    }

    fn request(&self, record: &PropertyRecord, _ctx: &StageContext) -> String {
        format!(
            "Check the permit history and code violations for parcel {} and rate the permit \
             risk from 0 (none) to 100 (severe).\n\n\
             JSON shape: {{\"permit_history\": [{{\"permit_type\": string, \"date\": string, \
             \"status\": string}}], \"open_violations\": [{{\"code\": string, \
             \"description\": string}}], \"risk_score\": integer}}",
            record.parcel_id
        )
    }

    fn interpret(
        &self,
        response: &str,
        _record: &PropertyRecord,
    ) -> Result<StageUpdate, StageError> {
        let parsed: PermitResponse = parse_response(response)?;
        let risk_score = u8::try_from(parsed.risk_score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or_else(|| StageError::InvalidField {
                field: "risk_score",
                reason: format!("{} is outside 0-100", parsed.risk_score),
            })?;

        Ok(StageUpdate::Permit(PermitUpdate {
            permit_history: parsed.permit_history,
            open_violations: parsed.open_violations,
            risk_score,
        }))
    }
}
