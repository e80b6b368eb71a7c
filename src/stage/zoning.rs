use super::{Stage, StageContext, StageUpdate};
use crate::error::StageError;
use crate::parser::parse_response;
use crate::record::{PropertyRecord, StageId};
use serde::Deserialize;
use std::collections::BTreeMap;

pub struct ZoningStage;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoningUpdate {
    pub district: String,
    #[serde(default, alias = "dims")]
    pub dimensions: BTreeMap<String, f64>,
    #[serde(default)]
    pub permitted_uses: Vec<String>,
}

impl ZoningUpdate {
    pub fn apply(self, record: &mut PropertyRecord) -> String {
        let narration = format!(
            "Analyzed zoning for {}: district {}, {} dimensional standards",
            record.parcel_id,
            self.district,
            self.dimensions.len()
        );
        record.district = Some(self.district);
        record.dimensions = self.dimensions;
        record.permitted_uses = self.permitted_uses;
        narration
    }
}

impl Stage for ZoningStage {
    fn id(&self) -> StageId {
        StageId::Zoning
    }

    fn skills(&self) -> &'static [&'static str] {
        &["zoning-analysis"]
    }

    fn request(&self, record: &PropertyRecord, _ctx: &StageContext) -> String {
        format!(
            "Analyze the zoning for parcel {}{}. What district is it in and what are the \
             development intensity metrics (setbacks, FAR, max height)?\n\n\
             JSON shape: {{\"district\": string, \"dimensions\": {{name: number}}, \
             \"permitted_uses\": [string]}}. Use snake_case dimension names with units as \
             suffixes, e.g. max_height_ft, far, front_setback_ft.",
            record.parcel_id,
            record
                .address
                .as_deref()
                .map(|a| format!(" ({})", a))
                .unwrap_or_default()
        )
    }

    fn interpret(
        &self,
        response: &str,
        _record: &PropertyRecord,
    ) -> Result<StageUpdate, StageError> {
        let update: ZoningUpdate = parse_response(response)?;
        if update.district.trim().is_empty() {
            return Err(StageError::InvalidField {
                field: "district",
                reason: "empty".to_string(),
            });
        }
        Ok(StageUpdate::Zoning(update))
    }
}
