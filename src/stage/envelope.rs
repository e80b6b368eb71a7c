use super::{check_amount, Stage, StageContext, StageUpdate};
use crate::error::StageError;
use crate::output::format_amount;
use crate::parser::parse_response;
use crate::record::{PropertyRecord, StageId};
use serde::Deserialize;

const HEIGHT_DIMENSION: &str = "max_height_ft";

pub struct EnvelopeStage;

#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeUpdate {
    pub max_buildable_area: f64,
    pub max_height: Option<f64>,
    pub avg_sun_hours: Option<f64>,
    pub shadow_impact: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse {
    #[serde(alias = "max_buildable_sqft")]
    max_buildable_area: f64,
    #[serde(default)]
    max_height: Option<f64>,
    #[serde(default)]
    avg_sun_hours: Option<f64>,
    #[serde(default)]
    shadow_impact: Option<String>,
}

impl EnvelopeUpdate {
    pub fn apply(self, record: &mut PropertyRecord) -> String {
        let narration = format!(
            "Max buildable: {} sqft, generated 3D envelope",
            format_amount(self.max_buildable_area)
        );
        record.max_buildable_area = Some(self.max_buildable_area);
        record.max_height = self.max_height;
        record.envelope_generated = true;
        record.avg_sun_hours = self.avg_sun_hours;
        record.shadow_impact = self.shadow_impact;
        narration
    }
}

impl Stage for EnvelopeStage {
    fn id(&self) -> StageId {
        StageId::Envelope
    }

    fn skills(&self) -> &'static [&'static str] {
        &["envelope-development", "sun-analysis"]
    }

    fn request(&self, record: &PropertyRecord, _ctx: &StageContext) -> String {
        let zoning = match &record.district {
            Some(district) => format!("{} zoning", district),
            None => "the applicable zoning".to_string(),
        };
        let dims = if record.dimensions.is_empty() {
            "Dimensional standards are not available; use typical values for the district."
                .to_string()
        } else {
            format!(
                "Dimensional standards: {}.",
                serde_json::to_string(&record.dimensions).unwrap_or_else(|_| "{}".to_string())
            )
        };
        format!(
            "Generate a building envelope for parcel {} using {}. {}\n\
             Also estimate the average daily sun hours and describe the shadow impact.\n\n\
             JSON shape: {{\"max_buildable_area\": number (sqft), \"max_height\": number|null \
             (ft), \"avg_sun_hours\": number|null, \"shadow_impact\": string|null}}",
            record.parcel_id, zoning, dims
        )
    }

    fn interpret(
        &self,
        response: &str,
        record: &PropertyRecord,
    ) -> Result<StageUpdate, StageError> {
        let parsed: EnvelopeResponse = parse_response(response)?;
        check_amount("max_buildable_area", Some(parsed.max_buildable_area))?;
        check_amount("max_height", parsed.max_height)?;
        if let Some(hours) = parsed.avg_sun_hours {
            if !(0.0..=24.0).contains(&hours) {
                return Err(StageError::InvalidField {
                    field: "avg_sun_hours",
                    reason: format!("{} is outside 0-24", hours),
                });
            }
        }

        Ok(StageUpdate::Envelope(EnvelopeUpdate {
            max_buildable_area: parsed.max_buildable_area,
            max_height: parsed
                .max_height
                .or_else(|| record.dimensions.get(HEIGHT_DIMENSION).copied()),
            avg_sun_hours: parsed.avg_sun_hours,
            shadow_impact: parsed.shadow_impact,
        }))
    }
}
