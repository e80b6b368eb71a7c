use super::{check_amount, Stage, StageContext, StageUpdate};
use crate::error::StageError;
use crate::output::format_amount;
use crate::parser::parse_response;
use crate::record::{ComparableSale, PropertyRecord, StageId};
use serde::Deserialize;

pub struct ValuationStage;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValuationUpdate {
    pub arv: f64,
    #[serde(default)]
    pub assessed_value: Option<f64>,
    #[serde(default)]
    pub comparable_sales: Vec<ComparableSale>,
    pub max_bid: f64,
}

impl ValuationUpdate {
    pub fn apply(self, record: &mut PropertyRecord) -> String {
        let narration = format!(
            "ARV: ${}, Max Bid: ${} ({} comparable sales)",
            format_amount(self.arv),
            format_amount(self.max_bid),
            self.comparable_sales.len()
        );
        record.arv = Some(self.arv);
        record.assessed_value = self.assessed_value;
        record.comparable_sales = self.comparable_sales;
        record.max_bid = Some(self.max_bid);
        narration
    }
}

impl Stage for ValuationStage {
    fn id(&self) -> StageId {
        StageId::Valuation
    }

    fn skills(&self) -> &'static [&'static str] {
        &["property-valuation"]
    }

    fn request(&self, record: &PropertyRecord, ctx: &StageContext) -> String {
        let zoning = match &record.district {
            Some(district) => format!(
                "\n\nZoning: district {}, dimensions {}.",
                district,
                serde_json::to_string(&record.dimensions).unwrap_or_else(|_| "{}".to_string())
            ),
            None => String::new(),
        };
        format!(
            "Estimate the ARV for parcel {} and calculate the maximum bid assuming ${} in \
             repairs.{}\n\n\
             JSON shape: {{\"arv\": number, \"assessed_value\": number|null, \
             \"comparable_sales\": [{{\"address\": string, \"price\": number, \"sqft\": number}}], \
             \"max_bid\": number}}",
            record.parcel_id,
            format_amount(ctx.repair_estimate),
            zoning
        )
    }

    fn interpret(
        &self,
        response: &str,
        _record: &PropertyRecord,
    ) -> Result<StageUpdate, StageError> {
        let update: ValuationUpdate = parse_response(response)?;
        check_amount("arv", Some(update.arv))?;
        check_amount("max_bid", Some(update.max_bid))?;
        check_amount("assessed_value", update.assessed_value)?;
        Ok(StageUpdate::Valuation(update))
    }
}
