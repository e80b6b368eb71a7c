//! Final report and recommendation. Pure over the run state; never fails.

use super::format_amount;
use crate::record::{PropertyRecord, Recommendation, RunState, StageId};

const MISSING: &str = "not available";

const BID_MAX_RISK: u8 = 30;
const REVIEW_MAX_RISK: u8 = 50;

/// Decision rule over the merged record.
///
/// Without both `arv` and `max_bid` the answer is always `Incomplete`. A
/// missing risk score counts as zero, the same as an empty violation list.
pub fn recommend(record: &PropertyRecord) -> Recommendation {
    if record.arv.is_none() || record.max_bid.is_none() {
        return Recommendation::Incomplete;
    }
    let risk = record.risk_score.unwrap_or(0);
    if risk < BID_MAX_RISK && record.open_violations.is_empty() {
        Recommendation::Bid
    } else if risk < REVIEW_MAX_RISK {
        Recommendation::Review
    } else {
        Recommendation::Skip
    }
}

pub fn synthesize(state: &RunState) -> (String, Recommendation) {
    let record = &state.record;
    let recommendation = recommend(record);
    let ran = |id: StageId| state.completed.contains(&id);

    let mut lines = vec![
        "# ZoneWise Property Analysis Report".to_string(),
        format!("**Parcel ID:** {}", record.parcel_id),
    ];
    if let Some(address) = &record.address {
        lines.push(format!("**Address:** {}", address));
    }
    lines.push(format!(
        "**Generated:** {}",
        state.started_at.format("%Y-%m-%d %H:%M UTC")
    ));

    lines.push(String::new());
    lines.push("## Zoning Summary".to_string());
    lines.push(format!(
        "- **District:** {}",
        record.district.as_deref().unwrap_or(MISSING)
    ));
    if record.dimensions.is_empty() {
        lines.push(format!("- **Dimensional Standards:** {}", MISSING));
    } else {
        lines.push("- **Dimensional Standards:**".to_string());
        for (name, value) in &record.dimensions {
            lines.push(format!("  - {}: {}", name, value));
        }
    }
    lines.push(format!(
        "- **Permitted Uses:** {}",
        if record.permitted_uses.is_empty() {
            MISSING.to_string()
        } else {
            record.permitted_uses.join(", ")
        }
    ));

    lines.push(String::new());
    lines.push("## Valuation Summary".to_string());
    lines.push(format!("- **Estimated ARV:** {}", dollars(record.arv)));
    lines.push(format!("- **Assessed Value:** {}", dollars(record.assessed_value)));
    lines.push(format!("- **Max Bid:** {}", dollars(record.max_bid)));
    lines.push(format!(
        "- **Comparable Sales:** {}",
        count(ran(StageId::Valuation), record.comparable_sales.len(), "found")
    ));

    lines.push(String::new());
    lines.push("## Permit Analysis".to_string());
    lines.push(format!(
        "- **Permit Risk Score:** {}",
        record
            .risk_score
            .map(|r| format!("{}/100", r))
            .unwrap_or_else(|| MISSING.to_string())
    ));
    let permits_known = ran(StageId::Permit);
    lines.push(format!(
        "- **Open Violations:** {}",
        count(permits_known, record.open_violations.len(), "")
    ));
    for violation in &record.open_violations {
        match &violation.code {
            Some(code) => lines.push(format!("  - {}: {}", code, violation.description)),
            None => lines.push(format!("  - {}", violation.description)),
        }
    }
    lines.push(format!(
        "- **Historical Permits:** {}",
        count(permits_known, record.permit_history.len(), "")
    ));

    lines.push(String::new());
    lines.push("## Sun/Shadow & Envelope".to_string());
    lines.push(format!(
        "- **Average Sun Hours:** {}",
        record
            .avg_sun_hours
            .map(|h| format!("{} hrs/day", h))
            .unwrap_or_else(|| MISSING.to_string())
    ));
    lines.push(format!(
        "- **Shadow Impact:** {}",
        record.shadow_impact.as_deref().unwrap_or(MISSING)
    ));
    lines.push(format!(
        "- **Max Height:** {}",
        record
            .max_height
            .map(|h| format!("{} ft", h))
            .unwrap_or_else(|| MISSING.to_string())
    ));
    lines.push(format!(
        "- **Max Buildable:** {}",
        record
            .max_buildable_area
            .map(|a| format!("{} sqft", format_amount(a)))
            .unwrap_or_else(|| MISSING.to_string())
    ));
    lines.push(format!(
        "- **3D Envelope:** {}",
        if record.envelope_generated {
            "Generated"
        } else {
            "Not generated"
        }
    ));

    lines.push(String::new());
    lines.push("## Recommendation".to_string());
    lines.push(format!(
        "{} **{}** - {}",
        icon(recommendation),
        recommendation,
        recommendation.rationale()
    ));

    if !state.errors.is_empty() {
        lines.push(String::new());
        lines.push("## Errors".to_string());
        lines.extend(state.errors.iter().map(|e| format!("- {}", e)));
    }

    (lines.join("\n"), recommendation)
}

fn dollars(value: Option<f64>) -> String {
    value
        .map(|v| format!("${}", format_amount(v)))
        .unwrap_or_else(|| MISSING.to_string())
}

fn count(known: bool, n: usize, suffix: &str) -> String {
    match (known, suffix) {
        (false, _) => MISSING.to_string(),
        (true, "") => n.to_string(),
        (true, suffix) => format!("{} {}", n, suffix),
    }
}

fn icon(recommendation: Recommendation) -> &'static str {
    match recommendation {
        Recommendation::Bid => "✅",
        Recommendation::Review | Recommendation::Incomplete => "⚠️",
        Recommendation::Skip => "❌",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Violation;

    fn valued(risk: Option<u8>) -> PropertyRecord {
        PropertyRecord {
            arv: Some(325_000.0),
            max_bid: Some(165_000.0),
            risk_score: risk,
            ..PropertyRecord::new("2512345")
        }
    }

    #[test]
    fn test_decision_thresholds() {
        assert_eq!(recommend(&valued(Some(15))), Recommendation::Bid);
        assert_eq!(recommend(&valued(Some(29))), Recommendation::Bid);
        assert_eq!(recommend(&valued(Some(30))), Recommendation::Review);
        assert_eq!(recommend(&valued(Some(49))), Recommendation::Review);
        assert_eq!(recommend(&valued(Some(50))), Recommendation::Skip);
        assert_eq!(recommend(&valued(Some(55))), Recommendation::Skip);
        assert_eq!(recommend(&valued(None)), Recommendation::Bid);
    }

    #[test]
    fn test_violation_blocks_bid() {
        let mut record = valued(Some(10));
        record.open_violations.push(Violation {
            code: Some("CE-2023-114".to_string()),
            description: "Unpermitted addition".to_string(),
        });
        assert_eq!(recommend(&record), Recommendation::Review);
    }

    #[test]
    fn test_missing_valuation_is_incomplete_at_any_risk() {
        for risk in [None, Some(0), Some(99)] {
            let mut record = valued(risk);
            record.max_bid = None;
            assert_eq!(recommend(&record), Recommendation::Incomplete);

            let mut record = valued(risk);
            record.arv = None;
            assert_eq!(recommend(&record), Recommendation::Incomplete);
        }
    }

    #[test]
    fn test_empty_run_report_uses_placeholders() {
        let mut state = RunState::new("2512345", None);
        state.errors.push("zoning agent error: boom".to_string());
        let (report, recommendation) = synthesize(&state);

        assert_eq!(recommendation, Recommendation::Incomplete);
        assert!(report.starts_with("# ZoneWise Property Analysis Report\n**Parcel ID:** 2512345"));
        assert!(report.contains("- **District:** not available"));
        assert!(report.contains("- **Estimated ARV:** not available"));
        assert!(report.contains("- **Open Violations:** not available"));
        assert!(report.contains("- **3D Envelope:** Not generated"));
        assert!(report.contains("⚠️ **INCOMPLETE** - Insufficient data for recommendation"));
        assert!(report.ends_with("## Errors\n- zoning agent error: boom"));
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let mut state = RunState::new("1", None);
        state.record = valued(Some(15));
        state.record.district = Some("RS-10".to_string());
        state.record.max_buildable_area = Some(2500.0);
        state.completed = StageId::ALL.to_vec();
        let (report, _) = synthesize(&state);

        let positions: Vec<usize> = [
            "## Zoning Summary",
            "## Valuation Summary",
            "## Permit Analysis",
            "## Sun/Shadow & Envelope",
            "## Recommendation",
        ]
        .iter()
        .map(|h| report.find(h).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(report.contains("- **Estimated ARV:** $325,000"));
        assert!(report.contains("- **Max Buildable:** 2,500 sqft"));
        assert!(report.contains("- **Open Violations:** 0"));
        assert!(report.contains("- **Comparable Sales:** 0 found"));
        assert!(!report.contains("## Errors"));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let mut state = RunState::new("1", None);
        state.record = valued(Some(40));
        assert_eq!(synthesize(&state), synthesize(&state.clone()));
    }
}
