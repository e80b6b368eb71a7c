//! Shared analysis record and per-run bookkeeping

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of one domain stage. Declaration order is the Router's order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Zoning,
    Valuation,
    Permit,
    Envelope,
}

impl StageId {
    pub const ALL: [StageId; 4] = [
        StageId::Zoning,
        StageId::Valuation,
        StageId::Permit,
        StageId::Envelope,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Zoning => "zoning",
            StageId::Valuation => "valuation",
            StageId::Permit => "permit",
            StageId::Envelope => "envelope",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableSale {
    pub address: String,
    pub price: f64,
    #[serde(default)]
    pub sqft: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermitEntry {
    #[serde(alias = "type")]
    pub permit_type: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(default)]
    pub code: Option<String>,
    pub description: String,
}

/// Accumulating analysis subject. Each field group is written by exactly one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub parcel_id: String,
    #[serde(default)]
    pub address: Option<String>,

    // zoning
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, f64>,
    #[serde(default)]
    pub permitted_uses: Vec<String>,

    // valuation
    #[serde(default)]
    pub arv: Option<f64>,
    #[serde(default)]
    pub assessed_value: Option<f64>,
    #[serde(default)]
    pub comparable_sales: Vec<ComparableSale>,
    #[serde(default)]
    pub max_bid: Option<f64>,

    // permit
    #[serde(default)]
    pub permit_history: Vec<PermitEntry>,
    #[serde(default)]
    pub open_violations: Vec<Violation>,
    #[serde(default)]
    pub risk_score: Option<u8>,

    // envelope
    #[serde(default)]
    pub max_buildable_area: Option<f64>,
    #[serde(default)]
    pub max_height: Option<f64>,
    #[serde(default)]
    pub envelope_generated: bool,
    #[serde(default)]
    pub avg_sun_hours: Option<f64>,
    #[serde(default)]
    pub shadow_impact: Option<String>,
}

impl PropertyRecord {
    pub fn new(parcel_id: impl Into<String>) -> Self {
        Self {
            parcel_id: parcel_id.into(),
            ..Self::default()
        }
    }
}

/// One line of the run's narration log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub name: String,
    pub content: String,
}

/// Discrete outcome of the synthesizer's decision rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Bid,
    Review,
    Skip,
    Incomplete,
}

impl Recommendation {
    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Bid => "BID",
            Recommendation::Review => "REVIEW",
            Recommendation::Skip => "SKIP",
            Recommendation::Incomplete => "INCOMPLETE",
        }
    }

    pub fn rationale(&self) -> &'static str {
        match self {
            Recommendation::Bid => "Low risk property with good fundamentals",
            Recommendation::Review => "Moderate risk, investigate further",
            Recommendation::Skip => "High risk property",
            Recommendation::Incomplete => "Insufficient data for recommendation",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Orchestration-level state for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub thread_id: String,
    pub record: PropertyRecord,
    /// Stages that succeeded, in completion order
    pub completed: Vec<StageId>,
    /// Stages that were attempted and failed
    #[serde(default)]
    pub failed: Vec<StageId>,
    pub errors: Vec<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub report: Option<String>,
    #[serde(default)]
    pub recommendation: Option<Recommendation>,
    pub started_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(parcel_id: &str, thread_id: Option<&str>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            thread_id: thread_id.unwrap_or(parcel_id).to_string(),
            record: PropertyRecord::new(parcel_id),
            completed: Vec::new(),
            failed: Vec::new(),
            errors: Vec::new(),
            messages: vec![Message {
                name: "user".to_string(),
                content: format!("Analyze property: {}", parcel_id),
            }],
            report: None,
            recommendation: None,
            started_at: Utc::now(),
        }
    }

    pub fn parcel_id(&self) -> &str {
        &self.record.parcel_id
    }

    /// Stages that no longer need to run: succeeded or already failed once.
    pub fn accounted(&self) -> Vec<StageId> {
        let mut ids: Vec<StageId> = self
            .completed
            .iter()
            .chain(self.failed.iter())
            .copied()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn mark_completed(&mut self, stage: StageId, narration: String) {
        self.failed.retain(|s| *s != stage);
        if !self.completed.contains(&stage) {
            self.completed.push(stage);
        }
        self.messages.push(Message {
            name: format!("{}_agent", stage),
            content: narration,
        });
    }

    pub fn mark_failed(&mut self, stage: StageId, note: String) {
        if !self.failed.contains(&stage) {
            self.failed.push(stage);
        }
        self.errors.push(note);
    }

    pub fn is_synthesized(&self) -> bool {
        self.report.is_some()
    }
}

/// Single path segment derived from a parcel or thread id.
///
/// Letters, digits, `-` and inner `.` pass through; every other byte becomes
/// `_XX` (hex), so distinct ids never share a stem. `None` for an empty id.
pub fn file_stem(id: &str) -> Option<String> {
    if id.is_empty() {
        return None;
    }
    let mut stem = String::with_capacity(id.len());
    for (i, byte) in id.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || byte == b'-' || (byte == b'.' && i > 0);
        if keep {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{:02X}", byte));
        }
    }
    Some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_only_sets_parcel() {
        let state = RunState::new("2512345", None);
        assert_eq!(state.thread_id, "2512345");
        assert_eq!(state.record, PropertyRecord::new("2512345"));
        assert!(state.completed.is_empty());
        assert_eq!(state.messages.len(), 1);
        assert!(!state.is_synthesized());
    }

    #[test]
    fn test_retry_success_clears_failure() {
        let mut state = RunState::new("1", None);
        state.mark_failed(StageId::Permit, "permit agent error: boom".to_string());
        state.mark_completed(StageId::Permit, "ok".to_string());
        state.mark_completed(StageId::Permit, "ok again".to_string());

        assert_eq!(state.completed, vec![StageId::Permit]);
        assert!(state.failed.is_empty());
        // the error log is append-only
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.accounted(), vec![StageId::Permit]);
    }

    #[test]
    fn test_stage_id_serde_matches_display() {
        for id in StageId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id));
        }
    }

    #[test]
    fn test_file_stem_stays_in_one_segment() {
        assert_eq!(file_stem("25-37-12-AB").as_deref(), Some("25-37-12-AB"));
        assert_eq!(
            file_stem("../../etc/passwd").as_deref(),
            Some("_2E._2F.._2Fetc_2Fpasswd")
        );
        assert_eq!(file_stem("...").as_deref(), Some("_2E.."));
        assert_eq!(file_stem(""), None);
    }

    #[test]
    fn test_distinct_ids_get_distinct_stems() {
        assert_eq!(file_stem("a/b").as_deref(), Some("a_2Fb"));
        assert_eq!(file_stem("a_b").as_deref(), Some("a_5Fb"));
        assert_ne!(file_stem("a b"), file_stem("a_20b"));
    }
}
