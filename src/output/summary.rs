use crate::config::RunMode;
use crate::record::{Recommendation, StageId};
use crate::runner::RunReport;
use crate::skills::LoadKind;
use crate::telemetry::MetricsSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    Failed,
    NotRun,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Completed => write!(f, "✅ completed"),
            StageStatus::Failed => write!(f, "❌ failed"),
            StageStatus::NotRun => write!(f, "⏭️ not run"),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct CacheSummary {
    pub hits: usize,
    pub misses: usize,
    /// Distinct documents in first-load order; references as `skill/reference`
    pub loaded: Vec<String>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub parcel_id: String,
    pub thread_id: String,
    pub mode: RunMode,
    pub resumed: bool,
    pub duration_sec: f64,
    pub stages: Vec<(StageId, StageStatus)>,
    pub recommendation: Option<Recommendation>,
    pub errors: Vec<String>,
    pub cache: CacheSummary,
    pub metrics: Option<MetricsSummary>,
}

pub fn build_summary(report: &RunReport, metrics: Option<MetricsSummary>) -> RunSummary {
    let state = &report.state;
    let stages = StageId::ALL
        .iter()
        .map(|id| {
            let status = if state.completed.contains(id) {
                StageStatus::Completed
            } else if state.failed.contains(id) {
                StageStatus::Failed
            } else {
                StageStatus::NotRun
            };
            (*id, status)
        })
        .collect();

    let mut cache = CacheSummary::default();
    for load in &report.skill_loads {
        if load.cache_hit {
            cache.hits += 1;
        } else {
            cache.misses += 1;
        }
        let name = match (&load.kind, &load.reference) {
            (LoadKind::Reference, Some(reference)) => format!("{}/{}", load.capability, reference),
            _ => load.capability.clone(),
        };
        if !cache.loaded.contains(&name) {
            cache.loaded.push(name);
        }
    }

    RunSummary {
        parcel_id: state.parcel_id().to_string(),
        thread_id: state.thread_id.clone(),
        mode: report.mode,
        resumed: report.resumed,
        duration_sec: report.total_duration.as_secs_f64(),
        stages,
        recommendation: state.recommendation,
        errors: state.errors.clone(),
        cache,
        metrics,
    }
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== ZoneWise Run Summary ===\n");
    out.push_str(&format!("Parcel: {}\n", summary.parcel_id));
    if summary.thread_id != summary.parcel_id {
        out.push_str(&format!("Thread: {}\n", summary.thread_id));
    }
    out.push_str(&format!(
        "Mode: {}{}\n",
        summary.mode,
        if summary.resumed { " (resumed)" } else { "" }
    ));
    out.push_str(&format!("Duration: {:.1}s\n", summary.duration_sec));

    out.push_str("\nStages:\n");
    for (id, status) in &summary.stages {
        out.push_str(&format!("  {:<10} {}\n", id.as_str(), status));
    }

    out.push_str(&format!(
        "\nRecommendation: {}\n",
        summary.recommendation.map(|r| r.label()).unwrap_or("none")
    ));

    if !summary.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for error in &summary.errors {
            out.push_str(&format!("  - {}\n", error));
        }
    }

    out.push_str(&format!(
        "\nSkill cache: {} misses, {} hits\n",
        summary.cache.misses, summary.cache.hits
    ));
    if !summary.cache.loaded.is_empty() {
        out.push_str(&format!("  loaded: {}\n", summary.cache.loaded.join(", ")));
    }

    if let Some(metrics) = &summary.metrics {
        out.push_str("\nSkill metrics:\n");
        out.push_str(&format!("  total loads: {}\n", metrics.total_loads));
        out.push_str(&format!("  total errors: {}\n", metrics.total_errors));
        out.push_str(&format!("  estimated tokens: {}\n", metrics.total_tokens));
        if let Some(most_used) = &metrics.most_used {
            out.push_str(&format!("  most used: {}\n", most_used));
        }
        for (name, stats) in &metrics.per_name {
            out.push_str(&format!(
                "  {:<40} {} loads, {} errors, avg {:.1}ms (min {:.1}, max {:.1})\n",
                name,
                stats.loads,
                stats.errors,
                stats.avg_duration_ms,
                stats.min_duration_ms,
                stats.max_duration_ms
            ));
        }
    }

    out
}
