//! Structured audit/trace events
//!
//! The orchestrator and the skill cache report stage boundaries and document
//! loads through an injected [`TraceSink`]. Sinks must not fail or block the
//! caller; recording is fire-and-forget.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    CatalogLoad,
    CapabilityLoad,
    ReferenceLoad,
    StageStart,
    StageEnd,
    Synthesis,
}

impl std::fmt::Display for TraceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TraceKind::CatalogLoad => "catalog.load",
            TraceKind::CapabilityLoad => "skill.load",
            TraceKind::ReferenceLoad => "reference.load",
            TraceKind::StageStart => "stage.start",
            TraceKind::StageEnd => "stage.end",
            TraceKind::Synthesis => "synthesis",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub kind: TraceKind,
    pub name: String,
    pub duration: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Catalog token estimate of a loaded skill document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
    pub at: DateTime<Utc>,
}

impl TraceEvent {
    pub fn ok(kind: TraceKind, name: impl Into<String>, duration: Duration) -> Self {
        Self {
            kind,
            name: name.into(),
            duration,
            success: true,
            error: None,
            tokens: None,
            at: Utc::now(),
        }
    }

    pub fn with_tokens(mut self, tokens: Option<u32>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn failed(
        kind: TraceKind,
        name: impl Into<String>,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::ok(kind, name, duration)
        }
    }
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: TraceEvent);
}

/// Default sink: drops everything.
#[derive(Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn record(&self, _event: TraceEvent) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&self, event: TraceEvent) {
        match &event.error {
            None => debug!("[{}] {} ({:?})", event.kind, event.name, event.duration),
            Some(error) => warn!(
                "[{}] {} failed after {:?}: {}",
                event.kind, event.name, event.duration, error
            ),
        }
    }
}

pub struct FanoutSink {
    sinks: Vec<Arc<dyn TraceSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TraceSink>>) -> Self {
        Self { sinks }
    }
}

impl TraceSink for FanoutSink {
    fn record(&self, event: TraceEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NameStats {
    pub loads: usize,
    pub errors: usize,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSummary {
    pub total_loads: usize,
    pub total_errors: usize,
    /// Sum of the token estimates of every document loaded
    pub total_tokens: u64,
    pub names_used: Vec<String>,
    pub most_used: Option<String>,
    pub per_name: BTreeMap<String, NameStats>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    durations: BTreeMap<String, Vec<f64>>,
    errors: BTreeMap<String, usize>,
    tokens: u64,
}

/// Aggregates document-load events per name. One instance per process,
/// shared by reference.
#[derive(Debug, Default)]
pub struct MetricsSink {
    inner: Mutex<MetricsInner>,
}

impl MetricsSink {
    pub fn stats(&self, name: &str) -> NameStats {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        name_stats(&inner, name)
    }

    pub fn summary(&self) -> MetricsSummary {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // ties resolve to the alphabetically first name
        let most_used = inner
            .durations
            .iter()
            .filter(|(_, d)| !d.is_empty())
            .max_by(|a, b| a.1.len().cmp(&b.1.len()).then(b.0.cmp(a.0)))
            .map(|(name, _)| name.clone());

        let per_name = inner
            .durations
            .keys()
            .chain(inner.errors.keys())
            .map(|name| (name.clone(), name_stats(&inner, name)))
            .collect();

        MetricsSummary {
            total_loads: inner.durations.values().map(Vec::len).sum(),
            total_errors: inner.errors.values().sum(),
            total_tokens: inner.tokens,
            names_used: inner.durations.keys().cloned().collect(),
            most_used,
            per_name,
        }
    }
}

fn name_stats(inner: &MetricsInner, name: &str) -> NameStats {
    let durations = inner.durations.get(name).map(Vec::as_slice).unwrap_or(&[]);
    let errors = inner.errors.get(name).copied().unwrap_or(0);
    if durations.is_empty() {
        return NameStats {
            errors,
            ..NameStats::default()
        };
    }
    NameStats {
        loads: durations.len(),
        errors,
        avg_duration_ms: durations.iter().sum::<f64>() / durations.len() as f64,
        min_duration_ms: durations.iter().copied().fold(f64::INFINITY, f64::min),
        max_duration_ms: durations.iter().copied().fold(0.0, f64::max),
    }
}

impl TraceSink for MetricsSink {
    fn record(&self, event: TraceEvent) {
        if !matches!(
            event.kind,
            TraceKind::CapabilityLoad | TraceKind::ReferenceLoad
        ) {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if event.success {
            inner.tokens += u64::from(event.tokens.unwrap_or(0));
            inner
                .durations
                .entry(event.name)
                .or_default()
                .push(event.duration.as_secs_f64() * 1000.0);
        } else {
            *inner.errors.entry(event.name).or_default() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_aggregates_per_name() {
        let sink = MetricsSink::default();
        sink.record(
            TraceEvent::ok(
                TraceKind::CapabilityLoad,
                "zoning-analysis",
                Duration::from_millis(10),
            )
            .with_tokens(Some(1200)),
        );
        sink.record(
            TraceEvent::ok(
                TraceKind::CapabilityLoad,
                "zoning-analysis",
                Duration::from_millis(30),
            )
            .with_tokens(Some(1200)),
        );
        sink.record(TraceEvent::failed(
            TraceKind::CapabilityLoad,
            "zoning-analysis",
            Duration::from_millis(1),
            "missing",
        ));
        sink.record(TraceEvent::ok(
            TraceKind::ReferenceLoad,
            "zoning-analysis/malabar.md",
            Duration::from_millis(5),
        ));

        let stats = sink.stats("zoning-analysis");
        assert_eq!(stats.loads, 2);
        assert_eq!(stats.errors, 1);
        assert!((stats.avg_duration_ms - 20.0).abs() < 1e-6);
        assert!((stats.min_duration_ms - 10.0).abs() < 1e-6);
        assert!((stats.max_duration_ms - 30.0).abs() < 1e-6);

        let summary = sink.summary();
        assert_eq!(summary.total_loads, 3);
        assert_eq!(summary.total_errors, 1);
        // references carry no estimate
        assert_eq!(summary.total_tokens, 2400);
        assert_eq!(summary.most_used.as_deref(), Some("zoning-analysis"));
        assert_eq!(summary.per_name.len(), 2);
        assert_eq!(summary.per_name["zoning-analysis"], stats);
    }

    #[test]
    fn test_metrics_ignores_stage_events() {
        let sink = MetricsSink::default();
        sink.record(TraceEvent::ok(
            TraceKind::StageEnd,
            "zoning",
            Duration::from_millis(10),
        ));
        assert_eq!(sink.summary().total_loads, 0);
        assert_eq!(sink.stats("zoning"), NameStats::default());
    }

    #[test]
    fn test_fanout_forwards_to_every_sink() {
        let a = Arc::new(MetricsSink::default());
        let b = Arc::new(MetricsSink::default());
        let fanout = FanoutSink::new(vec![a.clone(), b.clone(), Arc::new(NoopSink)]);
        fanout.record(TraceEvent::ok(
            TraceKind::CapabilityLoad,
            "permit-lookup",
            Duration::from_millis(2),
        ));
        assert_eq!(a.stats("permit-lookup").loads, 1);
        assert_eq!(b.stats("permit-lookup").loads, 1);
    }
}
