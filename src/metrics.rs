//! Pipeline metrics.
//!
//! Counters live inside the orchestrator that owns them, one set per run.

use serde::Serialize;
use tracing::info;

/// Counters for one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineMetrics {
    /// Number of completion requests sent
    llm_calls: usize,

    /// Number of completion requests that failed or returned no JSON
    llm_failures: usize,

    /// Number of re-submissions of a below-threshold subset
    retries: usize,

    /// Number of sentences accepted from model output
    accepted: usize,

    /// Number of single-sentence calls made after a batch gave up on a sentence
    individual_calls: usize,

    /// Number of sentences rebuilt by the rule-based engine
    recovered: usize,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_llm_call(&mut self) {
        self.llm_calls += 1;
    }

    pub fn record_llm_failure(&mut self) {
        self.llm_failures += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    pub fn record_accepted(&mut self, count: usize) {
        self.accepted += count;
    }

    pub fn record_individual_call(&mut self) {
        self.individual_calls += 1;
    }

    pub fn record_recovered(&mut self) {
        self.recovered += 1;
    }

    pub fn llm_calls(&self) -> usize {
        self.llm_calls
    }

    pub fn llm_failures(&self) -> usize {
        self.llm_failures
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn individual_calls(&self) -> usize {
        self.individual_calls
    }

    pub fn recovered(&self) -> usize {
        self.recovered
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let llm_success_rate = if self.llm_calls > 0 {
            (self.llm_calls.saturating_sub(self.llm_failures) as f64 / self.llm_calls as f64)
                * 100.0
        } else {
            0.0
        };

        let sentences = self.accepted + self.recovered;
        let fallback_rate = if sentences > 0 {
            (self.recovered as f64 / sentences as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            llm_calls: self.llm_calls,
            llm_failures: self.llm_failures,
            llm_success_rate,
            retries: self.retries,
            accepted: self.accepted,
            individual_calls: self.individual_calls,
            recovered: self.recovered,
            fallback_rate,
        }
    }

    /// Log the report at info level.
    pub fn log_report(&self) {
        let report = self.report();
        info!(
            "Pipeline metrics: {} LLM calls ({:.1}% ok), {} retries, {} individual calls, {} accepted, {} recovered ({:.1}% fallback)",
            report.llm_calls,
            report.llm_success_rate,
            report.retries,
            report.individual_calls,
            report.accepted,
            report.recovered,
            report.fallback_rate
        );
    }
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub llm_calls: usize,
    pub llm_failures: usize,

    /// Successful calls as a percentage (0-100)
    pub llm_success_rate: f64,

    pub retries: usize,
    pub accepted: usize,
    pub individual_calls: usize,
    pub recovered: usize,

    /// Share of delivered sentences that came from the rule-based engine (0-100)
    pub fallback_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = PipelineMetrics::new();
        let report = metrics.report();
        assert_eq!(report.llm_calls, 0);
        assert_eq!(report.llm_success_rate, 0.0);
        assert_eq!(report.fallback_rate, 0.0);
    }

    #[test]
    fn test_counters() {
        let mut metrics = PipelineMetrics::new();
        metrics.record_llm_call();
        metrics.record_llm_call();
        metrics.record_llm_failure();
        metrics.record_retry();
        metrics.record_accepted(7);
        metrics.record_individual_call();
        metrics.record_recovered();

        assert_eq!(metrics.llm_calls(), 2);
        assert_eq!(metrics.llm_failures(), 1);
        assert_eq!(metrics.retries(), 1);
        assert_eq!(metrics.accepted(), 7);
        assert_eq!(metrics.individual_calls(), 1);
        assert_eq!(metrics.recovered(), 1);
    }

    #[test]
    fn test_report_rates() {
        let mut metrics = PipelineMetrics::new();
        for _ in 0..4 {
            metrics.record_llm_call();
        }
        metrics.record_llm_failure();
        metrics.record_accepted(3);
        metrics.record_recovered();

        let report = metrics.report();
        assert_eq!(report.llm_success_rate, 75.0);
        assert_eq!(report.fallback_rate, 25.0);
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(PipelineMetrics::new().report()).unwrap();
        assert_eq!(json["llm_calls"], 0);
        assert!(json.get("fallback_rate").is_some());
    }
}
