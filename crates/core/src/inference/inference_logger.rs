use std::collections::HashMap;
use std::time::Instant;

use crate::inference::status::InferenceStatus;

/// Observer for inference job events.
///
/// Runs on the inference worker thread. Keeps scheduling code free of any
/// particular output mechanism.
pub trait InferenceLogger: Send {
    /// Record how long a named job stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record the terminal status a job published.
    fn outcome(&mut self, status: &InferenceStatus);

    /// Log a human-readable message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullInferenceLogger;

impl InferenceLogger for NullInferenceLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn outcome(&mut self, _status: &InferenceStatus) {}
    fn info(&mut self, _message: &str) {}
}

/// Collects per-stage timings and outcome counts and reports them through
/// the `log` crate.
pub struct StatsInferenceLogger {
    timings: HashMap<String, Vec<f64>>,
    outcomes: HashMap<&'static str, usize>,
    start_time: Instant,
}

impl StatsInferenceLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            outcomes: HashMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Number of completed jobs across all outcomes.
    pub fn jobs(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn outcome_count(&self, kind: &str) -> usize {
        self.outcomes.get(kind).copied().unwrap_or(0)
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    /// Returns the formatted summary, or `None` if no job completed.
    pub fn summary_string(&self) -> Option<String> {
        let jobs = self.jobs();
        if jobs == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Inference summary ({jobs} jobs, {elapsed_s:.1}s session):"
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let avg = durations.iter().sum::<f64>() / durations.len().max(1) as f64;
            let max = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!("  {stage:10}: avg {avg:6.1}ms  max {max:6.1}ms"));
        }

        let mut kinds: Vec<_> = self.outcomes.iter().collect();
        kinds.sort();
        let counts: Vec<String> = kinds.iter().map(|(k, n)| format!("{k}={n}")).collect();
        lines.push(format!("  outcomes: {}", counts.join(" ")));

        if elapsed_s > 0.0 {
            lines.push(format!("  Rate: {:.2} verdicts/s", jobs as f64 / elapsed_s));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StatsInferenceLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable short name for an outcome, used as a counter key.
pub fn outcome_kind(status: &InferenceStatus) -> &'static str {
    match status {
        InferenceStatus::Pending => "pending",
        InferenceStatus::NoFace => "no_face",
        InferenceStatus::Verdict(r) => match r.label {
            crate::inference::verdict::Label::Real => "real",
            crate::inference::verdict::Label::Fake => "fake",
        },
        InferenceStatus::Error(_) => "error",
    }
}

impl InferenceLogger for StatsInferenceLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn outcome(&mut self, status: &InferenceStatus) {
        *self.outcomes.entry(outcome_kind(status)).or_default() += 1;
        log::debug!("Inference outcome: {status}");
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
