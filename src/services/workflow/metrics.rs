use metrics::{counter, histogram};
use std::time::Duration;

use super::state::Feature;

/// Records a finished workflow run
pub fn track_run(feature: Feature, outcome: &'static str, duration: Duration) {
    counter!(
        "workflow_runs_total",
        "feature" => feature.as_str(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!("workflow_duration_seconds", "feature" => feature.as_str())
        .record(duration.as_secs_f64());
}

pub fn track_step(feature: Feature, step: &'static str, outcome: &'static str) {
    counter!(
        "workflow_steps_total",
        "feature" => feature.as_str(),
        "step" => step,
        "outcome" => outcome
    )
    .increment(1);
}

/// Rebuild after an expired blockhash
pub fn track_retry(feature: Feature) {
    counter!("workflow_retries_total", "feature" => feature.as_str()).increment(1);
}

pub fn track_rejected_busy(feature: Feature) {
    counter!("workflow_busy_rejections_total", "feature" => feature.as_str()).increment(1);
}
