use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::utils::logging::TIMING_TARGET;

/// Tracks one top-level session operation (analyze, story, studio) on the timing stream.
#[derive(Debug)]
pub struct OperationTimer {
    operation: String,
    detail_in: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl OperationTimer {
    pub fn new(operation: &str, input: Option<&str>) -> Self {
        let detail_in = input.map(|value| {
            let flattened = value.replace('\n', " ");
            if flattened.chars().count() > 300 {
                flattened.chars().take(300).collect()
            } else {
                flattened
            }
        });

        OperationTimer {
            operation: operation.to_string(),
            detail_in,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_started(&self) {
        info!(
            target: TIMING_TARGET,
            "event=operation_started operation={} started_at={} input={:?}",
            self.operation,
            self.started_at.to_rfc3339(),
            self.detail_in
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=operation_completed operation={} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.operation,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.completed {
            self.mark_status("abandoned", None);
            self.log_completed();
        }
    }
}

pub fn start_operation_timer(operation: &str, input: Option<&str>) -> OperationTimer {
    let timer = OperationTimer::new(operation, input);
    timer.log_started();
    timer
}

pub fn complete_operation_timer<T, E: Display>(timer: &mut OperationTimer, result: &Result<T, E>) {
    match result {
        Ok(_) => timer.mark_status("success", None),
        Err(err) => timer.mark_status("error", Some(err.to_string())),
    }
    timer.log_completed();
}

pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let mut status = "success";
    let result = call().await;
    if result.is_err() {
        status = "error";
    }

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn llm_timing_passes_results_through() {
        let ok: Result<u32, String> =
            log_llm_timing("gemini", "test-model", "plan_story", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = log_llm_timing("gemini", "test-model", "plan_story", None, || async {
            Err("boom".to_string())
        })
        .await;
        assert_eq!(err, Err("boom".to_string()));
    }

    #[test]
    fn operation_timer_truncates_long_input() {
        let input = "x".repeat(500);
        let timer = OperationTimer::new("story", Some(&input));
        assert_eq!(timer.detail_in.as_deref().map(|v| v.len()), Some(300));
    }

    #[test]
    fn completing_twice_logs_once() {
        let mut timer = start_operation_timer("studio", None);
        complete_operation_timer::<(), String>(&mut timer, &Err("failed".to_string()));
        assert!(timer.completed);
        assert_eq!(timer.status, "error");
        timer.log_completed();
        assert_eq!(timer.detail.as_deref(), Some("failed"));
    }
}
