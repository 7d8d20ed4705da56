use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use teloxide::types::Message;
use tracing::info;

use crate::utils::logging::TIMING_TARGET;

/// Brackets one forge request in the timing log: a `request_received`
/// line on creation and a `request_completed` line exactly once.
#[derive(Debug)]
pub struct RequestTimer {
    command: String,
    request_id: String,
    chat_id: Option<i64>,
    user_id: Option<i64>,
    text: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

fn truncate_chars(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

impl RequestTimer {
    pub fn new(command: &str, request_id: &str) -> Self {
        RequestTimer {
            command: command.to_string(),
            request_id: request_id.to_string(),
            chat_id: None,
            user_id: None,
            text: None,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn from_message(command: &str, request_id: &str, message: &Message) -> Self {
        let mut timer = RequestTimer::new(command, request_id);
        timer.chat_id = Some(message.chat.id.0);
        timer.user_id = message.from.as_ref().and_then(|user| i64::try_from(user.id.0).ok());
        timer.text = message
            .text()
            .or_else(|| message.caption())
            .map(|value| truncate_chars(&value.replace('\n', " "), 300));
        timer
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            "event=request_received command={} request_id={} chat_id={:?} user_id={:?} received_at={} text={:?}",
            self.command,
            self.request_id,
            self.chat_id,
            self.user_id,
            self.started_at.to_rfc3339(),
            self.text
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
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=request_completed command={} request_id={} chat_id={:?} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.command,
            self.request_id,
            self.chat_id,
            self.started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        if !self.completed {
            self.mark_status("dropped", None);
            self.log_completed();
        }
    }
}

pub fn start_request_timer(command: &str, request_id: &str, message: &Message) -> RequestTimer {
    let timer = RequestTimer::from_message(command, request_id, message);
    timer.log_received();
    timer
}

pub fn complete_request_timer(timer: &mut RequestTimer, status: &str, detail: Option<String>) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

/// Times a single outbound generation call.
pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
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

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        Utc::now().to_rfc3339(),
        started_perf.elapsed().as_secs_f64(),
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_logged_once() {
        let mut timer = RequestTimer::new("cli_forge", "req-1");
        complete_request_timer(&mut timer, "error", Some("boom".to_string()));
        assert!(timer.is_completed());
        timer.mark_status("success", None);
        timer.log_completed();
        assert!(timer.is_completed());
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("功夫大师", 2), "功夫");
    }

    #[tokio::test]
    async fn llm_timing_passes_results_through() {
        let ok: Result<u8, String> =
            log_llm_timing("fake", "model", "op", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u8, String> = log_llm_timing("fake", "model", "op", None, || async {
            Err("down".to_string())
        })
        .await;
        assert_eq!(err, Err("down".to_string()));
    }
}
