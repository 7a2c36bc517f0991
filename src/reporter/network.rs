//! Last network activity seen during the run

use std::sync::{Arc, Mutex};

use colored::Colorize;

use crate::common::{format_duration, format_size};
use crate::host::NetworkExchange;

/// The most recent request outcome
#[derive(Debug, Clone)]
pub enum NetworkRecord {
    /// The request failed before a response arrived
    Failed(String),
    Exchange(NetworkExchange),
}

/// Holds the latest network record; cleared when the run ends
#[derive(Debug, Clone, Default)]
pub struct NetworkLog {
    latest: Arc<Mutex<Option<NetworkRecord>>>,
}

impl NetworkLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the outcome of a request event
    pub fn record(&self, error: Option<&str>, exchange: Option<&NetworkExchange>) {
        let record = match (error, exchange) {
            (Some(e), _) => NetworkRecord::Failed(e.to_string()),
            (None, Some(exchange)) => NetworkRecord::Exchange(exchange.clone()),
            (None, None) => return,
        };
        *self.lock() = Some(record);
    }

    pub fn latest(&self) -> Option<NetworkRecord> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<NetworkRecord>> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Render a network exchange for the terminal
pub fn render_exchange(exchange: &NetworkExchange) -> String {
    let sep = "★".dimmed();
    let req = &exchange.request;
    let mut out = format!("{} {}\n", req.method, req.url);

    let Some(res) = &exchange.response else {
        out.push_str(&format!("{}\n", "No response received".dimmed()));
        return out;
    };

    out.push_str(&format!(
        "{} {} {} {} {} {} {}{} {}{} {} {} {}{} {}{} {} {} {} {}\n\n",
        res.code,
        res.reason,
        sep,
        format_duration(res.response_time_ms),
        "time".dimmed(),
        sep,
        format_size(req.size),
        "↑".dimmed(),
        format_size(res.size()),
        "↓".dimmed(),
        "size".dimmed(),
        sep,
        req.headers.len(),
        "↑".dimmed(),
        res.headers.len(),
        "↓".dimmed(),
        "headers".dimmed(),
        sep,
        res.cookies,
        "cookies".dimmed(),
    ));

    if let Some(content_type) = &res.content_type {
        out.push_str(&format!("{}\n", content_type));
    }
    out.push_str(&format!("{}\n", res.body.dimmed()));
    out
}

/// Render whatever the log currently holds
pub fn render_latest(log: &NetworkLog) -> String {
    match log.latest() {
        None => "No last recorded network activity\n".to_string(),
        Some(NetworkRecord::Failed(e)) => format!("{} {}\n", "Request failed:".red(), e),
        Some(NetworkRecord::Exchange(exchange)) => render_exchange(&exchange),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{RequestInfo, ResponseInfo};

    fn exchange() -> NetworkExchange {
        NetworkExchange {
            request: RequestInfo {
                method: "GET".to_string(),
                url: "https://example.test/profile".to_string(),
                headers: vec![("Accept".to_string(), "*/*".to_string())],
                size: 120,
            },
            response: Some(ResponseInfo {
                code: 200,
                reason: "OK".to_string(),
                body: "{\"name\":\"ada\"}".to_string(),
                response_time_ms: 12.0,
                ..ResponseInfo::default()
            }),
        }
    }

    #[test]
    fn test_record_and_clear() {
        let log = NetworkLog::new();
        assert!(render_latest(&log).contains("No last recorded network activity"));

        log.record(None, Some(&exchange()));
        let text = render_latest(&log);
        assert!(text.starts_with("GET https://example.test/profile"));
        assert!(text.contains("200 OK"));
        assert!(text.contains("12ms"));

        log.clear();
        assert!(log.latest().is_none());
    }

    #[test]
    fn test_error_wins_over_exchange() {
        let log = NetworkLog::new();
        log.record(Some("ECONNREFUSED"), Some(&exchange()));
        assert!(matches!(log.latest(), Some(NetworkRecord::Failed(e)) if e == "ECONNREFUSED"));
    }

    #[test]
    fn test_empty_event_keeps_previous_record() {
        let log = NetworkLog::new();
        log.record(None, Some(&exchange()));
        log.record(None, None);
        assert!(matches!(log.latest(), Some(NetworkRecord::Exchange(_))));
    }
}
