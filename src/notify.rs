//!
//! atelier push notifications
//! --------------------------
//! Delivery of admin-authored notifications to registered devices through an
//! FCM-style HTTP endpoint. The transport only sends; choosing targets,
//! deduplicating tokens and pruning registrations the endpoint reports
//! invalid is the caller's job (see the admin notifications handler).

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Token errors that mean the registration is permanently dead and should be
/// removed from the store.
const DEAD_TOKEN_ERRORS: [&str; 2] = ["NotRegistered", "InvalidRegistration"];

#[derive(Debug, Clone, Serialize)]
struct WireNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct WirePayload<'a> {
    registration_ids: &'a [String],
    notification: WireNotification<'a>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WireResult {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WireResponse {
    #[serde(default)]
    results: Vec<WireResult>,
}

/// Outcome of one send: per-token success/failure counts plus the tokens the
/// endpoint declared dead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushReport {
    pub success: usize,
    pub failure: usize,
    pub invalid_tokens: Vec<String>,
}

fn report_from(tokens: &[String], resp: &WireResponse) -> PushReport {
    let mut report = PushReport::default();
    for (i, token) in tokens.iter().enumerate() {
        match resp.results.get(i).and_then(|r| r.error.as_deref()) {
            None => report.success += 1,
            Some(err) => {
                report.failure += 1;
                if DEAD_TOKEN_ERRORS.contains(&err) {
                    report.invalid_tokens.push(token.clone());
                }
            }
        }
    }
    report
}

#[derive(Clone)]
pub enum PushTransport {
    /// POSTs the batch to a configured HTTP endpoint.
    Http { endpoint: String, client: reqwest::Client },
    /// No endpoint configured; sends fail with a clear error.
    Disabled,
}

impl PushTransport {
    pub fn from_endpoint(endpoint: Option<String>) -> Self {
        match endpoint.filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => PushTransport::Http { endpoint, client: reqwest::Client::new() },
            None => PushTransport::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, PushTransport::Http { .. })
    }

    /// Send one notification to a batch of device tokens.
    pub async fn send(&self, title: &str, body: &str, tokens: &[String]) -> Result<PushReport> {
        let (endpoint, client) = match self {
            PushTransport::Http { endpoint, client } => (endpoint, client),
            PushTransport::Disabled => bail!("push transport not configured"),
        };
        if tokens.is_empty() {
            return Ok(PushReport::default());
        }
        debug!(target: "atelier::notify", "sending to {} device(s)", tokens.len());
        let payload = WirePayload {
            registration_ids: tokens,
            notification: WireNotification { title, body },
        };
        let resp = client.post(endpoint).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("push endpoint returned {}", status);
        }
        let wire: WireResponse = resp.json().await.unwrap_or_default();
        let report = report_from(tokens, &wire);
        info!(
            target: "atelier::notify",
            "push send complete: success={} failure={} invalid={}",
            report.success, report.failure, report.invalid_tokens.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn report_counts_and_classifies_dead_tokens() {
        let toks = tokens(&["a", "b", "c", "d"]);
        let resp = WireResponse {
            results: vec![
                WireResult { error: None },
                WireResult { error: Some("NotRegistered".into()) },
                WireResult { error: Some("InternalServerError".into()) },
                WireResult { error: Some("InvalidRegistration".into()) },
            ],
        };
        let report = report_from(&toks, &resp);
        assert_eq!(report.success, 1);
        assert_eq!(report.failure, 3);
        assert_eq!(report.invalid_tokens, tokens(&["b", "d"]));
    }

    #[test]
    fn missing_results_count_as_success() {
        // Some endpoints return an empty body on full success.
        let toks = tokens(&["a", "b"]);
        let report = report_from(&toks, &WireResponse::default());
        assert_eq!(report.success, 2);
        assert_eq!(report.failure, 0);
    }

    #[test]
    fn disabled_transport_reports_cleanly() {
        let t = PushTransport::from_endpoint(None);
        assert!(!t.is_enabled());
        let t = PushTransport::from_endpoint(Some("  ".into()));
        assert!(!t.is_enabled());
        let t = PushTransport::from_endpoint(Some("https://push.example/send".into()));
        assert!(t.is_enabled());
    }
}
