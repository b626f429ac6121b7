//! Liveness verifier.
//!
//! Each URL gets a HEAD request; statuses listed in `fallback_statuses`
//! (405 and 501 by default) are reissued once as GET. Network-level failures
//! retry the whole HEAD/GET sequence under the retry policy. HTTP error
//! statuses are final and never retried.

use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::time::Duration;
use tracing::debug;

use crate::config::AppConfig;
use crate::pool::run_bounded;
use crate::retry::RetryPolicy;

/// Outcome for one URL, as written to the validation report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub url: String,
    pub status: Option<u16>,
    pub ok: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirected: Option<bool>,
    /// HEAD/GET sequences attempted
    #[serde(skip)]
    pub attempts: u32,
}

impl VerifyResult {
    fn from_probe(url: &str, probe: Probe, attempts: u32) -> Self {
        let redirected = probe.final_url != url;
        let ok = (200..300).contains(&probe.status);
        Self {
            url: url.to_string(),
            status: Some(probe.status),
            ok,
            reason: if ok {
                "ok".to_string()
            } else {
                format!("status_{}", probe.status)
            },
            final_url: Some(probe.final_url),
            redirected: Some(redirected),
            attempts,
        }
    }

    fn network_failure(url: &str, reason: String, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            status: None,
            ok: false,
            reason,
            final_url: None,
            redirected: None,
            attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Probe {
    status: u16,
    final_url: String,
}

impl From<Response> for Probe {
    fn from(response: Response) -> Self {
        // Dropping the response discards any unread body
        Self {
            status: response.status().as_u16(),
            final_url: response.url().to_string(),
        }
    }
}

/// Verifier settings
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept: String,
    pub fallback_statuses: Vec<u16>,
    pub max_redirects: usize,
    pub retry: RetryPolicy,
}

impl VerifyOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.http.timeout_ms),
            user_agent: config.http.user_agent.clone(),
            accept: config.http.accept.clone(),
            fallback_statuses: config.http.method_fallback_statuses.clone(),
            max_redirects: config.http.max_redirects,
            retry: config.retry.verify_policy(),
        }
    }
}

pub struct UrlVerifier {
    client: reqwest::Client,
    options: VerifyOptions,
}

impl UrlVerifier {
    pub fn new(options: VerifyOptions) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&options.user_agent)
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .build()?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    async fn send(&self, method: Method, url: &str) -> Result<Response, reqwest::Error> {
        self.client
            .request(method, url)
            .timeout(self.options.timeout)
            .header(reqwest::header::ACCEPT, &self.options.accept)
            .send()
            .await
    }

    /// One HEAD, plus one GET when the HEAD status asks for it.
    async fn probe(&self, url: &str) -> Result<Probe, reqwest::Error> {
        let head = self.send(Method::HEAD, url).await?;
        let status = head.status().as_u16();

        if self.options.fallback_statuses.contains(&status) {
            debug!("HEAD {} returned {}, retrying as GET", url, status);
            drop(head);
            let get = self.send(Method::GET, url).await?;
            return Ok(Probe::from(get));
        }

        Ok(Probe::from(head))
    }

    fn describe_error(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            return format!("timeout after {}ms", self.options.timeout.as_millis());
        }

        let mut root = error.to_string();
        let mut source = error.source();
        while let Some(inner) = source {
            root = inner.to_string();
            source = inner.source();
        }

        if error.is_connect() {
            format!("connection failed: {}", root)
        } else if error.is_redirect() {
            format!("redirect error: {}", root)
        } else {
            root
        }
    }

    /// Verify a single absolute URL. Never fails; failures are results.
    pub async fn verify(&self, url: &str) -> VerifyResult {
        let outcome = self
            .options
            .retry
            .run(|_| self.probe(url), |e: &reqwest::Error| !e.is_redirect() && !e.is_builder())
            .await;

        match outcome.result {
            Ok(probe) => VerifyResult::from_probe(url, probe, outcome.attempts),
            Err(e) => {
                let reason = self.describe_error(&e);
                debug!("{} unresolved after {} attempt(s): {}", url, outcome.attempts, reason);
                VerifyResult::network_failure(url, reason, outcome.attempts)
            }
        }
    }

    /// Verify `urls` with at most `concurrency` requests in flight. Results are
    /// returned in input order.
    pub async fn verify_all<P>(&self, urls: Vec<String>, concurrency: usize, on_complete: P) -> Vec<VerifyResult>
    where
        P: FnMut(usize, usize),
    {
        run_bounded(urls, concurrency, |url: String| async move { self.verify(&url).await }, on_complete).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(status: u16, final_url: &str) -> Probe {
        Probe {
            status,
            final_url: final_url.to_string(),
        }
    }

    #[test]
    fn test_classification() {
        let ok = VerifyResult::from_probe("https://x.com/a", probe(204, "https://x.com/a"), 1);
        assert!(ok.ok);
        assert_eq!(ok.reason, "ok");
        assert_eq!(ok.redirected, Some(false));

        let missing = VerifyResult::from_probe("https://x.com/a", probe(404, "https://x.com/a"), 1);
        assert!(!missing.ok);
        assert_eq!(missing.reason, "status_404");
        assert_eq!(missing.status, Some(404));
    }

    #[test]
    fn test_redirect_tracked_without_affecting_outcome() {
        let moved = VerifyResult::from_probe("https://x.com/a", probe(200, "https://x.com/b"), 1);
        assert!(moved.ok);
        assert_eq!(moved.redirected, Some(true));
        assert_eq!(moved.final_url.as_deref(), Some("https://x.com/b"));
    }

    #[test]
    fn test_report_shape() {
        let failed = VerifyResult::network_failure("https://x.com/a", "timeout after 10ms".into(), 2);
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], serde_json::Value::Null);
        assert_eq!(json["ok"], false);
        assert!(json.get("finalUrl").is_none());
        assert!(json.get("attempts").is_none());

        let moved = VerifyResult::from_probe("https://x.com/a", probe(500, "https://x.com/b"), 1);
        let json = serde_json::to_value(&moved).unwrap();
        assert_eq!(json["finalUrl"], "https://x.com/b");
        assert_eq!(json["redirected"], true);
    }
}
