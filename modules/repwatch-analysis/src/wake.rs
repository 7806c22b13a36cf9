// Fire-and-forget self-trigger. After a completion pass the pipeline pokes
// its own analysis endpoint so scale-to-zero deployments pick up follow-on
// work. The poke carries no payload and its outcome is irrelevant: a
// timeout means the target instance is already spinning up.

use std::time::Duration;

use tracing::debug;

const WAKE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct WakeClient {
    http: reqwest::Client,
}

impl WakeClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(WAKE_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Poke a URL and ignore the result. All failures are swallowed; this
    /// must never propagate an error into the completion path.
    pub async fn wake(&self, url: &str) {
        match self.http.get(url).send().await {
            Ok(response) => debug!(url, status = %response.status(), "Wake poke delivered"),
            Err(e) => debug!(url, error = %e, "Wake poke dropped"),
        }
    }
}

impl Default for WakeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Analysis endpoint for a thread: the synchronous path or the batch path.
pub fn analysis_url(base: &str, thread_id: i64, nlp: bool) -> String {
    if nlp {
        format!("{base}/nlp-analysis/{thread_id}")
    } else {
        format!("{base}/analysis/{thread_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_both_endpoint_flavors() {
        assert_eq!(
            analysis_url("http://svc.test", 7, true),
            "http://svc.test/nlp-analysis/7"
        );
        assert_eq!(
            analysis_url("http://svc.test", 7, false),
            "http://svc.test/analysis/7"
        );
    }

    #[tokio::test]
    async fn wake_swallows_connection_errors() {
        // Nothing listens here; the call must still return cleanly.
        let client = WakeClient::new();
        client.wake("http://127.0.0.1:1/analysis/7").await;
    }
}
