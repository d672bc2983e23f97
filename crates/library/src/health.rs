//! Reachability and latency probe for the character library service.

use std::time::{Duration, Instant};

use chrono::Utc;
use nm_core::types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::config::LibraryConfig;

const HEALTH_PATH: &str = "/api/health";

/// Outcome of one health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResult {
    pub is_healthy: bool,
    pub response_time_ms: u64,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: Option<String>,
}

/// Probes `GET {base}/api/health` with its own short timeout.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(config: &LibraryConfig) -> Self {
        Self::with_client(
            reqwest::Client::new(),
            config.base_url.clone(),
            config.health_timeout,
        )
    }

    pub fn with_client(client: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Probe the service. Never fails: every problem is folded into
    /// [`HealthResult::error`] with `is_healthy = false`.
    pub async fn check(&self) -> HealthResult {
        let started = Instant::now();
        let outcome = self.probe().await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let result = HealthResult {
            is_healthy: outcome.is_ok(),
            response_time_ms,
            timestamp: Utc::now(),
            error: outcome.err(),
        };

        match &result.error {
            None => tracing::debug!(response_time_ms, "Character library healthy"),
            Some(error) => {
                tracing::warn!(response_time_ms, error = %error, "Character library unhealthy")
            }
        }
        result
    }

    async fn probe(&self) -> Result<(), String> {
        let response = self
            .client
            .get(format!("{}{HEALTH_PATH}", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("health check timed out after {}ms", self.timeout.as_millis())
                } else {
                    format!("health check request failed: {e}")
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("health endpoint returned HTTP {}", status.as_u16()));
        }

        let body: HealthBody = response
            .json()
            .await
            .map_err(|e| format!("health response is not valid JSON: {e}"))?;
        match body.status.as_deref() {
            Some("ok") => Ok(()),
            Some(other) => Err(format!("health status is '{other}'")),
            None => Err("health response carries no status".to_string()),
        }
    }
}
