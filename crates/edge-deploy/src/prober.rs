//! HTTP smoke tests against deployed functions
//!
//! POSTs each function's sample payload to its deployed endpoint and
//! reports the status and body. Observational only: a non-200 response or
//! a transport failure is recorded in the result, never raised.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::manifest::FunctionSpec;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of probing a single function
#[derive(Debug)]
pub struct ProbeResult {
    /// Function name
    pub name: String,

    /// HTTP status, if a response was received
    pub status: Option<u16>,

    /// Response body, if a response was received
    pub body: Option<String>,

    /// Transport error message, if the request never completed
    pub error: Option<String>,
}

impl ProbeResult {
    /// Success means an HTTP 200 response whose body was read cleanly
    pub fn passed(&self) -> bool {
        self.status == Some(200) && self.error.is_none()
    }
}

/// Probe every function under `base_url` (e.g. `https://<id>.supabase.co/functions/v1`).
///
/// Requests run sequentially; the client is dropped when the step ends.
pub async fn probe_all(
    base_url: &str,
    anon_key: &str,
    functions: &[FunctionSpec],
) -> Result<Vec<ProbeResult>> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let mut results = Vec::with_capacity(functions.len());
    for func in functions {
        results.push(probe_one(&client, base_url, anon_key, func).await);
    }
    Ok(results)
}

async fn probe_one(
    client: &reqwest::Client,
    base_url: &str,
    anon_key: &str,
    func: &FunctionSpec,
) -> ProbeResult {
    let url = function_url(base_url, &func.name);
    tracing::info!("Testing {} at {}", func.name, url);

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", anon_key))
        .header("Content-Type", "application/json")
        .json(&func.smoke_payload)
        .send()
        .await;

    match response {
        Ok(resp) => {
            let status = resp.status().as_u16();
            match resp.text().await {
                Ok(body) => {
                    if status == 200 {
                        tracing::info!("{}: {} {}", func.name, status, body);
                    } else {
                        tracing::warn!("{}: {} {}", func.name, status, body);
                    }
                    ProbeResult {
                        name: func.name.clone(),
                        status: Some(status),
                        body: Some(body),
                        error: None,
                    }
                }
                Err(err) => {
                    tracing::warn!("{}: {} body read failed: {}", func.name, status, err);
                    ProbeResult {
                        name: func.name.clone(),
                        status: Some(status),
                        body: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        }
        Err(err) => {
            tracing::warn!("{}: request failed: {}", func.name, err);
            ProbeResult {
                name: func.name.clone(),
                status: None,
                body: None,
                error: Some(err.to_string()),
            }
        }
    }
}

/// Endpoint URL for one function
fn function_url(base_url: &str, name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), name)
}
