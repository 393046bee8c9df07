//! Shared plumbing for perception backends served over HTTP.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sightline_core::BoundingBox;
use tracing::debug;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Box as sent by a backend: either `{xmin, ymin, xmax, ymax}` or `[xmin, ymin, xmax, ymax]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireBox {
    Named {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },
    Array([f64; 4]),
}

impl From<WireBox> for BoundingBox {
    fn from(wire: WireBox) -> Self {
        match wire {
            WireBox::Named { xmin, ymin, xmax, ymax } => BoundingBox::new(xmin, ymin, xmax, ymax),
            WireBox::Array([xmin, ymin, xmax, ymax]) => BoundingBox::new(xmin, ymin, xmax, ymax),
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client for perception backend")
}

/// POST a JSON body to an inference endpoint and decode the JSON reply.
pub(crate) async fn post_json<T: DeserializeOwned>(
    client: &Client,
    endpoint: &str,
    body: &serde_json::Value,
) -> Result<T> {
    debug!(endpoint = %endpoint, "Calling perception backend");
    let resp = client
        .post(endpoint)
        .json(body)
        .send()
        .await
        .with_context(|| format!("request to {endpoint} failed"))?;

    let status = resp.status();
    if !status.is_success() {
        bail!(
            "backend returned {}: {}",
            status,
            resp.text().await.unwrap_or_default()
        );
    }

    resp.json::<T>()
        .await
        .with_context(|| format!("unreadable response from {endpoint}"))
}
