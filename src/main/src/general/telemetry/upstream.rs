use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{
    general::telemetry::{
        NodeMetrics, RuntimeEndpoint, TelemetryCaps, TelemetrySample, TelemetrySource,
    },
    result::{CCResult, CcRpcErr},
};

// stay well under the 1s tick; the next tick is the retry
const CALL_TIMEOUT: Duration = Duration::from_millis(800);

/// Polls the node's own control endpoint: one status call and one
/// network-info call per tick, each independently fallible.
pub struct UpstreamSource {
    client: reqwest::Client,
    url: String,
    caps: TelemetryCaps,
}

impl UpstreamSource {
    pub fn new(endpoint: &RuntimeEndpoint, caps: TelemetryCaps) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(CALL_TIMEOUT)
                .build()
                .unwrap_or_default(),
            url: endpoint.http_url(),
            caps,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str) -> CCResult<T> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [],
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(CcRpcErr::Http)?;
        let envelope: RpcEnvelope<T> = resp.json().await.map_err(CcRpcErr::Http)?;
        if let Some(err) = envelope.error {
            return Err(CcRpcErr::ErrorResponse {
                method: method.to_owned(),
                message: err.message,
            }
            .into());
        }
        envelope.result.ok_or_else(|| {
            CcRpcErr::Malformed {
                method: method.to_owned(),
                context: "response carries neither result nor error".to_owned(),
            }
            .into()
        })
    }
}

#[async_trait]
impl TelemetrySource for UpstreamSource {
    async fn sample(&mut self) -> CCResult<TelemetrySample> {
        let (status, network) = tokio::join!(
            self.call::<StatusResult>(self.caps.status_method),
            self.call::<NetworkInfoResult>(self.caps.network_method),
        );

        let mut metrics = NodeMetrics::default();
        let mut first_err = None;

        match status {
            Ok(status) => {
                metrics.latest_block_height = Some(status.sync_info.latest_block_height);
                metrics.earliest_block_height = Some(status.sync_info.earliest_block_height);
                metrics.syncing = Some(status.sync_info.syncing);
            }
            Err(err) => {
                tracing::warn!(
                    "{} call to {} failed: {:?}",
                    self.caps.status_method,
                    self.url,
                    err
                );
                first_err = Some(err);
            }
        }

        match network {
            Ok(network) => {
                metrics.active_peers_count = Some(network.num_active_peers);
                metrics.max_peers_count = Some(network.peer_max_count);
                metrics.sent_bytes_per_second = Some(network.sent_bytes_per_sec);
                metrics.received_bytes_per_second = Some(network.received_bytes_per_sec);
            }
            Err(err) => {
                tracing::warn!(
                    "{} call to {} failed: {:?}",
                    self.caps.network_method,
                    self.url,
                    err
                );
                if metrics == NodeMetrics::default() {
                    // both calls failed: transient source failure, skip the tick
                    return Err(first_err.unwrap_or(err));
                }
            }
        }

        Ok(TelemetrySample::Metrics(metrics))
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResult {
    #[serde(default)]
    sync_info: SyncInfo,
}

#[derive(Debug, Default, Deserialize)]
struct SyncInfo {
    #[serde(default)]
    latest_block_height: u64,
    #[serde(default)]
    earliest_block_height: u64,
    #[serde(default)]
    syncing: bool,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkInfoResult {
    #[serde(default)]
    num_active_peers: u64,
    #[serde(default)]
    peer_max_count: u64,
    #[serde(default)]
    sent_bytes_per_sec: u64,
    #[serde(default)]
    received_bytes_per_sec: u64,
}
