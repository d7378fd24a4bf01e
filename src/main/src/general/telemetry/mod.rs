//! Live per-resource telemetry: one poll-sample-push loop per open stream.
//!
//! The engine is generic over three seams so sessions run without a live
//! cluster or node process: where specs come from ([`ResourceLookup`]),
//! where samples come from ([`TelemetrySource`]) and where they go
//! ([`SampleSink`]).

pub mod session;
pub mod synthetic;
pub mod upstream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    general::m_node_registry::{NodeKind, NodeRef, NodeSpec},
    result::CCResult,
};

/// Control-plane endpoint of a running node, captured once at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEndpoint {
    pub host: String,
    pub port: u16,
}

impl RuntimeEndpoint {
    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Per-kind capability descriptor: which two rpc methods feed the sample.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryCaps {
    pub status_method: &'static str,
    pub network_method: &'static str,
}

impl TelemetryCaps {
    pub fn of(kind: NodeKind) -> TelemetryCaps {
        match kind {
            NodeKind::Near => TelemetryCaps {
                status_method: "status",
                network_method: "network_info",
            },
            NodeKind::Filecoin => TelemetryCaps {
                status_method: "Filecoin.SyncState",
                network_method: "Filecoin.NetStat",
            },
            NodeKind::Polkadot => TelemetryCaps {
                status_method: "system_syncState",
                network_method: "system_networkState",
            },
        }
    }
}

/// One server-to-client message: a flat metric mapping or a single
/// human-readable error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetrySample {
    Error { error: String },
    Metrics(NodeMetrics),
}

impl TelemetrySample {
    pub fn error(reason: impl Into<String>) -> TelemetrySample {
        TelemetrySample::Error {
            error: reason.into(),
        }
    }
}

/// Point-in-time counters reported by a node. Fields a tick could not
/// obtain are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_peers_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_peers_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_bytes_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_bytes_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syncing: Option<bool>,
}

/// Resolves a node ref to its stored spec. Read-only; callable from many
/// sessions concurrently.
#[async_trait]
pub trait ResourceLookup: Send + Sync + 'static {
    async fn resolve(&self, node: &NodeRef) -> CCResult<NodeSpec>;
}

/// Produces one sample per poll tick. An `Err` is a transient source
/// failure: the tick is skipped, the session lives on.
#[async_trait]
pub trait TelemetrySource: Send {
    async fn sample(&mut self) -> CCResult<TelemetrySample>;
}

/// Owns the client side of the stream. A failed push means the client is
/// gone and terminates the session cleanly.
#[async_trait]
pub trait SampleSink: Send {
    async fn push(&mut self, sample: &TelemetrySample) -> CCResult<()>;
}
