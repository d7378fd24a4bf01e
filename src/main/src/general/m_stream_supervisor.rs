use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

use crate::{
    general::{
        m_node_registry::{NodeRef, NodeRegistryView},
        telemetry::{
            session::{StreamSession, TelemetryMode},
            ResourceLookup, SampleSink, TelemetrySample,
        },
    },
    logical_module_view_impl,
    result::{CCResult, CcStreamErr},
    sys::{BroadcastSender, LogicalModule, LogicalModuleNewArgs, LogicalModulesRef},
    util::JoinHandleWrapper,
};
use cc_derive::LogicalModule;
use std::sync::Arc;

logical_module_view_impl!(StreamSupervisorView);

/// Spawns and tracks one [`StreamSession`] task per open stats websocket.
/// Sessions end on their own; shutdown is broadcast through the system
/// channel every session subscribes to.
#[derive(LogicalModule)]
pub struct StreamSupervisor {
    view: StreamSupervisorView,
    mode: TelemetryMode,
    btx: BroadcastSender,
}

#[async_trait]
impl LogicalModule for StreamSupervisor {
    fn inner_new(args: LogicalModuleNewArgs) -> Self
    where
        Self: Sized,
    {
        let mode = if args.config.mock {
            TelemetryMode::Synthetic
        } else {
            TelemetryMode::Upstream
        };
        Self {
            view: StreamSupervisorView::new(args.logical_modules_ref.clone()),
            mode,
            btx: args.btx.clone(),
        }
    }
    async fn start(&self) -> CCResult<Vec<JoinHandleWrapper>> {
        tracing::info!("stream supervisor in {:?} mode", self.mode);
        Ok(vec![])
    }
}

impl StreamSupervisor {
    /// Takes ownership of an upgraded websocket and drives its session to
    /// completion in a dedicated task.
    pub fn serve_stats(&self, node: NodeRef, socket: WebSocket) {
        let lookup: Arc<dyn ResourceLookup> =
            Arc::new(NodeRegistryView::new(self.view.copy_module_ref()));
        let session = StreamSession::new(
            node.clone(),
            lookup,
            WsSink(socket),
            self.mode,
            self.btx.subscribe(),
        );
        let _ = tokio::spawn(async move {
            let end = session.run().await;
            tracing::debug!("stream session for {} closed: {:?}", node, end);
        });
    }
}

/// Client side of one stream. Dropping it closes the websocket.
struct WsSink(WebSocket);

#[async_trait]
impl SampleSink for WsSink {
    async fn push(&mut self, sample: &TelemetrySample) -> CCResult<()> {
        let text = serde_json::to_string(sample)?;
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|_gone| CcStreamErr::ClientDisconnected.into())
    }
}
