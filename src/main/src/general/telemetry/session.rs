use std::{sync::Arc, time::Duration};

use tokio::{sync::broadcast, time::MissedTickBehavior};

use crate::{
    general::{
        m_node_registry::{NodeKind, NodeRef},
        telemetry::{
            synthetic::SyntheticSource, upstream::UpstreamSource, ResourceLookup, RuntimeEndpoint,
            SampleSink, TelemetryCaps, TelemetrySample, TelemetrySource,
        },
    },
    result::CCResultExt,
    sys::BroadcastMsg,
};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where samples come from for new sessions. Fixed at boot from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryMode {
    Synthetic,
    Upstream,
}

type SourceBuilder = Box<dyn FnOnce(NodeKind, RuntimeEndpoint) -> Box<dyn TelemetrySource> + Send>;

impl TelemetryMode {
    fn source_builder(self) -> SourceBuilder {
        match self {
            TelemetryMode::Synthetic => Box::new(|_kind, _endpoint| Box::new(SyntheticSource::new())),
            TelemetryMode::Upstream => Box::new(|kind, endpoint| {
                Box::new(UpstreamSource::new(&endpoint, TelemetryCaps::of(kind)))
            }),
        }
    }
}

/// Why a session ended. Terminal error pushes happen before the
/// corresponding variant is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    NotFound,
    CapabilityDisabled,
    Disconnected,
    Cancelled,
    Faulted,
}

/// One poll-sample-push loop bound to one client connection and one node.
///
/// Lifecycle: resolve the node once, then either push a single error
/// sample and stop, or poll every second until the client goes away or
/// the system shuts down. The sink is dropped on every exit path.
pub struct StreamSession<S: SampleSink> {
    node: NodeRef,
    lookup: Arc<dyn ResourceLookup>,
    sink: S,
    build_source: SourceBuilder,
    shutdown: broadcast::Receiver<BroadcastMsg>,
    tick: Duration,
}

impl<S: SampleSink> StreamSession<S> {
    pub fn new(
        node: NodeRef,
        lookup: Arc<dyn ResourceLookup>,
        sink: S,
        mode: TelemetryMode,
        shutdown: broadcast::Receiver<BroadcastMsg>,
    ) -> Self {
        Self {
            node,
            lookup,
            sink,
            build_source: mode.source_builder(),
            shutdown,
            tick: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_parts(
        node: NodeRef,
        lookup: Arc<dyn ResourceLookup>,
        sink: S,
        build_source: SourceBuilder,
        shutdown: broadcast::Receiver<BroadcastMsg>,
        tick: Duration,
    ) -> Self {
        Self {
            node,
            lookup,
            sink,
            build_source,
            shutdown,
            tick,
        }
    }

    pub async fn run(self) -> SessionEnd {
        let StreamSession {
            node,
            lookup,
            mut sink,
            build_source,
            mut shutdown,
            tick,
        } = self;

        let spec = match lookup.resolve(&node).await {
            Ok(spec) => spec,
            Err(err) if err.is_not_found() => {
                let reason = format!("{} by name {} doesn't exist", node.kind, node.name);
                sink.push(&TelemetrySample::error(reason)).await.todo_handle();
                return SessionEnd::NotFound;
            }
            Err(err) => {
                tracing::warn!("resolving {} failed: {:?}", node, err);
                return SessionEnd::Faulted;
            }
        };

        let endpoint = match spec.rpc_endpoint() {
            Some(endpoint) => endpoint,
            None => {
                sink.push(&TelemetrySample::error("rpc is not enabled"))
                    .await
                    .todo_handle();
                return SessionEnd::CapabilityDisabled;
            }
        };

        let mut source = build_source(spec.kind, endpoint);
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                msg = shutdown.recv() => {
                    tracing::debug!("session for {} cancelled: {:?}", node, msg);
                    return SessionEnd::Cancelled;
                }
            }
            match source.sample().await {
                Ok(sample) => {
                    if let Err(err) = sink.push(&sample).await {
                        tracing::debug!("push to client of {} failed: {:?}", node, err);
                        return SessionEnd::Disconnected;
                    }
                }
                Err(err) => {
                    // gap for the client, next tick retries
                    tracing::warn!("sampling {} failed: {:?}", node, err);
                }
            }
        }
    }
}
