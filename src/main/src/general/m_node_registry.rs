use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    general::{
        m_kv_store_engine::{KeyTypeNodeList, KeyTypeNodeSpec, KvStoreEngine},
        telemetry::{ResourceLookup, RuntimeEndpoint},
    },
    logical_module_view_impl,
    result::{CCResult, CcStoreErr},
    sys::{LogicalModule, LogicalModuleNewArgs, LogicalModulesRef},
    util::JoinHandleWrapper,
};
use cc_derive::LogicalModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Near,
    Filecoin,
    Polkadot,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Near => "near",
            NodeKind::Filecoin => "filecoin",
            NodeKind::Polkadot => "polkadot",
        }
    }
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            NodeKind::Near => 3030,
            NodeKind::Filecoin => 1234,
            NodeKind::Polkadot => 9933,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "near" => Ok(NodeKind::Near),
            "filecoin" => Ok(NodeKind::Filecoin),
            "polkadot" => Ok(NodeKind::Polkadot),
            _ => Err(()),
        }
    }
}

/// Identity of a managed node resource. Immutable once a stream session starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub name: String,
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: NodeKind,
    pub name: String,
    pub network: String,
    pub archive: bool,
    pub rpc: bool,
    /// rpc host override; the resource name doubles as the service dns name
    pub rpc_host: Option<String>,
    pub rpc_port: u16,
    pub storage_class: Option<String>,
    pub created_at: u64,
}

impl NodeSpec {
    /// Only resolvable when the rpc capability is enabled on the resource.
    pub fn rpc_endpoint(&self) -> Option<RuntimeEndpoint> {
        if !self.rpc {
            return None;
        }
        Some(RuntimeEndpoint {
            host: self
                .rpc_host
                .clone()
                .unwrap_or_else(|| self.name.clone()),
            port: self.rpc_port,
        })
    }
}

/// Set-if-present update; absent fields keep the stored value.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NodePatch {
    pub network: Option<String>,
    pub archive: Option<bool>,
    pub rpc: Option<bool>,
    pub rpc_host: Option<String>,
    pub rpc_port: Option<u16>,
    pub storage_class: Option<String>,
}

logical_module_view_impl!(NodeRegistryView);
logical_module_view_impl!(NodeRegistryView, kv_store_engine, KvStoreEngine);
logical_module_view_impl!(NodeRegistryView, node_registry, NodeRegistry);

#[derive(LogicalModule)]
pub struct NodeRegistry {
    view: NodeRegistryView,
    // serializes create/update/delete; reads go straight to the engine
    write_lock: Mutex<()>,
}

#[async_trait]
impl LogicalModule for NodeRegistry {
    fn inner_new(args: LogicalModuleNewArgs) -> Self
    where
        Self: Sized,
    {
        Self {
            view: NodeRegistryView::new(args.logical_modules_ref.clone()),
            write_lock: Mutex::new(()),
        }
    }
    async fn start(&self) -> CCResult<Vec<JoinHandleWrapper>> {
        Ok(vec![])
    }
}

impl NodeRegistry {
    pub fn create(&self, spec: NodeSpec) -> CCResult<NodeSpec> {
        let engine = self.view.kv_store_engine();
        let _hold = self.write_lock.lock();
        let key = KeyTypeNodeSpec {
            kind: spec.kind,
            name: &spec.name,
        };
        if engine.get(key)?.is_some() {
            return Err(CcStoreErr::AlreadyExists {
                kind: spec.kind,
                name: spec.name.clone(),
            }
            .into());
        }
        engine.set(
            KeyTypeNodeSpec {
                kind: spec.kind,
                name: &spec.name,
            },
            &spec,
        )?;
        let mut names = engine.get(KeyTypeNodeList(spec.kind))?.unwrap_or_default();
        names.push(spec.name.clone());
        engine.set(KeyTypeNodeList(spec.kind), &names)?;
        engine.flush();
        Ok(spec)
    }

    pub fn get(&self, node: &NodeRef) -> CCResult<NodeSpec> {
        let engine = self.view.kv_store_engine();
        engine
            .get(KeyTypeNodeSpec {
                kind: node.kind,
                name: &node.name,
            })?
            .ok_or_else(|| {
                CcStoreErr::NotFound {
                    kind: node.kind,
                    name: node.name.clone(),
                }
                .into()
            })
    }

    pub fn update(&self, node: &NodeRef, patch: NodePatch) -> CCResult<NodeSpec> {
        let engine = self.view.kv_store_engine();
        let _hold = self.write_lock.lock();
        let mut spec = self.get(node)?;
        if let Some(network) = patch.network {
            spec.network = network;
        }
        if let Some(archive) = patch.archive {
            spec.archive = archive;
        }
        if let Some(rpc) = patch.rpc {
            spec.rpc = rpc;
        }
        if let Some(rpc_host) = patch.rpc_host {
            spec.rpc_host = Some(rpc_host);
        }
        if let Some(rpc_port) = patch.rpc_port {
            spec.rpc_port = rpc_port;
        }
        if let Some(storage_class) = patch.storage_class {
            spec.storage_class = Some(storage_class);
        }
        engine.set(
            KeyTypeNodeSpec {
                kind: node.kind,
                name: &node.name,
            },
            &spec,
        )?;
        engine.flush();
        Ok(spec)
    }

    pub fn delete(&self, node: &NodeRef) -> CCResult<()> {
        let engine = self.view.kv_store_engine();
        let _hold = self.write_lock.lock();
        let removed = engine.del(KeyTypeNodeSpec {
            kind: node.kind,
            name: &node.name,
        })?;
        if !removed {
            return Err(CcStoreErr::NotFound {
                kind: node.kind,
                name: node.name.clone(),
            }
            .into());
        }
        let mut names = engine.get(KeyTypeNodeList(node.kind))?.unwrap_or_default();
        names.retain(|n| n != &node.name);
        engine.set(KeyTypeNodeList(node.kind), &names)?;
        engine.flush();
        Ok(())
    }

    pub fn list(&self, kind: NodeKind) -> CCResult<Vec<NodeSpec>> {
        let engine = self.view.kv_store_engine();
        let names = engine.get(KeyTypeNodeList(kind))?.unwrap_or_default();
        let mut specs = Vec::with_capacity(names.len());
        for name in names {
            // a record deleted between index read and spec read is skipped
            if let Some(spec) = engine.get(KeyTypeNodeSpec { kind, name: &name })? {
                specs.push(spec);
            }
        }
        Ok(specs)
    }
}

#[async_trait]
impl ResourceLookup for NodeRegistryView {
    async fn resolve(&self, node: &NodeRef) -> CCResult<NodeSpec> {
        self.node_registry().get(node)
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
