use crate::general::m_node_registry::{unix_now, NodeKind, NodePatch, NodeRef, NodeSpec};
use crate::general::network::http_handler::ApiHandlerImpl;
use crate::result::{CCError, CCResult, CcStoreErr};
use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const NODES_PER_PAGE: usize = 25;

/// Wire shape of a stored node record. The kind is carried by the url.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeModel {
    pub name: String,
    pub network: String,
    pub archive: bool,
    pub rpc: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_host: Option<String>,
    pub rpc_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    pub created_at: u64,
}

impl From<NodeSpec> for NodeModel {
    fn from(spec: NodeSpec) -> Self {
        Self {
            name: spec.name,
            network: spec.network,
            archive: spec.archive,
            rpc: spec.rpc,
            rpc_host: spec.rpc_host,
            rpc_port: spec.rpc_port,
            storage_class: spec.storage_class,
            created_at: spec.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeReq {
    pub name: String,
    pub network: String,
    #[serde(default)]
    pub archive: bool,
    // new nodes come up with their control endpoint on
    #[serde(default = "default_rpc")]
    pub rpc: bool,
    #[serde(default)]
    pub rpc_host: Option<String>,
    #[serde(default)]
    pub rpc_port: Option<u16>,
    #[serde(default)]
    pub storage_class: Option<String>,
}

fn default_rpc() -> bool {
    true
}

impl CreateNodeReq {
    pub fn into_spec(self, kind: NodeKind) -> NodeSpec {
        NodeSpec {
            kind,
            rpc_port: self.rpc_port.unwrap_or_else(|| kind.default_rpc_port()),
            name: self.name,
            network: self.network,
            archive: self.archive,
            rpc: self.rpc,
            rpc_host: self.rpc_host,
            storage_class: self.storage_class,
            created_at: unix_now(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodeReq {
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub archive: Option<bool>,
    #[serde(default)]
    pub rpc: Option<bool>,
    #[serde(default)]
    pub rpc_host: Option<String>,
    #[serde(default)]
    pub rpc_port: Option<u16>,
    #[serde(default)]
    pub storage_class: Option<String>,
}

impl UpdateNodeReq {
    pub fn into_patch(self) -> NodePatch {
        NodePatch {
            network: self.network,
            archive: self.archive,
            rpc: self.rpc,
            rpc_host: self.rpc_host,
            rpc_port: self.rpc_port,
            storage_class: self.storage_class,
        }
    }
}

#[async_trait]
pub trait ApiHandler {
    async fn handle_create_node(&self, kind: NodeKind, req: CreateNodeReq) -> CCResult<NodeModel>;

    /// Returns the total record count alongside one page of models,
    /// newest first.
    async fn handle_list_nodes(
        &self,
        kind: NodeKind,
        page: usize,
    ) -> CCResult<(usize, Vec<NodeModel>)>;

    async fn handle_get_node(&self, node: NodeRef) -> CCResult<NodeModel>;

    async fn handle_update_node(&self, node: NodeRef, req: UpdateNodeReq) -> CCResult<NodeModel>;

    async fn handle_delete_node(&self, node: NodeRef) -> CCResult<()>;
}

fn error_status(err: &CCError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_already_exists() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_resp(err: CCError) -> (StatusCode, Json<Value>) {
    let message = match &err {
        CCError::CcStoreErr(CcStoreErr::NotFound { kind, name }) => {
            format!("{} by name {} doesn't exist", kind, name)
        }
        CCError::CcStoreErr(CcStoreErr::AlreadyExists { kind, name }) => {
            format!("{} by name {} already exists", kind, name)
        }
        other => {
            tracing::warn!("api request failed: {:?}", other);
            "internal server error".to_owned()
        }
    };
    (error_status(&err), Json(json!({ "error": message })))
}

fn node_resp(res: CCResult<NodeModel>, ok: StatusCode) -> (StatusCode, Json<Value>) {
    match res {
        Ok(node) => (ok, Json(json!({ "node": node }))),
        Err(err) => error_resp(err),
    }
}

/// Window of `[start, end)` into a list of `total` records for one page.
/// Out-of-range pages collapse to an empty window at the end.
pub fn page_window(total: usize, page: usize) -> (usize, usize) {
    let start = total.min(page.saturating_mul(NODES_PER_PAGE));
    let end = total.min(start.saturating_add(NODES_PER_PAGE));
    (start, end)
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, (StatusCode, Json<Value>)> {
    match body {
        Ok(Json(parsed)) => Ok(parsed),
        Err(rejection) => {
            tracing::debug!("rejected request body: {}", rejection);
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "bad request" })),
            ))
        }
    }
}

fn parse_kind(kind: &str) -> Result<NodeKind, (StatusCode, Json<Value>)> {
    kind.parse().map_err(|_unknown| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("unknown node kind {}", kind) })),
        )
    })
}

fn parse_ref(kind: &str, name: String) -> Result<NodeRef, (StatusCode, Json<Value>)> {
    Ok(NodeRef {
        kind: parse_kind(kind)?,
        name,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    // bad page values read as page zero
    #[serde(default)]
    pub page: Option<String>,
}

impl ListQuery {
    fn page(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    }
}

pub fn add_routers(mut router: Router) -> Router {
    async fn create_node(
        Path(kind): Path<String>,
        body: Result<Json<CreateNodeReq>, JsonRejection>,
    ) -> (StatusCode, Json<Value>) {
        let kind = match parse_kind(&kind) {
            Ok(kind) => kind,
            Err(resp) => return resp,
        };
        let req = match parse_body(body) {
            Ok(req) => req,
            Err(resp) => return resp,
        };
        node_resp(
            ApiHandlerImpl.handle_create_node(kind, req).await,
            StatusCode::CREATED,
        )
    }
    async fn list_nodes(Path(kind): Path<String>, Query(query): Query<ListQuery>) -> Response {
        let kind = match parse_kind(&kind) {
            Ok(kind) => kind,
            Err(resp) => return resp.into_response(),
        };
        match ApiHandlerImpl.handle_list_nodes(kind, query.page()).await {
            Ok((total, nodes)) => (
                StatusCode::OK,
                [
                    ("Access-Control-Expose-Headers", "X-Total-Count".to_owned()),
                    ("X-Total-Count", total.to_string()),
                ],
                Json(json!({ "nodes": nodes })),
            )
                .into_response(),
            Err(err) => error_resp(err).into_response(),
        }
    }
    // HEAD on the collection answers with the count headers alone
    router = router.route("/api/v1/:kind", post(create_node).get(list_nodes));

    async fn get_node(Path((kind, name)): Path<(String, String)>) -> (StatusCode, Json<Value>) {
        let node = match parse_ref(&kind, name) {
            Ok(node) => node,
            Err(resp) => return resp,
        };
        node_resp(ApiHandlerImpl.handle_get_node(node).await, StatusCode::OK)
    }
    async fn update_node(
        Path((kind, name)): Path<(String, String)>,
        body: Result<Json<UpdateNodeReq>, JsonRejection>,
    ) -> (StatusCode, Json<Value>) {
        let node = match parse_ref(&kind, name) {
            Ok(node) => node,
            Err(resp) => return resp,
        };
        let req = match parse_body(body) {
            Ok(req) => req,
            Err(resp) => return resp,
        };
        node_resp(
            ApiHandlerImpl.handle_update_node(node, req).await,
            StatusCode::OK,
        )
    }
    async fn delete_node(Path((kind, name)): Path<(String, String)>) -> (StatusCode, Json<Value>) {
        let node = match parse_ref(&kind, name) {
            Ok(node) => node,
            Err(resp) => return resp,
        };
        match ApiHandlerImpl.handle_delete_node(node).await {
            Ok(()) => (StatusCode::OK, Json(json!({}))),
            Err(err) => error_resp(err),
        }
    }
    router = router.route(
        "/api/v1/:kind/:name",
        get(get_node).put(update_node).delete(delete_node),
    );
    router
}
