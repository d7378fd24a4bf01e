use crate::{
    apis::{self, ApiHandler, CreateNodeReq, NodeModel, UpdateNodeReq},
    general::{
        m_node_registry::{NodeKind, NodeRef, NodeRegistry},
        m_stream_supervisor::StreamSupervisor,
    },
    logical_module_view_impl,
    result::CCResult,
    sys::{LogicalModule, LogicalModuleNewArgs, LogicalModulesRef},
    util::JoinHandleWrapper,
};
use async_trait::async_trait;
use axum::{
    extract::{ws::WebSocketUpgrade, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use cc_derive::LogicalModule;
use std::{net::SocketAddr, sync::OnceLock};
use tower_http::cors::CorsLayer;

logical_module_view_impl!(HttpHandlerView);
logical_module_view_impl!(HttpHandlerView, node_registry, NodeRegistry);
logical_module_view_impl!(HttpHandlerView, stream_supervisor, StreamSupervisor);

/// Front door of the system: node CRUD routes plus the per-node stats
/// websocket, all on one listener.
#[derive(LogicalModule)]
pub struct HttpHandler {
    view: HttpHandlerView,
    listen: SocketAddr,
}

#[async_trait]
impl LogicalModule for HttpHandler {
    fn inner_new(args: LogicalModuleNewArgs) -> Self
    where
        Self: Sized,
    {
        Self {
            view: HttpHandlerView::new(args.logical_modules_ref.clone()),
            listen: args.config.listen,
        }
    }
    async fn start(&self) -> CCResult<Vec<JoinHandleWrapper>> {
        let view = self.view.clone();
        let listen = self.listen;
        Ok(vec![JoinHandleWrapper::from(tokio::spawn(async move {
            start_http_handler(view, listen).await;
        }))])
    }
}

pub struct ApiHandlerImpl;

#[async_trait]
impl ApiHandler for ApiHandlerImpl {
    async fn handle_create_node(&self, kind: NodeKind, req: CreateNodeReq) -> CCResult<NodeModel> {
        http_handler_view()
            .node_registry()
            .create(req.into_spec(kind))
            .map(NodeModel::from)
    }

    async fn handle_list_nodes(
        &self,
        kind: NodeKind,
        page: usize,
    ) -> CCResult<(usize, Vec<NodeModel>)> {
        let mut specs = http_handler_view().node_registry().list(kind)?;
        let total = specs.len();
        specs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let (start, end) = apis::page_window(total, page);
        let models = specs.drain(start..end).map(NodeModel::from).collect();
        Ok((total, models))
    }

    async fn handle_get_node(&self, node: NodeRef) -> CCResult<NodeModel> {
        http_handler_view()
            .node_registry()
            .get(&node)
            .map(NodeModel::from)
    }

    async fn handle_update_node(&self, node: NodeRef, req: UpdateNodeReq) -> CCResult<NodeModel> {
        http_handler_view()
            .node_registry()
            .update(&node, req.into_patch())
            .map(NodeModel::from)
    }

    async fn handle_delete_node(&self, node: NodeRef) -> CCResult<()> {
        http_handler_view().node_registry().delete(&node)
    }
}

lazy_static::lazy_static!(
    static ref HTTP_HANDLER_VIEW: OnceLock<HttpHandlerView> = OnceLock::new();
);

fn http_handler_view() -> &'static HttpHandlerView {
    HTTP_HANDLER_VIEW.get().unwrap()
}

pub async fn start_http_handler(view: HttpHandlerView, addr: SocketAddr) {
    let view_clone = view.clone();
    let _ = HTTP_HANDLER_VIEW.get_or_init(move || view_clone);

    tracing::info!("http start on {}", addr);
    let app = apis::add_routers(Router::new())
        .route("/api/v1/:kind/:name/stats", get(stats_ws))
        .layer(CorsLayer::permissive());

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();

    tracing::info!("http end on {}", addr);
}

async fn stats_ws(Path((kind, name)): Path<(String, String)>, ws: WebSocketUpgrade) -> Response {
    let kind = match kind.parse::<NodeKind>() {
        Ok(kind) => kind,
        Err(_unknown) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("unknown node kind {}", kind),
            )
                .into_response();
        }
    };
    let node = NodeRef { kind, name };
    ws.on_upgrade(move |socket| async move {
        http_handler_view()
            .stream_supervisor()
            .serve_stats(node, socket);
    })
    .into_response()
}

#[cfg(test)]
mod test {
    use crate::general::test_utils::{get_test_sys, TEST_API};
    use futures_util::StreamExt;
    use serde_json::{json, Value};
    use tokio_tungstenite::connect_async;

    #[tokio::test]
    async fn test_node_crud_over_http() {
        let _modsref = get_test_sys().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/v1/near", TEST_API))
            .json(&json!({ "name": "alice", "network": "mainnet", "rpc": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["node"]["name"], "alice");
        assert_eq!(body["node"]["rpcPort"], 3030);
        assert_eq!(body["node"]["archive"], false);

        // duplicate name is rejected
        let resp = client
            .post(format!("{}/api/v1/near", TEST_API))
            .json(&json!({ "name": "alice", "network": "mainnet" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "near by name alice already exists");

        let resp = client
            .get(format!("{}/api/v1/near/alice", TEST_API))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .put(format!("{}/api/v1/near/alice", TEST_API))
            .json(&json!({ "network": "testnet", "archive": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["node"]["network"], "testnet");
        assert_eq!(body["node"]["archive"], true);
        // merge keeps fields the request left out
        assert_eq!(body["node"]["rpc"], true);

        let resp = client
            .get(format!("{}/api/v1/near", TEST_API))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert!(body["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["name"] == "alice"));

        let resp = client
            .delete(format!("{}/api/v1/near/alice", TEST_API))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .get(format!("{}/api/v1/near/alice", TEST_API))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "near by name alice doesn't exist");
    }

    #[tokio::test]
    async fn test_list_reports_count_and_pages() {
        let _modsref = get_test_sys().await;
        let client = reqwest::Client::new();

        fn count_of(resp: &reqwest::Response) -> usize {
            resp.headers()["x-total-count"]
                .to_str()
                .unwrap()
                .parse()
                .unwrap()
        }

        for name in ["pager1", "pager2"] {
            let resp = client
                .post(format!("{}/api/v1/filecoin", TEST_API))
                .json(&json!({ "name": name, "network": "calibration" }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 201);
        }

        let resp = client
            .get(format!("{}/api/v1/filecoin", TEST_API))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let total = count_of(&resp);
        assert!(total >= 2);
        assert_eq!(
            resp.headers()["access-control-expose-headers"],
            "X-Total-Count"
        );
        let body: Value = resp.json().await.unwrap();
        let nodes = body["nodes"].as_array().unwrap();
        // one full page; the header counts the same records the body carries
        assert_eq!(nodes.len(), total);
        assert!(nodes.iter().any(|n| n["name"] == "pager1"));
        assert!(nodes.iter().any(|n| n["name"] == "pager2"));

        // far pages come back empty but still carry the count
        let resp = client
            .get(format!("{}/api/v1/filecoin?page=9999", TEST_API))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(count_of(&resp) >= 2);
        let body: Value = resp.json().await.unwrap();
        assert!(body["nodes"].as_array().unwrap().is_empty());

        // HEAD on the collection answers with the count alone
        let resp = client
            .head(format!("{}/api/v1/filecoin", TEST_API))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(count_of(&resp) >= 2);
        assert_eq!(resp.text().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_bad_request() {
        let _modsref = get_test_sys().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/v1/near", TEST_API))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "bad request");

        // wrong json shape hits the same envelope
        let resp = client
            .put(format!("{}/api/v1/near/whoever", TEST_API))
            .header("content-type", "application/json")
            .body("[]")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "bad request");
    }

    #[tokio::test]
    async fn test_stats_stream_over_websocket() {
        let _modsref = get_test_sys().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/v1/polkadot", TEST_API))
            .json(&json!({ "name": "relay1", "network": "kusama" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        let url = format!(
            "{}/api/v1/polkadot/relay1/stats",
            TEST_API.replacen("http", "ws", 1)
        );
        let (mut ws, _) = connect_async(url).await.unwrap();

        let msg = ws.next().await.unwrap().unwrap();
        let first: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(first["activePeersCount"], 1);
        assert_eq!(first["sentBytesPerSecond"], 100);
        assert_eq!(first["latestBlockHeight"], 36);
        assert_eq!(first["syncing"], true);

        let msg = ws.next().await.unwrap().unwrap();
        let second: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(second["activePeersCount"], 2);
        assert_eq!(second["latestBlockHeight"], 72);
    }

    #[tokio::test]
    async fn test_stats_stream_unknown_node_errors_once() {
        let _modsref = get_test_sys().await;

        let url = format!(
            "{}/api/v1/near/phantom/stats",
            TEST_API.replacen("http", "ws", 1)
        );
        let (mut ws, _) = connect_async(url).await.unwrap();

        let msg = ws.next().await.unwrap().unwrap();
        let body: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(body["error"], "near by name phantom doesn't exist");

        // nothing follows but the close
        match ws.next().await {
            None | Some(Err(_)) => {}
            Some(Ok(msg)) => assert!(msg.is_close(), "unexpected message {:?}", msg),
        }
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let _modsref = get_test_sys().await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{}/api/v1/dogecoin", TEST_API))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "unknown node kind dogecoin");
    }
}
