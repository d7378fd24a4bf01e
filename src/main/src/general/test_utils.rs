use lazy_static::lazy_static;
use tokio::sync::Mutex;

use crate::{
    config::ApiConfig,
    start_tracing,
    sys::{LogicalModulesRef, Sys},
};

pub const TEST_API: &str = "http://127.0.0.1:24380";

lazy_static! {
    static ref TEST_SYS: Mutex<Option<(Sys, LogicalModulesRef, tempfile::TempDir)>> =
        Mutex::new(None);
    // the sys's spawned tasks must outlive any single test's runtime
    static ref TEST_RT: tokio::runtime::Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
}

/// One shared system for every test in the binary, booted on first use
/// in mock mode on a fixed port.
pub async fn get_test_sys() -> LogicalModulesRef {
    let mut locked = TEST_SYS.lock().await;
    if locked.is_none() {
        *locked = Some(start_test_sys().await);
    }
    locked.as_ref().unwrap().1.clone()
}

async fn start_test_sys() -> (Sys, LogicalModulesRef, tempfile::TempDir) {
    start_tracing();

    let dir = tempfile::tempdir().unwrap();
    let config = ApiConfig {
        listen: "127.0.0.1:24380".parse().unwrap(),
        mock: true,
        file_dir: dir.path().to_owned(),
    };
    tracing::info!("starting test sys");
    let (sys, modsref) = TEST_RT
        .spawn(async move {
            let sys = Sys::new(config);
            let modsref = sys.test_start_all().await;
            (sys, modsref)
        })
        .await
        .unwrap();

    // the http listener comes up in a spawned task
    for _ in 0..100 {
        if tokio::net::TcpStream::connect("127.0.0.1:24380").await.is_ok() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    (sys, modsref, dir)
}
