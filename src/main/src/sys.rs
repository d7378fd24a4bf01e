use crate::{
    config::ApiConfig,
    general::{
        m_kv_store_engine::KvStoreEngine, m_node_registry::NodeRegistry,
        m_stream_supervisor::StreamSupervisor, network::http_handler::HttpHandler,
    },
    result::CCResult,
    util::{self, JoinHandleWrapper},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Sys {
    logical_modules: Arc<Option<LogicalModules>>,
    sub_tasks: Mutex<Vec<JoinHandleWrapper>>,
}

impl Drop for Sys {
    fn drop(&mut self) {
        tracing::info!("drop sys");
    }
}

impl Sys {
    pub fn new(config: ApiConfig) -> Sys {
        tracing::info!("Running at dir: {:?}", config.file_dir);

        Sys {
            logical_modules: LogicalModules::new(config),
            sub_tasks: Vec::new().into(),
        }
    }

    pub async fn wait_for_end(&mut self) {
        if let Err(err) = (*self.logical_modules).as_ref().unwrap().start(self).await {
            panic!("start logical modules error: {:?}", err);
        }
        tracing::info!("modules all started, waiting for end");
        for task in self.sub_tasks.lock().await.iter_mut() {
            task.join().await;
        }
    }

    #[cfg(test)]
    pub async fn test_start_all(&self) -> LogicalModulesRef {
        if let Err(err) = (*self.logical_modules).as_ref().unwrap().start(self).await {
            panic!("start logical modules error: {:?}", err);
        }
        assert!(self.logical_modules.is_some());
        LogicalModulesRef {
            inner: Arc::downgrade(&self.logical_modules),
        }
    }
}

#[derive(Clone)]
pub struct LogicalModuleNewArgs {
    pub logical_modules_ref: LogicalModulesRef,
    pub btx: BroadcastSender,
    pub config: ApiConfig,
}

#[async_trait]
pub trait LogicalModule: Send + Sync + 'static {
    fn inner_new(args: LogicalModuleNewArgs) -> Self
    where
        Self: Sized;
    async fn start(&self) -> CCResult<Vec<JoinHandleWrapper>>;

    async fn init(&self) -> CCResult<()> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum BroadcastMsg {
    SysEnd,
}

pub type BroadcastSender = tokio::sync::broadcast::Sender<BroadcastMsg>;

#[derive(Clone)]
pub struct LogicalModulesRef {
    pub inner: std::sync::Weak<Option<LogicalModules>>,
}

#[macro_export]
macro_rules! logical_module_view_impl {
    ($module:ident,$module_name:ident,$type:ty) => {
        impl $module {
            pub fn $module_name(&self) -> &$type {
                let res = unsafe { &(*self.inner.inner.as_ptr()).as_ref().unwrap().$module_name };
                let _: &dyn Send = res;
                res
            }
        }
    };
    ($module:ident) => {
        #[derive(Clone)]
        pub struct $module {
            inner: LogicalModulesRef,
        }
        impl $module {
            pub fn new(inner: LogicalModulesRef) -> Self {
                $module { inner }
            }
            pub fn copy_module_ref(&self) -> LogicalModulesRef {
                self.inner.clone()
            }
        }

        // unsafe send
        unsafe impl Send for $module {}
    };
}

macro_rules! init_module {
    ($self:ident,$sys:ident,$opt:ident) => {
        $self.$opt.init().await?;
    };
}

macro_rules! start_module {
    ($self:ident,$sys:ident,$opt:ident) => {
        $sys.sub_tasks
            .lock()
            .await
            .append(&mut $self.$opt.start().await?);
    };
}

macro_rules! start_modules {
    ([$( $module:ident,$modulety:ty ),*]) => {
        pub struct LogicalModules {
            $( pub $module : $modulety, )*
        }

        impl LogicalModules {
            pub fn new(config: ApiConfig) -> Arc<Option<LogicalModules>> {
                let (broadcast_tx, _broadcast_rx) = tokio::sync::broadcast::channel::<BroadcastMsg>(1);
                let arc = Arc::new(None);
                let args = LogicalModuleNewArgs {
                    btx: broadcast_tx,
                    config,
                    logical_modules_ref: LogicalModulesRef {
                        inner: Arc::downgrade(&arc),
                    },
                };

                let logical_modules = LogicalModules {
                    $( $module : <$modulety>::new(args.clone()), )*
                };
                let _ = unsafe { util::unsafe_mut(&*arc) }.replace(logical_modules);
                arc
            }
            pub async fn start(&self, sys: &Sys) -> CCResult<()> {
                $(
                    init_module!(self, sys, $module);
                )*

                $(
                    start_module!(self, sys, $module);
                )*
                Ok(())
            }
        }
    };
}

start_modules!([
    kv_store_engine,
    KvStoreEngine,
    node_registry,
    NodeRegistry,
    stream_supervisor,
    StreamSupervisor,
    http_handler,
    HttpHandler
]);
