use std::fmt::Debug;

use thiserror::Error;

use crate::general::m_node_registry::NodeKind;

pub type CCResult<T> = Result<T, CCError>;

#[derive(Debug)]
pub enum CcStoreErr {
    NotFound {
        kind: NodeKind,
        name: String,
    },
    AlreadyExists {
        kind: NodeKind,
        name: String,
    },
    Engine {
        inner: sled::Error,
        context: String,
    },
    Decode {
        context: String,
    },
}

#[derive(Debug)]
pub enum CcRpcErr {
    Http(reqwest::Error),
    ErrorResponse { method: String, message: String },
    Malformed { method: String, context: String },
}

#[derive(Debug)]
pub enum CcStreamErr {
    ClientDisconnected,
}

#[derive(Debug)]
pub enum CcSerialErr {
    BincodeErr {
        err: Box<bincode::ErrorKind>,
        context: String,
    },
    Json(serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CCError {
    #[error("Store error: {0:?}")]
    CcStoreErr(CcStoreErr),

    #[error("Rpc error: {0:?}")]
    CcRpcErr(CcRpcErr),

    #[error("Stream error: {0:?}")]
    CcStreamErr(CcStreamErr),

    #[error("Serial error: {0:?}")]
    CcSerialErr(CcSerialErr),
}

impl From<CcStoreErr> for CCError {
    fn from(e: CcStoreErr) -> Self {
        CCError::CcStoreErr(e)
    }
}

impl From<CcRpcErr> for CCError {
    fn from(e: CcRpcErr) -> Self {
        CCError::CcRpcErr(e)
    }
}

impl From<CcStreamErr> for CCError {
    fn from(e: CcStreamErr) -> Self {
        CCError::CcStreamErr(e)
    }
}

impl From<CcSerialErr> for CCError {
    fn from(e: CcSerialErr) -> Self {
        CCError::CcSerialErr(e)
    }
}

impl From<serde_json::Error> for CCError {
    fn from(e: serde_json::Error) -> Self {
        CCError::CcSerialErr(CcSerialErr::Json(e))
    }
}

impl CCError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CCError::CcStoreErr(CcStoreErr::NotFound { .. }))
    }
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CCError::CcStoreErr(CcStoreErr::AlreadyExists { .. }))
    }
}

pub trait CCResultExt {
    fn todo_handle(&self);
}

impl<T: Debug> CCResultExt for CCResult<T> {
    #[inline]
    fn todo_handle(&self) {
        match self {
            Ok(_ok) => {}
            Err(err) => {
                tracing::warn!("result err: {:?}", err);
            }
        }
    }
}
