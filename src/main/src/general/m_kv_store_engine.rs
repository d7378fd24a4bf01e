use axum::async_trait;
use bincode::serialize_into;
use camelpaste::paste;
use serde::Serialize;
use serde::{de::DeserializeOwned, ser::SerializeTuple};

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::general::m_node_registry::{NodeKind, NodeSpec};
use crate::{
    result::{CCResult, CcSerialErr, CcStoreErr},
    sys::{LogicalModule, LogicalModuleNewArgs},
    util::JoinHandleWrapper,
};
use cc_derive::LogicalModule;

/// Keyed object store for node records. Writes are serialized by the
/// owning registry; reads may happen concurrently from stream sessions.
#[derive(LogicalModule)]
pub struct KvStoreEngine {
    db: OnceLock<sled::Db>,
    file_dir: PathBuf,
}

#[async_trait]
impl LogicalModule for KvStoreEngine {
    fn inner_new(args: LogicalModuleNewArgs) -> Self
    where
        Self: Sized,
    {
        Self {
            db: OnceLock::new(),
            file_dir: args.config.file_dir.clone(),
        }
    }
    async fn start(&self) -> CCResult<Vec<JoinHandleWrapper>> {
        let db_path = self.file_dir.join("node_store");
        let _ = self.db.get_or_init(|| {
            let db = sled::Config::default()
                .path(&db_path)
                .create_new(true)
                .open()
                .map_or_else(
                    |_e| sled::Config::default().path(db_path).open().unwrap(),
                    |v| v,
                );
            db
        });
        Ok(vec![])
    }
}

impl KvStoreEngine {
    pub fn set<K>(&self, key: K, value: &K::Value) -> CCResult<()>
    where
        K: KeyType,
    {
        let key = key.make_key();
        let value = bincode::serialize(value).map_err(|err| CcSerialErr::BincodeErr {
            err,
            context: "serialize kv value".to_owned(),
        })?;
        let _ = self
            .db
            .get()
            .unwrap()
            .insert(key, value)
            .map_err(|inner| CcStoreErr::Engine {
                inner,
                context: "insert kv".to_owned(),
            })?;
        Ok(())
    }
    pub fn get<K>(&self, key_: K) -> CCResult<Option<K::Value>>
    where
        K: KeyType,
    {
        let key = key_.make_key();
        let got = self
            .db
            .get()
            .unwrap()
            .get(key)
            .map_err(|inner| CcStoreErr::Engine {
                inner,
                context: "get kv".to_owned(),
            })?;
        match got {
            Some(v) => {
                let v = key_
                    .deserialize_from(v.as_ref())
                    .ok_or_else(|| CcStoreErr::Decode {
                        context: "deserialize kv value".to_owned(),
                    })?;
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }
    pub fn del<K>(&self, key: K) -> CCResult<bool>
    where
        K: KeyType,
    {
        let key = key.make_key();
        let removed = self
            .db
            .get()
            .unwrap()
            .remove(key)
            .map_err(|inner| CcStoreErr::Engine {
                inner,
                context: "remove kv".to_owned(),
            })?;
        Ok(removed.is_some())
    }
    pub fn flush(&self) {
        let _ = self.db.get().unwrap().flush().unwrap();
    }
}

pub trait KeyType: Serialize {
    type Value: Serialize + DeserializeOwned;
    fn id(&self) -> u8;
    fn make_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + bincode::serialized_size(self).unwrap() as usize);
        key.push(self.id());
        serialize_into(&mut key, self).unwrap();
        key
    }

    fn deserialize_from(&self, bytes: &[u8]) -> Option<Self::Value>;
}

macro_rules! generate_key_struct_content {
    ($id:expr, $latest:ty) => {
        type Value = $latest;
        fn id(&self) -> u8 {
            $id
        }
        fn deserialize_from(&self, bytes: &[u8]) -> Option<$latest> {
            if let Ok(val) = bincode::deserialize::<$latest>(bytes) {
                return Some(val);
            }
            None
        }
    };
}

macro_rules! generate_key_struct {
    ([$name:ident], $id:expr, $latest:ty) => {
        paste! {
            impl KeyType for $name {
                generate_key_struct_content!( $id, $latest);
            }
        }
    };
    ([$name:ident,$lifetime:lifetime], $id:expr, $latest:ty) => {
        paste! {
            impl KeyType for $name<$lifetime> {
                generate_key_struct_content!( $id, $latest);
            }
        }
    };
}

pub struct KeyTypeNodeSpec<'a> {
    pub kind: NodeKind,
    pub name: &'a str,
}
generate_key_struct!([KeyTypeNodeSpec,'_], 0, NodeSpec);

pub struct KeyTypeNodeList(pub NodeKind);
generate_key_struct!([KeyTypeNodeList], 1, Vec<String>);

impl Serialize for KeyTypeNodeSpec<'_> {
    fn serialize<S: serde::ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.kind)?;
        tup.serialize_element(self.name)?;
        tup.end()
    }
}

impl Serialize for KeyTypeNodeList {
    fn serialize<S: serde::ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
