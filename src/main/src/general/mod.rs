pub mod m_kv_store_engine;
pub mod m_node_registry;
pub mod m_stream_supervisor;
pub mod network;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;
