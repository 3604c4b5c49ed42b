//! Client configuration.

use std::path::PathBuf;

use crate::connection::ReconnectPolicy;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Id this session registers under
    pub user_id: String,
    /// Gateway WebSocket endpoint
    pub gateway_url: String,
    /// Base URL of the portal's REST API
    pub api_base_url: String,
    /// Where read watermarks are persisted
    pub watermark_path: PathBuf,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            gateway_url: "ws://127.0.0.1:8080/ws".to_string(),
            api_base_url: "http://127.0.0.1:5000/api".to_string(),
            watermark_path: PathBuf::from("carelink-watermarks.json"),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
