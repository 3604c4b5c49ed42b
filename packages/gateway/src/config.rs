//! Gateway configuration.

/// Runtime configuration for the gateway binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Host address to bind to (e.g., "127.0.0.1")
    pub host: String,
    /// Port number to bind to
    pub port: u16,
    /// How many relayed message ids are remembered for delete authorization
    pub ledger_capacity: usize,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ledger_capacity: 10_000,
        }
    }
}
