//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every section falls back to its defaults when omitted.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ScopeConfig {
    /// Human-readable line observer.
    pub observer: ObserverConfig,

    /// Levels for the structured tracing observer.
    pub structured: StructuredConfig,

    /// Process logging and metrics export.
    pub observability: ObservabilityConfig,
}

/// Default observer switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Master switch for all output.
    pub enabled: bool,

    /// Report new connections.
    pub log_connect: bool,

    /// Report connection, statement and cursor closes.
    pub log_close: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_connect: true,
            log_close: false,
        }
    }
}

/// Level names (trace, debug, info, warn, error) per operation group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StructuredConfig {
    pub connect: String,
    pub prepare: String,
    pub query: String,
    pub exec: String,
    pub close: String,
    pub tx: String,
}

impl Default for StructuredConfig {
    fn default() -> Self {
        Self {
            connect: "debug".to_string(),
            prepare: "debug".to_string(),
            query: "info".to_string(),
            exec: "info".to_string(),
            close: "debug".to_string(),
            tx: "info".to_string(),
        }
    }
}

impl StructuredConfig {
    /// `(field name, level name)` pairs, in declaration order.
    pub fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("connect", self.connect.as_str()),
            ("prepare", self.prepare.as_str()),
            ("query", self.query.as_str()),
            ("exec", self.exec.as_str()),
            ("close", self.close.as_str()),
            ("tx", self.tx.as_str()),
        ]
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error, off).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
