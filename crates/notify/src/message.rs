use std::sync::OnceLock;

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Hostname reported when the OS refuses to tell us ours.
pub const UNKNOWN_HOST: &str = "badhost";

/// An alert produced by a hook, waiting for batched delivery. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    /// Payload returned by the hook that raised the alert.
    #[serde(rename = "response_text")]
    pub response: serde_json::Value,
    /// RFC 3339 production time.
    pub now: String,
    #[serde(rename = "cynic_hostname")]
    pub hostname: String,
}

impl AlertMessage {
    /// Stamp a hook payload with the current time and this host's name.
    pub fn new(response: serde_json::Value) -> Self {
        Self {
            response,
            now: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            hostname: current_host().to_string(),
        }
    }
}

/// Name of the host we run on, resolved once per process.
pub fn current_host() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "couldn't get hostname");
            UNKNOWN_HOST.to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let msg = AlertMessage {
            response: serde_json::json!({"code": 503}),
            now: "2024-01-01T00:00:00Z".to_string(),
            hostname: "probe-1".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["response_text"]["code"], 503);
        assert_eq!(json["now"], "2024-01-01T00:00:00Z");
        assert_eq!(json["cynic_hostname"], "probe-1");
    }

    #[test]
    fn new_stamps_time_and_host() {
        let msg = AlertMessage::new(serde_json::json!("down"));
        assert!(chrono::DateTime::parse_from_rfc3339(&msg.now).is_ok());
        assert!(!msg.hostname.is_empty());
        assert_eq!(msg.response, serde_json::json!("down"));
    }
}
