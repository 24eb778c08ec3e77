//! HTTP graph writer
//!
//! Sends every staged field in one request:
//!
//! ```text
//! GET {base_url}/update?api_key=KEY&field1=-67&field2=21.43&field3=0.12
//! ```
//!
//! The service answers with the id of the stored entry, or `0` when it
//! dropped the update. Graphing services typically accept one update per
//! channel every 15 s; the node's graph period is the throttle, so nothing
//! here retries.

use std::collections::BTreeMap;
use std::time::Duration;

use thermolink_core::{ChannelError, FieldWriter};

use crate::{ConnectionStats, ConnectorError};

/// Graph service configuration
#[derive(Clone)]
pub struct GraphConfig {
    /// Base URL for the service
    pub base_url: String,
    /// Write key of the target channel
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl GraphConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
            user_agent: format!("thermolink/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// Graph destination over HTTP
pub struct GraphWriter {
    config: GraphConfig,
    agent: ureq::Agent,
    staged: BTreeMap<u8, f32>,
    stats: ConnectionStats,
}

impl GraphWriter {
    pub fn new(config: GraphConfig) -> Result<Self, ConnectorError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ConnectorError::ConfigError(
                "Base URL must start with http:// or https://".into(),
            ));
        }
        if config.api_key.is_empty() {
            return Err(ConnectorError::ConfigError("Missing write key".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            staged: BTreeMap::new(),
            stats: ConnectionStats::default(),
        })
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Query parameters for the staged fields, key first
    fn query(&self) -> Vec<(String, String)> {
        let mut query = vec![("api_key".to_owned(), self.config.api_key.clone())];
        for (index, value) in &self.staged {
            query.push((format!("field{}", index), format!("{:.2}", value)));
        }
        query
    }

    fn execute(&self, query: &[(String, String)]) -> Result<u64, ConnectorError> {
        let url = format!("{}/update", self.config.base_url.trim_end_matches('/'));
        let mut request = self.agent.get(&url);
        for (name, value) in query {
            request = request.query(name, value);
        }

        match request.call() {
            Ok(response) => {
                let body = response.into_string()?;
                entry_id(&body)
            }
            Err(ureq::Error::Status(429, _)) => Err(ConnectorError::RateLimited),
            Err(ureq::Error::Status(code, response)) => Err(ConnectorError::Rejected(format!(
                "HTTP {}: {}",
                code,
                response.into_string().unwrap_or_default()
            ))),
            Err(ureq::Error::Transport(e)) => Err(ConnectorError::ProtocolError(e.to_string())),
        }
    }
}

/// Parse the service's reply; `0` means the update was dropped
fn entry_id(body: &str) -> Result<u64, ConnectorError> {
    match body.trim().parse::<u64>() {
        Ok(0) => Err(ConnectorError::Rejected("update dropped".into())),
        Ok(id) => Ok(id),
        Err(_) => Err(ConnectorError::ProtocolError(format!(
            "unexpected reply {:?}",
            body
        ))),
    }
}

impl FieldWriter for GraphWriter {
    fn set_field(&mut self, index: u8, value: f32) {
        self.staged.insert(index, value);
    }

    fn commit(&mut self) -> Result<(), ChannelError> {
        let query = self.query();
        self.staged.clear();

        match self.execute(&query) {
            Ok(id) => {
                log::debug!("Graph entry {} stored", id);
                let bytes = query.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
                self.stats.record_sent(bytes);
                Ok(())
            }
            Err(e) => Err(self.stats.record_failure(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> GraphWriter {
        GraphWriter::new(GraphConfig::new("https://graph.example.com/", "KEY")).unwrap()
    }

    #[test]
    fn url_validation() {
        assert!(GraphWriter::new(GraphConfig::new("not-a-url", "KEY")).is_err());
        assert!(GraphWriter::new(GraphConfig::new("https://valid.url", "")).is_err());
    }

    #[test]
    fn query_carries_staged_fields_in_order() {
        let mut graph = writer();
        graph.set_field(3, 0.12);
        graph.set_field(1, -67.0);
        graph.set_field(2, 21.4);

        let query = graph.query();
        let pairs: Vec<(&str, &str)> = query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("api_key", "KEY"),
                ("field1", "-67.00"),
                ("field2", "21.40"),
                ("field3", "0.12"),
            ]
        );
    }

    #[test]
    fn reply_parsing() {
        assert_eq!(entry_id("1234\n").unwrap(), 1234);
        assert!(matches!(entry_id("0"), Err(ConnectorError::Rejected(_))));
        assert!(matches!(
            entry_id("<html>"),
            Err(ConnectorError::ProtocolError(_))
        ));
    }
}
