//! Mock chart backfill endpoint
//!
//! Provides a [`MockHistoryServer`] that answers `GET /data` and
//! `GET /data/<since>` the way the controller does, so history polling can be
//! tested without running a controller.

use serde_json::json;
use thermo_protocol::HistoryRecord;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock history server wrapping a [`wiremock::MockServer`]
pub struct MockHistoryServer {
    server: MockServer,
}

impl MockHistoryServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// `count` records one minute apart starting at t=1_700_000_000
    pub fn records(count: usize) -> Vec<HistoryRecord> {
        (0..count)
            .map(|i| {
                let i = i as f64;
                HistoryRecord::new(1_700_000_000.0 + i * 60.0, 70.0 + i * 0.1, 45.0)
            })
            .collect()
    }

    /// Mount `GET /data` returning all records
    pub async fn mock_all(&self, records: &[HistoryRecord]) {
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.server)
            .await;
    }

    /// Mount `GET /data/<since>` returning the given records for exactly that path
    pub async fn mock_since(&self, since: &str, records: &[HistoryRecord]) {
        Mock::given(method("GET"))
            .and(path(format!("/data/{}", since)))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.server)
            .await;
    }

    /// Mount a failure for every history path
    pub async fn mock_server_error(&self, message: &str) {
        Mock::given(method("GET"))
            .and(path_regex("^/data(/.*)?$"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "code": "INTERNAL_ERROR",
                "message": message
            })))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the server has seen
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Get reference to the underlying mock server for custom mock setups
    pub fn inner(&self) -> &MockServer {
        &self.server
    }
}
