//! Shared test utilities for the thermostat workspace
//!
//! # Fixtures
//!
//! - [`SnapshotFixture`] - builder for [`ThermostatSnapshot`](thermo_protocol::ThermostatSnapshot) values
//!
//! # Mock Services
//!
//! - [`MockHistoryServer`] - mock of the controller's chart backfill endpoint
//!
//! # Example
//!
//! ```rust,ignore
//! use thermo_test_utils::{MockHistoryServer, SnapshotFixture};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let history = MockHistoryServer::start().await;
//!     history.mock_all(&MockHistoryServer::records(3)).await;
//!
//!     let heating = SnapshotFixture::heating(70.0, 65.0).eta(12.0).build();
//! }
//! ```

mod fixtures;
mod history;

pub use fixtures::SnapshotFixture;
pub use history::MockHistoryServer;
