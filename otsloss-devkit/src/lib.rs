/*!
# OTS loss DevKit

Test support for the loss engine:
- in-memory NFM-T client serving raw JSON documents
- builders for inventory, characteristics and PM documents
- a harness running the engine on a fixed clock
*/

pub mod fixtures;
pub mod mock_client;
pub mod test_utils;

pub use mock_client::{MockCall, MockEndpoint, MockTelemetryClient};
pub use test_utils::TestHarness;
