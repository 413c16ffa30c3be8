//! # OVN Test Utilities
//!
//! Shared test utilities for the OVN exporter.
//!
//! ## Modules
//!
//! - `mock_backend` - In-memory [`OvnBackend`](ovn_exporter::backend::OvnBackend)
//! - `scripted_runner` - [`CommandRunner`](ovn_exporter::appctl::CommandRunner)
//!   answering from canned output
//! - `fixtures` - Status command output and a config backed by temp files
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ovn_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let env = TestEnv::new();
//!     let backend = Arc::new(MockBackend::new().with_chassis(vec![chassis("node-1")]));
//!     let runner = Arc::new(ScriptedRunner::healthy_cluster());
//!     let metrics = Arc::new(OvnMetrics::new().unwrap());
//!
//!     let mut poller = env.poller(backend, runner, Arc::clone(&metrics));
//!     let report = poller.run_pass().await;
//! }
//! ```

pub mod fixtures;
pub mod mock_backend;
pub mod scripted_runner;

pub use fixtures::*;
pub use mock_backend::MockBackend;
pub use scripted_runner::ScriptedRunner;
