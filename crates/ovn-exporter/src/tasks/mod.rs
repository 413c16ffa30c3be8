//! Background tasks for the OVN exporter.

pub mod poller;

pub use poller::{start_poller, CollectorOutcome, PassReport, Poller};
