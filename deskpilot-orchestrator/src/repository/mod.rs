//! Repository Module
//!
//! Data access layer for the orchestrator.

pub mod address;

pub use address::{AddressStore, DisabledAddressStore, JobAddresses, MySqlAddressStore};
