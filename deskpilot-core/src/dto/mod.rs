//! Data Transfer Objects for inter-service communication
//!
//! Request and response bodies of the orchestrator HTTP API, shared by the
//! orchestrator (server side) and the client crate.

pub mod automation;
