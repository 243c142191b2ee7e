//! Core domain types
//!
//! This module contains the core domain structures used across Deskpilot crates.
//! The orchestrator owns and mutates them; the client and CLI only read them.

pub mod job;
pub mod port;
