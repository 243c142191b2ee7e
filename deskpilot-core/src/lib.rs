//! Deskpilot Core
//!
//! Core types and abstractions for the Deskpilot job orchestrator.
//!
//! This crate contains:
//! - Domain types: Core business entities (Job, JobState, PortRange)
//! - DTOs: Data transfer objects shared by the orchestrator, client and CLI

pub mod domain;
pub mod dto;
