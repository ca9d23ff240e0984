//! Runsync Core
//!
//! Core types for the Runsync controller.
//!
//! This crate contains:
//! - Domain types: the declarative PipelineRun record and the EngineRun
//!   resource derived from it
//!
//! These types are shared between the store adapters (which persist and
//! transport them) and the controller (which reconciles them).

pub mod domain;
