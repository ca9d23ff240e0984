//! Core domain types
//!
//! This module contains the domain structures used across Runsync services.
//! The declarative record is what users write; the engine run is what the
//! execution engine actually schedules work from.

pub mod record;
pub mod run;
