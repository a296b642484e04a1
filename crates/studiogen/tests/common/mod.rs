//! Shared test utilities for studiogen integration tests.
//!
//! This module provides:
//! - Scripted planner, renderer, blob and store fakes
//! - `TestHarness` wiring them into a controller or service

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::*;
