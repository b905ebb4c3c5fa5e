//! Service layer for document intake and analysis.
//!
//! This module contains domain logic separated from UI concerns.
//! Services can be used by CLI, web server, or other interfaces.

pub mod lifecycle;

pub use lifecycle::{DocumentLifecycle, LifecycleError, Upload};
