//! Core modules
//!
//! Configuration, errors and types, the nestable critical section, the
//! interrupt registry/dispatcher and the software timer scheduler.

pub mod config;
pub mod critical;
pub mod error;
pub mod types;
pub mod irq;
pub mod time;
pub(crate) mod cs_cell;
