//! # jobguard
//!
//! Single-instance execution for background jobs shared across workers.
//!
//! A job invocation takes a lease in a shared store (Redis or Postgres)
//! before its body runs. A second invocation with the same identity fails
//! fast with `AlreadyLocked`; a crashed holder's lease expires on its own.

pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod identity;
pub mod lock;
pub mod model;
pub mod registry;
pub mod telemetry;
pub mod timeout;
