//! services/api/src/lib.rs
//!
//! The HTTP and Postgres side of the LMS: adapters implementing the core ports,
//! configuration, and the axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
