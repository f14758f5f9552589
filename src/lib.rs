//! RealWorld (Conduit) blog backend.
//!
//! Layers follow the usual split: `domain` holds records and invariants, `application`
//! the services and repository traits, `infra` the Postgres, HTTP and telemetry adapters,
//! and `cache` the optional user cache that wraps the users store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
