//! Typed client for the rollout queue server.
//!
//! [`QueueClient`] is a pure protocol adapter: one HTTP round-trip per call,
//! no retries, no caching. Callers are written against the [`QueueApi`] trait
//! so they can be exercised without a server.

mod api;
pub use api::{QueueApi, Statistics};

mod client;
pub use client::QueueClient;

mod config;
pub use config::{ClientConfig, DEFAULT_ENDPOINT};

mod errors;
pub use errors::ClientError;


#[cfg(any(test, feature = "fake"))]
pub mod fake;
