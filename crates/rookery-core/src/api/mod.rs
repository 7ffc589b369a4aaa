//! Outbound HTTP pipeline for the Rookery API.
//!
//! This module provides:
//! - `ApiClient`: authenticated requests with bounded retry, silent session
//!   renewal, and a single transparent replay
//! - `ApiRequest`/`ApiResponse`: replayable request values and settled
//!   responses
//! - `Transport`: the seam to the network, mockable in tests

pub mod client;
pub mod error;
pub mod request;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use request::{ApiRequest, ApiResponse};
pub use transport::{HttpTransport, Transport, TransportError};
