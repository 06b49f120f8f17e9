//! Client for the RouterOS API, the length-prefixed request/response
//! protocol RouterOS devices expose on TCP port 8728.
//!
//! A request is a single [`sentence`] of words; the device answers with zero
//! or more `!re` sentences followed by `!done`. [`Client`] is the seam
//! collectors depend on, [`client::RouterOsClient`] the network implementation.

pub mod client;
pub mod error;
pub mod sentence;

pub use client::{connect, Client, Reply, RouterOsClient};
pub use error::{ApiError, Result};
pub use sentence::Sentence;

/// Default API port (plain TCP).
pub const DEFAULT_PORT: u16 = 8728;
