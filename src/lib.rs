//! Library entrypoint for artifact-fetch.
//!
//! The primary interface is the `artifact-fetch` binary, invoked by the build
//! as one step per artifact. The library target exposes the same operations
//! to integration tests.

pub mod config;
pub mod descriptor;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod marker;
pub mod output;
pub mod platform;

pub use config::{BinaryConfig, FetchConfig};
pub use error::FetchError;
pub use fetch::{FetchOutcome, fetch, fetch_binary};
