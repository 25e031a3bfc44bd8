//! Remote query contract for the mapsearch pipeline.
//!
//! The search core never talks HTTP directly. It builds a [`QueryRequest`],
//! hands it to a [`QueryTransport`] and interprets the [`QueryResponse`].
//! This crate owns that contract:
//!
//! - [`wire`]: request/response types, serialized with the field names the
//!   vector-data service uses (`Status`, `Result`, `ErrorInfo`, ...)
//! - [`HttpTransport`]: reqwest-backed transport (feature `http`, on by default)
//! - [`ScriptedTransport`]: in-memory transport answering from a script, used
//!   by tests and demos
//!
//! ```rust
//! use mapsearch_transport::{QueryRequest, QueryResponse, QueryTransport, ScriptedTransport};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let transport = ScriptedTransport::new();
//! transport.push_reply(QueryResponse::ok(vec!["fsc_id".into()], vec![vec!["A-1".into()]]));
//!
//! let response = transport.send(&QueryRequest::new("https://example.org/query")).await?;
//! assert!(!response.is_error());
//! # Ok::<(), mapsearch_transport::TransportError>(())
//! # }).unwrap();
//! ```

use async_trait::async_trait;

#[cfg(feature = "http")]
mod http;
mod scripted;
pub mod wire;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use scripted::ScriptedTransport;
pub use wire::{ErrorInfo, QueryRequest, QueryResponse, QueryRows, ResponseStatus};

mod error {
    use std::time::Duration;

    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum TransportError {
        #[cfg(feature = "http")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Malformed response body: {0}")]
        Decode(#[from] serde_json::Error),
        #[error("Request timed out after {0:?}")]
        Timeout(Duration),
        #[error("Endpoint unavailable: {0}")]
        Unavailable(String),
        #[error("Scripted transport has no replies left")]
        Exhausted,
    }

    pub type Result<T> = std::result::Result<T, TransportError>;
}

pub use error::{Result, TransportError};

/// An abstract request/response channel to the search backend.
///
/// Implementations must be cheap to share; the core holds them behind an `Arc`
/// and may issue several requests concurrently.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Send one query and wait for the service's reply.
    ///
    /// A reply with `Status: "error"` is still `Ok` here; only failures to
    /// obtain a well-formed reply are errors.
    async fn send(&self, request: &QueryRequest) -> Result<QueryResponse>;
}
