//! Gzip compression for HTTP responses that are written incrementally.
//!
//! Handlers write their response into a [`ResponseSink`]. Wrapping a handler
//! in [`CompressionHandler`] (or applying [`CompressionLayer`]) swaps that
//! sink for a [`CompressionWriter`] whenever the client accepts gzip, so the
//! body is compressed as it is written.
//!
//! # Example
//!
//! ```ignore
//! use gzip_response_writer::{CompressionLayer, HandlerService, handler_fn};
//! use tower::ServiceBuilder;
//!
//! let service = HandlerService::new(
//!     ServiceBuilder::new()
//!         .layer(CompressionLayer::new())
//!         .service(handler_fn(my_handler)),
//! );
//! ```
//!
//! # Negotiation
//!
//! The `Accept-Encoding` header is searched for the substrings `gzip` and
//! `deflate`, in that order. Quality values are ignored.
//! - `gzip` anywhere: the response is gzip-compressed.
//! - `deflate` without `gzip`: the request panics, deflate is not implemented.
//! - neither: the handler writes straight to the sink.
//!
//! # Response Modifications
//!
//! When compression is applied:
//! - `Content-Encoding: gzip` is set before any body byte is written
//! - `Vary` includes `Accept-Encoding`
//! - `Content-Type` is sniffed from the first uncompressed write if the
//!   handler did not set one
//! - `Content-Length` and `Accept-Ranges` are removed
//!
//! The compressed stream is always finished, even when the handler returns
//! an error or panics part way through.

#![deny(missing_docs)]

mod encoding;
mod error;
mod handler;
mod layer;
mod service;
mod sink;
pub mod sniff;
mod writer;

pub use encoding::Encoding;
pub use error::Error;
pub use handler::{BoxError, CompressionHandler, Handler, HandlerFn, handler_fn};
pub use layer::CompressionLayer;
pub use service::HandlerService;
pub use sink::{Flush, ResponseBuffer, ResponseSink};
pub use writer::CompressionWriter;
