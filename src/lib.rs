//! Streaming response-compression interposer for HTTP server pipelines.
//!
//! This crate sits between application code producing a response body and the
//! network transport. It wraps a response sink's `write`/`end`/event
//! registration operations and decides — once, at the moment response headers
//! are about to be committed — whether to reroute the outgoing byte stream
//! through a Gzip or Deflate transform chosen by content negotiation with the
//! client.
//!
//! # Example
//!
//! ```ignore
//! use http_sink_compression::{CompressionLayer, ResponseSink};
//!
//! let layer = CompressionLayer::new().threshold(1024);
//!
//! // Per response, wrap the server's sink before handing it to application code.
//! let mut response = layer.wrap(request_head, sink);
//! response.write(body_chunk)?;
//! response.end(None)?;
//! ```
//!
//! # Compression Rules
//!
//! The interposer will **not** compress a response when:
//! - The filter predicate rejects it (default: `Content-Type` must be present
//!   and compressible)
//! - `Cache-Control` carries a `no-transform` directive
//! - The declared or estimated body length is below the threshold (default: 1024 bytes)
//! - A `Content-Encoding` other than `identity` is already set
//! - The request method is `HEAD`
//! - Negotiation over `{gzip, deflate, identity}` yields nothing or `identity`
//!
//! When both gzip and deflate are acceptable, gzip is preferred regardless of
//! the client's ordering.
//!
//! # Response Modifications
//!
//! When compression is applied:
//! - `Content-Encoding` header is set to the negotiated codec
//! - `Content-Length` header is removed (compressed size is unknown)
//! - `Vary` header includes `accept-encoding`

#![deny(missing_docs)]

mod bridge;
mod codec;
mod error;
mod gate;
mod interposer;
mod layer;
mod sink;
mod transform;

pub use compression_core::Level;
pub use error::ThresholdError;
pub use gate::compressible;
pub use interposer::CompressionSink;
pub use layer::{CompressionLayer, DEFAULT_THRESHOLD, Filter};
pub use sink::{Event, Listener, ResponseSink};
