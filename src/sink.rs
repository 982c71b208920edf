use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use std::io;

/// Events observable on a response sink.
///
/// Only [`Event::Drain`] receives special treatment by the interposer; every
/// other registration is handed to the underlying sink unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Backpressure has cleared; the destination can accept more bytes.
    Drain,
    /// The destination was closed by the peer.
    Close,
    /// All bytes have been flushed to the transport.
    Finish,
    /// The destination surfaced an error.
    Error,
}

/// Callback invoked when a subscribed [`Event`] fires.
pub type Listener = Box<dyn FnMut()>;

/// The underlying byte-accepting destination of one response.
///
/// The surrounding server owns the concrete implementation; this crate only
/// wraps its `write`/`end`/`on` operations for the lifetime of a single
/// response. [`CompressionSink`](crate::CompressionSink) implements the same
/// trait, making the interposer a drop-in decorator.
///
/// Implementations are single-threaded and event-driven: `write` never
/// blocks, and event listeners are dispatched from the event loop rather
/// than re-entrantly from inside `write` or `end`.
pub trait ResponseSink {
    /// Writes a body chunk.
    ///
    /// Returns `Ok(false)` when the destination cannot currently accept more
    /// bytes (the chunk is still taken) or when the response has already
    /// ended; the producer is expected to pause until [`Event::Drain`] fires.
    fn write(&mut self, chunk: Bytes) -> io::Result<bool>;

    /// Finalizes the response, optionally writing one last chunk.
    ///
    /// Returns `Ok(false)` when the response had already ended; a second
    /// completion is never signaled.
    fn end(&mut self, chunk: Option<Bytes>) -> io::Result<bool>;

    /// Subscribes a listener to `event`.
    fn on(&mut self, event: Event, listener: Listener);

    /// Returns the current value of a response header, if set.
    fn header(&self, name: &HeaderName) -> Option<HeaderValue>;

    /// Sets a response header, replacing any existing value.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Removes a response header.
    fn remove_header(&mut self, name: &HeaderName);
}
