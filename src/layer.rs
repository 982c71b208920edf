use crate::error::ThresholdError;
use crate::gate::compressible;
use crate::interposer::CompressionSink;
use crate::sink::ResponseSink;
use compression_core::Level;
use http::{header, request};
use std::fmt;
use std::sync::Arc;

/// Default minimum body size for compression, in bytes.
pub const DEFAULT_THRESHOLD: u64 = 1024;

/// Predicate deciding whether a response is eligible for compression.
///
/// Receives the request head and the response sink as its headers stand at
/// header-commit time. Returning `false` forces pass-through.
pub type Filter = Arc<dyn Fn(&request::Parts, &dyn ResponseSink) -> bool + Send + Sync>;

/// Configuration for the compression interposer.
///
/// One layer is built at setup time and shared across responses; each call
/// to [`wrap`](CompressionLayer::wrap) installs the interposition for a
/// single response.
#[derive(Clone)]
pub struct CompressionLayer {
    threshold: u64,
    level: Level,
    filter: Filter,
}

impl CompressionLayer {
    /// Creates a new compression layer with default settings.
    ///
    /// The default threshold is 1024 bytes, the codec runs at its default
    /// level, and the default filter requires a compressible `Content-Type`.
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            level: Level::Default,
            filter: Arc::new(default_filter),
        }
    }

    /// Sets the minimum body size required for compression.
    ///
    /// Responses whose declared or estimated length is smaller than this
    /// value are passed through unchanged.
    pub fn threshold(mut self, bytes: u64) -> Self {
        self.threshold = bytes;
        self
    }

    /// Sets the threshold from a byte-size string such as `"512"`, `"1kb"`,
    /// or `"1.5mb"`.
    ///
    /// A malformed value fails construction; it is never defaulted.
    pub fn parse_threshold(mut self, value: &str) -> Result<Self, ThresholdError> {
        self.threshold = parse_byte_size(value)?;
        Ok(self)
    }

    /// Sets the compression level handed to the codec constructor.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Replaces the default compressibility filter.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&request::Parts, &dyn ResponseSink) -> bool + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Installs the interposer in front of `sink` for one response.
    ///
    /// The returned wrapper implements [`ResponseSink`] itself and replaces
    /// the sink in the response pipeline; application code writes to it
    /// without knowing whether a transform is active.
    pub fn wrap<S>(&self, request: request::Parts, sink: S) -> CompressionSink<S>
    where
        S: ResponseSink + 'static,
    {
        CompressionSink::new(
            sink,
            request,
            Arc::clone(&self.filter),
            self.threshold,
            self.level,
        )
    }
}

impl Default for CompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompressionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionLayer")
            .field("threshold", &self.threshold)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

/// The default filter: the response must declare a compressible Content-Type.
pub(crate) fn default_filter(_request: &request::Parts, sink: &dyn ResponseSink) -> bool {
    sink.header(&header::CONTENT_TYPE)
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .is_some_and(compressible)
}

/// Parses a byte-size string: a decimal number with an optional b/kb/mb/gb
/// suffix, case-insensitive.
fn parse_byte_size(value: &str) -> Result<u64, ThresholdError> {
    let trimmed = value.trim().to_ascii_lowercase();

    let unit_start = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(unit_start);

    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| ThresholdError::InvalidNumber(value.to_string()))?;
    if number < 0.0 {
        return Err(ThresholdError::Negative(value.to_string()));
    }

    let scale: u64 = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1024,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        _ => return Err(ThresholdError::UnknownUnit(value.to_string())),
    };

    Ok((number * scale as f64) as u64)
}
