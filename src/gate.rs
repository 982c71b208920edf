use crate::codec::{self, Codec};
use crate::layer::Filter;
use crate::sink::ResponseSink;
use http::{Method, header, request};

/// Reports whether a MIME type is worth compressing.
///
/// This is the table behind the default filter predicate: `text/*`, the
/// common JSON/JavaScript/XML application types, and any type carrying a
/// `+json`, `+xml`, or `+text` structured-syntax suffix (which covers
/// `image/svg+xml`). Parameters such as `; charset=utf-8` are ignored.
pub fn compressible(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if mime.starts_with("text/") {
        return true;
    }

    matches!(
        mime.as_str(),
        "application/json"
            | "application/javascript"
            | "application/x-javascript"
            | "application/ecmascript"
            | "application/xml"
            | "application/xhtml+xml"
            | "application/rss+xml"
            | "application/atom+xml"
            | "application/manifest+json"
            | "application/wasm"
    ) || mime.ends_with("+json")
        || mime.ends_with("+xml")
        || mime.ends_with("+text")
}

/// Decides, exactly once per response, whether to compress.
///
/// Runs the short-circuit sequence over the request head and the response
/// headers as they stand at header-commit time. `estimated_length` is the
/// byte length of the first chunk handed to `write`/`end`, if any; an
/// unknown length never triggers the below-threshold rejection.
pub(crate) fn decide(
    request: &request::Parts,
    sink: &dyn ResponseSink,
    filter: &Filter,
    threshold: u64,
    estimated_length: Option<u64>,
) -> Option<Codec> {
    if !(filter.as_ref())(request, sink) {
        tracing::debug!("no compression: filtered");
        return None;
    }

    if sink
        .header(&header::CACHE_CONTROL)
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .is_some_and(no_transform)
    {
        tracing::debug!("no compression: no-transform directive");
        return None;
    }

    let declared_length = sink
        .header(&header::CONTENT_LENGTH)
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared_length
        .or(estimated_length)
        .is_some_and(|length| length < threshold)
    {
        tracing::debug!("no compression: size below threshold");
        return None;
    }

    if sink
        .header(&header::CONTENT_ENCODING)
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .is_some_and(|encoding| !encoding.eq_ignore_ascii_case("identity"))
    {
        tracing::debug!("no compression: already encoded");
        return None;
    }

    if request.method == Method::HEAD {
        tracing::debug!("no compression: HEAD request");
        return None;
    }

    let accept_encoding = request
        .headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok());
    let Some(codec) = codec::negotiate(accept_encoding) else {
        tracing::debug!("no compression: not acceptable");
        return None;
    };

    tracing::debug!(codec = codec.content_encoding(), "compressing response");
    Some(codec)
}

/// Rewrites response headers for a compressed body.
pub(crate) fn apply_compression_headers(sink: &mut dyn ResponseSink, codec: Codec) {
    add_vary_accept_encoding(sink);

    sink.set_header(
        header::CONTENT_ENCODING,
        header::HeaderValue::from_static(codec.content_encoding()),
    );

    // Compressed size is unknown
    sink.remove_header(&header::CONTENT_LENGTH);
}

/// Checks for a standalone `no-transform` directive in a Cache-Control value.
///
/// A case-sensitive token match over the comma-delimited directives, not a
/// full header-grammar parse.
fn no_transform(cache_control: &str) -> bool {
    cache_control
        .split(',')
        .any(|directive| directive.trim() == "no-transform")
}

/// Adds accept-encoding to the Vary header unless already covered.
fn add_vary_accept_encoding(sink: &mut dyn ResponseSink) {
    let existing = sink.header(&header::VARY);
    let Some(existing) = existing.as_ref().and_then(|v| v.to_str().ok()) else {
        sink.set_header(
            header::VARY,
            header::HeaderValue::from_static("accept-encoding"),
        );
        return;
    };

    let covered = existing.split(',').any(|v| {
        let v = v.trim();
        v == "*" || v.eq_ignore_ascii_case("accept-encoding")
    });
    if covered {
        return;
    }

    let combined = format!("{existing}, accept-encoding");
    if let Ok(value) = header::HeaderValue::try_from(combined) {
        sink.set_header(header::VARY, value);
    }
}
