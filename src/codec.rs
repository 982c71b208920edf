use compression_codecs::{EncodeV2, deflate::DeflateEncoder, gzip::GzipEncoder};
use compression_core::Level;

/// Supported compression codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Codec {
    /// Gzip compression.
    Gzip,
    /// Deflate compression.
    Deflate,
}

impl Codec {
    /// Returns the Content-Encoding header value for this codec.
    pub(crate) fn content_encoding(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Deflate => "deflate",
        }
    }

    /// Creates a new encoder for this codec at the given level.
    pub(crate) fn encoder(&self, level: Level) -> Box<dyn EncodeV2 + Send> {
        match self {
            Codec::Gzip => Box::new(GzipEncoder::new(level.into())),
            Codec::Deflate => Box::new(DeflateEncoder::new(level.into())),
        }
    }
}

/// Negotiates a codec from the request's Accept-Encoding header.
///
/// The candidate set is `{gzip, deflate, identity}`. The header value is
/// expected to be comma-separated encodings with optional quality values
/// (e.g., "gzip, deflate;q=0.8"). `identity` is implicitly acceptable at the
/// lowest listed quality when not named, and a `*` wildcard stands in for any
/// candidate not named explicitly. Returns `None` when nothing is usable or
/// `identity` wins the negotiation.
///
/// Deflate is never chosen while gzip is acceptable at any positive quality.
pub(crate) fn negotiate(header: Option<&str>) -> Option<Codec> {
    let header = header?;

    let mut gzip: Option<f32> = None;
    let mut deflate: Option<f32> = None;
    let mut identity: Option<f32> = None;
    let mut wildcard: Option<f32> = None;
    let mut min_quality = 1.0f32;

    for part in header.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (encoding, quality) = parse_encoding_with_quality(part);
        min_quality = min_quality.min(quality);

        match encoding.to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => gzip = Some(quality),
            "deflate" => deflate = Some(quality),
            "identity" => identity = Some(quality),
            "*" => wildcard = Some(quality),
            _ => {}
        }
    }

    let q_gzip = gzip.or(wildcard).unwrap_or(0.0);
    let q_deflate = deflate.or(wildcard).unwrap_or(0.0);
    // identity is acceptable unless excluded, ranked below every explicitly
    // listed encoding of equal quality
    let q_identity = identity.or(wildcard).unwrap_or(min_quality);

    let (codec, quality) = if q_deflate > q_gzip {
        (Codec::Deflate, q_deflate)
    } else {
        (Codec::Gzip, q_gzip)
    };

    // we really don't prefer deflate
    let (codec, quality) = if codec == Codec::Deflate && q_gzip > 0.0 {
        (Codec::Gzip, q_gzip)
    } else {
        (codec, quality)
    };

    if quality <= 0.0 || quality < q_identity {
        return None;
    }

    Some(codec)
}

/// Parses an encoding entry like "gzip" or "deflate;q=0.8" into (encoding, quality).
fn parse_encoding_with_quality(s: &str) -> (&str, f32) {
    let mut parts = s.splitn(2, ';');
    let encoding = parts.next().unwrap_or("").trim();

    let quality = parts
        .next()
        .and_then(|q| {
            let q = q.trim();
            if q.starts_with("q=") || q.starts_with("Q=") {
                q[2..].parse::<f32>().ok()
            } else {
                None
            }
        })
        .unwrap_or(1.0);

    (encoding, quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_encoding() {
        assert_eq!(Codec::Gzip.content_encoding(), "gzip");
        assert_eq!(Codec::Deflate.content_encoding(), "deflate");
    }

    #[test]
    fn test_negotiate_simple() {
        assert_eq!(negotiate(Some("gzip")), Some(Codec::Gzip));
        assert_eq!(negotiate(Some("deflate")), Some(Codec::Deflate));
        assert_eq!(negotiate(Some("x-gzip")), Some(Codec::Gzip));
    }

    #[test]
    fn test_negotiate_absent_or_empty() {
        assert_eq!(negotiate(None), None);
        assert_eq!(negotiate(Some("")), None);
    }

    #[test]
    fn test_negotiate_prefers_gzip_over_deflate() {
        // Listed order does not matter when both are acceptable.
        assert_eq!(negotiate(Some("gzip, deflate")), Some(Codec::Gzip));
        assert_eq!(negotiate(Some("deflate, gzip")), Some(Codec::Gzip));
        // Even a higher deflate quality loses while gzip is acceptable.
        assert_eq!(negotiate(Some("deflate;q=1.0, gzip;q=0.5")), Some(Codec::Gzip));
    }

    #[test]
    fn test_negotiate_deflate_only() {
        assert_eq!(negotiate(Some("deflate;q=0.5")), Some(Codec::Deflate));
        assert_eq!(negotiate(Some("gzip;q=0, deflate")), Some(Codec::Deflate));
    }

    #[test]
    fn test_negotiate_quality_zero() {
        assert_eq!(negotiate(Some("gzip;q=0")), None);
        assert_eq!(negotiate(Some("gzip;q=0, deflate;q=0")), None);
        assert_eq!(negotiate(Some("*;q=0")), None);
    }

    #[test]
    fn test_negotiate_wildcard() {
        assert_eq!(negotiate(Some("*")), Some(Codec::Gzip));
        assert_eq!(negotiate(Some("*;q=0.5, deflate;q=1.0")), Some(Codec::Gzip));
    }

    #[test]
    fn test_negotiate_identity() {
        assert_eq!(negotiate(Some("identity")), None);
        // identity outranks a lower-quality codec
        assert_eq!(negotiate(Some("gzip;q=0.5, identity;q=1.0")), None);
        // but loses ties to an explicitly listed codec
        assert_eq!(negotiate(Some("identity, gzip")), Some(Codec::Gzip));
    }

    #[test]
    fn test_negotiate_unsupported_tokens_ignored() {
        assert_eq!(negotiate(Some("br, zstd")), None);
        assert_eq!(negotiate(Some("br, gzip")), Some(Codec::Gzip));
    }
}
