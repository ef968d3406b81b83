use compression_codecs::{EncodeV2, gzip::GzipEncoder};
use compression_core::Level;
use http::{HeaderMap, header};

/// The content-coding negotiated for a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// No compression, the handler writes straight to the sink.
    Identity,
    /// Gzip compression.
    Gzip,
    /// Deflate compression. Advertised by many clients but not implemented.
    Deflate,
}

impl Encoding {
    /// Chooses an encoding from a raw `Accept-Encoding` value.
    ///
    /// Tokens are matched by substring containment and quality values are not
    /// parsed. `gzip` is checked before `deflate`, so a client offering both
    /// gets gzip.
    ///
    /// The value is searched as raw bytes, so a header carrying non-ASCII
    /// tokens still negotiates.
    pub fn from_accept_encoding(header: impl AsRef<[u8]>) -> Encoding {
        let header = header.as_ref();
        if contains_token(header, b"gzip") {
            Encoding::Gzip
        } else if contains_token(header, b"deflate") {
            Encoding::Deflate
        } else {
            Encoding::Identity
        }
    }

    /// Chooses an encoding from the request headers.
    ///
    /// A missing `Accept-Encoding` selects [`Encoding::Identity`].
    pub fn from_headers(headers: &HeaderMap) -> Encoding {
        let encoding = headers
            .get(header::ACCEPT_ENCODING)
            .map_or(Encoding::Identity, |v| Encoding::from_accept_encoding(v.as_bytes()));

        tracing::debug!(?encoding, "negotiated response encoding");
        encoding
    }

    /// Returns the Content-Encoding header value for this encoding.
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Encoding::Identity => None,
            Encoding::Gzip => Some("gzip"),
            Encoding::Deflate => Some("deflate"),
        }
    }

    /// Creates a new streaming encoder for this encoding.
    ///
    /// Returns `None` for [`Encoding::Identity`], which writes bytes as-is.
    ///
    /// # Panics
    ///
    /// Panics for [`Encoding::Deflate`], which is not implemented.
    pub fn encoder(&self) -> Option<Box<dyn EncodeV2 + Send>> {
        match self {
            Encoding::Identity => None,
            Encoding::Gzip => Some(Box::new(GzipEncoder::new(Level::Default.into()))),
            Encoding::Deflate => unsupported(*self),
        }
    }
}

fn contains_token(haystack: &[u8], token: &[u8]) -> bool {
    haystack.windows(token.len()).any(|w| w == token)
}

/// Aborts the current request: the client asked for an encoding this crate
/// advertises but cannot produce.
#[cold]
#[track_caller]
pub(crate) fn unsupported(encoding: Encoding) -> ! {
    tracing::error!(?encoding, "unsupported content-encoding requested");
    panic!("{encoding:?} content-encoding is not implemented")
}
