use std::io;
use thiserror::Error;

/// Errors raised by [`CompressionWriter`](crate::CompressionWriter) itself.
///
/// Failures of the underlying sink are not wrapped; they reach the caller
/// unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// The encoder rejected its input. The compressed stream cannot be
    /// resumed and the response should be treated as corrupt.
    #[error("compressor failed")]
    Compress(#[source] io::Error),
    /// The stream was already finished.
    #[error("compressed stream is closed")]
    Closed,
    /// The sink failed while accepting compressed output.
    #[error(transparent)]
    Sink(io::Error),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Sink(e) => e,
            err => io::Error::other(err),
        }
    }
}
