use crate::encoding::{Encoding, unsupported};
use crate::sink::ResponseSink;
use crate::writer::CompressionWriter;
use http::Request;
use std::fmt;

/// Boxed error returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Produces a response by writing it to a [`ResponseSink`].
pub trait Handler<B> {
    /// Handles `req`, writing headers and body to `sink`.
    fn serve(&self, req: &Request<B>, sink: &mut dyn ResponseSink) -> Result<(), BoxError>;
}

/// Returns a [`Handler`] that calls the given closure.
pub fn handler_fn<F, B>(f: F) -> HandlerFn<F>
where
    F: Fn(&Request<B>, &mut dyn ResponseSink) -> Result<(), BoxError>,
{
    HandlerFn { f }
}

/// A [`Handler`] implemented by a closure. See [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn")
            .field("f", &format_args!("{}", std::any::type_name::<F>()))
            .finish()
    }
}

impl<B, F> Handler<B> for HandlerFn<F>
where
    F: Fn(&Request<B>, &mut dyn ResponseSink) -> Result<(), BoxError>,
{
    fn serve(&self, req: &Request<B>, sink: &mut dyn ResponseSink) -> Result<(), BoxError> {
        (self.f)(req, sink)
    }
}

/// A handler that compresses the responses of an inner handler.
///
/// When the request's `Accept-Encoding` mentions `gzip`, the inner handler
/// writes through a [`CompressionWriter`]; otherwise it writes to the sink
/// directly.
///
/// # Panics
///
/// A request that offers `deflate` but not `gzip` panics, since deflate is
/// not implemented.
#[derive(Debug, Clone)]
pub struct CompressionHandler<H> {
    inner: H,
}

impl<H> CompressionHandler<H> {
    /// Creates a new compression handler wrapping the given inner handler.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    /// Returns a reference to the inner handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Returns a mutable reference to the inner handler.
    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    /// Consumes this handler, returning the inner handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H, B> Handler<B> for CompressionHandler<H>
where
    H: Handler<B>,
{
    fn serve(&self, req: &Request<B>, sink: &mut dyn ResponseSink) -> Result<(), BoxError> {
        match Encoding::from_headers(req.headers()) {
            Encoding::Identity => self.inner.serve(req, sink),
            Encoding::Deflate => unsupported(Encoding::Deflate),
            encoding @ Encoding::Gzip => {
                // Dropping the writer finishes the stream, so an early
                // return or a panic in the inner handler still leaves a
                // well-formed body behind.
                let mut writer = CompressionWriter::new(sink, encoding);
                self.inner.serve(req, &mut writer)?;
                writer.close()?;
                Ok(())
            }
        }
    }
}
