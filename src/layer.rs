use crate::handler::CompressionHandler;
use tower::Layer;

/// A Tower layer that gzip-compresses the responses of a [`Handler`].
///
/// The wrapped handler writes its response as usual; when the client
/// accepts gzip, the body is compressed on its way to the sink.
///
/// [`Handler`]: crate::Handler
#[derive(Debug, Clone, Default)]
pub struct CompressionLayer {
    _priv: (),
}

impl CompressionLayer {
    /// Creates a new compression layer.
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl<H> Layer<H> for CompressionLayer {
    type Service = CompressionHandler<H>;

    fn layer(&self, inner: H) -> Self::Service {
        CompressionHandler::new(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxError, Handler, handler_fn};
    use crate::sink::{ResponseBuffer, ResponseSink};
    use http::{Request, header};
    use tower::ServiceBuilder;

    #[test]
    fn test_layer_wraps_handler() {
        let handler = ServiceBuilder::new().layer(CompressionLayer::new()).service(handler_fn(
            |_req: &Request<()>, sink: &mut dyn ResponseSink| -> Result<(), BoxError> {
                sink.write_all(b"hello")?;
                Ok(())
            },
        ));

        let req = Request::get("/")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(())
            .unwrap();
        let mut sink = ResponseBuffer::new();
        handler.serve(&req, &mut sink).unwrap();

        assert_eq!(sink.headers()[header::CONTENT_ENCODING], "gzip");
        assert_ne!(sink.body(), b"hello");
    }
}
