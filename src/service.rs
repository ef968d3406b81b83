use crate::handler::{BoxError, Handler};
use crate::sink::ResponseBuffer;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::future::{Ready, ready};
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that runs a [`Handler`] against a buffered response.
///
/// Each call gets a fresh [`ResponseBuffer`]; the handler runs to completion
/// before the response is returned.
#[derive(Debug, Clone)]
pub struct HandlerService<H> {
    handler: H,
}

impl<H> HandlerService<H> {
    /// Creates a new service running the given handler.
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Returns a reference to the handler.
    pub fn inner(&self) -> &H {
        &self.handler
    }

    /// Returns a mutable reference to the handler.
    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consumes this service, returning the handler.
    pub fn into_inner(self) -> H {
        self.handler
    }
}

impl<H, ReqBody> Service<Request<ReqBody>> for HandlerService<H>
where
    H: Handler<ReqBody>,
{
    type Response = Response<Full<Bytes>>;
    type Error = BoxError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut buffer = ResponseBuffer::new();

        match self.handler.serve(&req, &mut buffer) {
            Ok(()) => ready(Ok(buffer.into_response())),
            Err(error) => {
                tracing::error!(
                    %error,
                    method = %req.method(),
                    uri = %req.uri(),
                    "handler failed"
                );
                ready(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::layer::CompressionLayer;
    use crate::sink::ResponseSink;
    use flate2::read::GzDecoder;
    use http::{StatusCode, header};
    use http_body_util::BodyExt;
    use std::io::{self, Read};
    use tower::{Layer, ServiceExt};

    fn hello(_req: &Request<()>, sink: &mut dyn ResponseSink) -> Result<(), BoxError> {
        sink.set_status(StatusCode::OK);
        sink.write_all(b"{\"message\":\"Hello world\"}\n")?;
        Ok(())
    }

    async fn body_bytes(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_compressed_response() {
        let service = HandlerService::new(CompressionLayer::new().layer(handler_fn(hello)));
        let req = Request::get("/helloworld")
            .header(header::ACCEPT_ENCODING, "gzip, deflate, br")
            .body(())
            .unwrap();

        let response = service.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );

        let body = body_bytes(response).await;
        let mut decoded = String::new();
        GzDecoder::new(&body[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "{\"message\":\"Hello world\"}\n");
    }

    #[tokio::test]
    async fn test_plain_response() {
        let service = HandlerService::new(CompressionLayer::new().layer(handler_fn(hello)));
        let req = Request::get("/helloworld").body(()).unwrap();

        let response = service.oneshot(req).await.unwrap();
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        assert_eq!(
            body_bytes(response).await,
            Bytes::from_static(b"{\"message\":\"Hello world\"}\n")
        );
    }

    #[tokio::test]
    async fn test_handler_error_returned() {
        let service = HandlerService::new(handler_fn(
            |_req: &Request<()>, _sink: &mut dyn ResponseSink| -> Result<(), BoxError> {
                Err(io::Error::other("boom").into())
            },
        ));
        let req = Request::get("/").body(()).unwrap();

        let err = service.oneshot(req).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
