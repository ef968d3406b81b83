use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;
use std::io;

/// Pushes buffered response data to the client.
///
/// This is an optional capability of a [`ResponseSink`], discovered through
/// [`ResponseSink::flusher`].
pub trait Flush {
    /// Flushes any buffered data to the client.
    fn flush(&mut self) -> io::Result<()>;
}

/// Where a handler writes its response.
///
/// Headers and status must be set before the first body write; a sink may
/// commit them to the client as soon as body bytes arrive.
pub trait ResponseSink {
    /// Returns the response status.
    fn status(&self) -> StatusCode;

    /// Sets the response status.
    fn set_status(&mut self, status: StatusCode);

    /// Returns the response headers.
    fn headers(&self) -> &HeaderMap;

    /// Returns the response headers for modification.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Writes part of the response body, returning how many bytes of `buf`
    /// were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Writes the whole of `buf` to the response body.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Returns the flush capability, if this sink has one.
    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        None
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn status(&self) -> StatusCode {
        (**self).status()
    }

    fn set_status(&mut self, status: StatusCode) {
        (**self).set_status(status)
    }

    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        (**self).flusher()
    }
}

/// An in-memory response sink.
///
/// Status and headers are committed by the first body write or flush, the
/// same way a network transport sends them ahead of the body. Changes made
/// afterwards are still visible through [`ResponseSink::headers`] but do not
/// reach the finished response.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: StatusCode,
    headers: HeaderMap,
    committed: Option<(StatusCode, HeaderMap)>,
    body: BytesMut,
    flushes: usize,
}

impl ResponseBuffer {
    /// Creates an empty `200 OK` response buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the body bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns whether status and headers have been committed.
    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// Returns the number of times the buffer was flushed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Consumes the buffer, returning the response as the client would see it.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let (status, headers) = self.committed.unwrap_or((self.status, self.headers));
        let mut response = Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    fn commit(&mut self) {
        if self.committed.is_none() {
            self.committed = Some((self.status, self.headers.clone()));
        }
    }
}

impl ResponseSink for ResponseBuffer {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commit();
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }
}

impl Flush for ResponseBuffer {
    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        self.flushes += 1;
        Ok(())
    }
}
