use crate::encoding::Encoding;
use crate::error::Error;
use crate::sink::{Flush, ResponseSink};
use crate::sniff::detect_content_type;
use compression_codecs::EncodeV2;
use compression_core::util::{PartialBuffer, WriteBuffer};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use std::io;

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

/// Lifecycle of a compressed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriterState {
    /// `Content-Encoding` is set, no body bytes have been accepted yet.
    HeaderSet,
    /// The body has started; the one-time header fix-ups are done.
    Writing,
    /// The stream trailer has been written.
    Closed,
}

/// A response sink that compresses everything written to it.
///
/// The writer borrows the underlying sink for as long as it lives: headers
/// and status still go straight to the sink, while body bytes are streamed
/// through the encoder and reach the sink in compressed form.
///
/// The compressed stream is finished by [`close`](Self::close), or when the
/// writer is dropped, whichever comes first. Dropping covers early returns
/// and unwinding, so the client always receives a complete stream.
///
/// Built with [`Encoding::Identity`], the writer passes bytes straight to
/// the sink and leaves the headers alone.
pub struct CompressionWriter<'a, S: ResponseSink + ?Sized> {
    sink: &'a mut S,
    /// `None` for identity: bytes pass through untouched.
    encoder: Option<Box<dyn EncodeV2 + Send>>,
    output_buffer: Vec<u8>,
    state: WriterState,
}

impl<'a, S: ResponseSink + ?Sized> CompressionWriter<'a, S> {
    /// Starts a compressed response on `sink`.
    ///
    /// Sets `Content-Encoding` and adds `Accept-Encoding` to `Vary` before
    /// anything is written.
    ///
    /// # Panics
    ///
    /// Panics for [`Encoding::Deflate`] (see [`Encoding::encoder`]).
    pub fn new(sink: &'a mut S, encoding: Encoding) -> Self {
        let encoder = encoding.encoder();

        if let (Some(value), Some(_)) = (encoding.content_encoding(), &encoder) {
            let headers = sink.headers_mut();
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(value));
            add_vary_accept_encoding(headers);
        }

        Self {
            sink,
            encoder,
            output_buffer: vec![0u8; OUTPUT_BUFFER_SIZE],
            state: WriterState::HeaderSet,
        }
    }

    /// Finishes the compressed stream, writing the final block and trailer.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.begin_body(&[]);
        // Never retried, even if finishing fails part way.
        self.state = WriterState::Closed;

        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            let done = encoder.finish(&mut output).map_err(compress_error)?;
            let written = output.written_len();
            if written > 0 {
                self.sink
                    .write_all(&self.output_buffer[..written])
                    .map_err(Error::Sink)?;
            }
            if done {
                break;
            }
        }

        tracing::trace!("compressed stream closed");
        Ok(())
    }

    /// Returns the current lifecycle state.
    #[cfg(test)]
    pub(crate) fn state(&self) -> WriterState {
        self.state
    }

    /// Header fix-ups that must land before the first compressed byte.
    ///
    /// The content type is sniffed from the uncompressed bytes, and only
    /// once: later writes never revisit it.
    fn begin_body(&mut self, first_chunk: &[u8]) {
        if self.state != WriterState::HeaderSet {
            return;
        }
        self.state = WriterState::Writing;
        if self.encoder.is_none() {
            return;
        }

        let headers = self.sink.headers_mut();
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(detect_content_type(first_chunk)),
            );
        }
        // These describe the uncompressed body.
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::ACCEPT_RANGES);
    }

    /// Compresses a chunk of input data, writing any output to the sink.
    fn compress_chunk(&mut self, input: &[u8]) -> Result<(), Error> {
        // The encoder rejects a call with nothing to consume.
        if input.is_empty() {
            return Ok(());
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return self.sink.write_all(input).map_err(Error::Sink);
        };
        let mut input_buf = PartialBuffer::new(input);

        // Keep encoding until all input is consumed
        loop {
            let consumed = input_buf.written_len();
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());

            encoder
                .encode(&mut input_buf, &mut output)
                .map_err(compress_error)?;

            let written = output.written_len();
            if written > 0 {
                self.sink
                    .write_all(&self.output_buffer[..written])
                    .map_err(Error::Sink)?;
            }

            if input_buf.written_len() >= input.len() {
                return Ok(());
            }

            if written == 0 && input_buf.written_len() == consumed {
                return Err(Error::Compress(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "encoder made no progress",
                )));
            }
        }
    }

    /// Forces buffered compressed data out to the sink as a complete block.
    fn flush_encoder(&mut self) -> Result<(), Error> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            let done = encoder.flush(&mut output).map_err(compress_error)?;
            let written = output.written_len();
            if written > 0 {
                self.sink
                    .write_all(&self.output_buffer[..written])
                    .map_err(Error::Sink)?;
            }
            if done {
                return Ok(());
            }
        }
    }

    fn write_body(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if self.state == WriterState::Closed {
            return Err(Error::Closed);
        }
        self.begin_body(buf);
        self.compress_chunk(buf)?;
        Ok(buf.len())
    }

    fn flush_body(&mut self) -> Result<(), Error> {
        if self.state == WriterState::Closed {
            return Err(Error::Closed);
        }
        self.begin_body(&[]);
        self.flush_encoder()?;
        if let Some(flusher) = self.sink.flusher() {
            flusher.flush().map_err(Error::Sink)?;
        }
        tracing::trace!("compressed stream flushed");
        Ok(())
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for CompressionWriter<'_, S> {
    fn status(&self) -> StatusCode {
        self.sink.status()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.sink.set_status(status);
    }

    fn headers(&self) -> &HeaderMap {
        self.sink.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.sink.headers_mut()
    }

    /// Compresses `buf` into the sink, returning the uncompressed length.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_body(buf)?)
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }
}

impl<S: ResponseSink + ?Sized> Flush for CompressionWriter<'_, S> {
    /// Flushes the encoder, then the underlying sink if it can flush.
    /// The stream stays open.
    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_body()?)
    }
}

impl<S: ResponseSink + ?Sized> Drop for CompressionWriter<'_, S> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(%error, "failed to finish compressed response");
        }
    }
}

impl<S: ResponseSink + ?Sized> std::fmt::Debug for CompressionWriter<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionWriter")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn compress_error<E>(e: E) -> Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Error::Compress(io::Error::other(e))
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v.eq_ignore_ascii_case("*") || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(header::VARY, HeaderValue::from_static("accept-encoding"));
}
