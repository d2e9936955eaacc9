//! Streaming bridge between the HTTP bodies and the adapter's pack exchange.
//!
//! The response side is a bounded channel: the adapter writes into a [`ResponseSink`]
//! (`AsyncWrite`) and the HTTP body is the receiving end. A slow client fills the channel and
//! parks the adapter's writes instead of buffering without bound.
//!
//! The request side is selected once, at the boundary: either the raw body reader or a gzip
//! decoding reader in front of it. Everything downstream only sees an `AsyncRead`.

use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use axum::body::Body;
use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tokio_util::sync::PollSender;

use crate::adapter::PackInput;

/// Largest chunk handed to the response body in one piece.
const MAX_CHUNK: usize = 64 * 1024;

/// Chunks buffered between the gzip decoder thread and the adapter.
const DECODE_CHANNEL_DEPTH: usize = 8;

type Chunk = io::Result<Bytes>;

/// Writing half of a streamed response body.
pub struct ResponseSink {
    sender: PollSender<Chunk>,
}

/// Reading half of a streamed response body; turn it into an HTTP body with [`PackStream::into_body`].
pub struct PackStream {
    receiver: mpsc::Receiver<Chunk>,
}

/// Handle used to terminate a streamed body with an error after the sink has been handed off.
#[derive(Clone)]
pub struct StreamAbort {
    sender: mpsc::Sender<Chunk>,
}

/// Create a bounded response stream holding at most `capacity` chunks in flight.
pub fn pack_channel(capacity: usize) -> (ResponseSink, PackStream, StreamAbort) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let abort = StreamAbort {
        sender: sender.clone(),
    };
    (
        ResponseSink {
            sender: PollSender::new(sender),
        },
        PackStream { receiver },
        abort,
    )
}

impl PackStream {
    pub fn into_body(self) -> Body {
        Body::from_stream(ReceiverStream::new(self.receiver))
    }

    /// Collect the remaining chunks, failing on the first error chunk.
    pub async fn collect(self) -> io::Result<Vec<u8>> {
        let mut stream = ReceiverStream::new(self.receiver);
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl StreamAbort {
    /// Push an error chunk so the transport aborts the response instead of ending it cleanly.
    pub async fn abort(&self, error: io::Error) {
        // The client may already be gone, in which case there is nobody left to tell.
        let _ = self.sender.send(Err(error)).await;
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "response body closed by client")
}

impl AsyncWrite for ResponseSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        ready!(self.sender.poll_reserve(cx)).map_err(|_| closed())?;
        let len = buf.len().min(MAX_CHUNK);
        self.sender
            .send_item(Ok(Bytes::copy_from_slice(&buf[..len])))
            .map_err(|_| closed())?;
        Poll::Ready(Ok(len))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.sender.close();
        Poll::Ready(Ok(()))
    }
}

/// Whether a `Content-Encoding` value asks for gzip decoding.
pub fn is_gzip(content_encoding: Option<&str>) -> bool {
    content_encoding.is_some_and(|encoding| encoding.contains("gzip"))
}

/// Adapt a request body into the exchange input, decompressing it when `gzip` is set.
///
/// Must be called from within a tokio runtime.
pub fn request_reader(body: Body, gzip: bool) -> PackInput {
    let raw = StreamReader::new(body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other)));
    if gzip {
        Box::new(gunzip(raw))
    } else {
        Box::new(raw)
    }
}

/// Decode a gzip stream on a blocking thread, handing decoded chunks back through a bounded
/// channel.
pub fn gunzip<R>(reader: R) -> impl AsyncRead + Send + Unpin + 'static
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel::<Chunk>(DECODE_CHANNEL_DEPTH);
    let bridge = SyncIoBridge::new(reader);
    tokio::task::spawn_blocking(move || {
        let mut decoder = MultiGzDecoder::new(bridge);
        let mut buf = vec![0u8; MAX_CHUNK];
        loop {
            match decoder.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("gzip request body could not be decoded: {}", e);
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });
    StreamReader::new(ReceiverStream::new(rx))
}
