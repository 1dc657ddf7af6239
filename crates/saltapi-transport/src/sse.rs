//! Server-push event stream decoding.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use saltapi_core::{ApiError, ByteStream, FleetEvent};
use tokio::{sync::mpsc, task::JoinHandle};

/// Events buffered between the reader task and the consumer.
const CHANNEL_CAPACITY: usize = 64;

/// One decoded server-push message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub id: Option<String>,
    pub retry: Option<u64>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

/// Incremental decoder: feed arbitrary chunks, get back complete messages.
///
/// Lines end with `\r\n`, `\n` or `\r`; an empty line ends a message.
/// A trailing partial line stays buffered until more arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already known to hold no line terminator.
    scanned: usize,
    /// The last terminator was a `\r` at the end of a chunk; a leading `\n`
    /// in the next chunk belongs to it.
    after_cr: bool,
    lines: Vec<String>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete message.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Vec<SseMessage> {
        if self.after_cr && !chunk.is_empty() {
            self.after_cr = false;
            chunk = chunk.strip_prefix(b"\n").unwrap_or(chunk);
        }
        self.buf.extend_from_slice(chunk);

        let mut messages = Vec::new();
        let mut consumed = 0;
        let mut pos = self.scanned;
        while let Some(offset) = self.buf[pos..]
            .iter()
            .position(|b| matches!(b, b'\r' | b'\n'))
        {
            let end = pos + offset;
            let width = match (self.buf[end], self.buf.get(end + 1)) {
                (b'\r', Some(b'\n')) => 2,
                (b'\r', None) => {
                    self.after_cr = true;
                    1
                }
                _ => 1,
            };

            let line = String::from_utf8_lossy(&self.buf[consumed..end]).into_owned();
            if line.is_empty() {
                let lines = std::mem::take(&mut self.lines);
                if let Some(msg) = parse_block(&lines) {
                    messages.push(msg);
                }
            } else {
                self.lines.push(line);
            }
            consumed = end + width;
            pos = consumed;
        }

        self.buf.drain(..consumed);
        self.scanned = self.buf.len();
        messages
    }

    /// Bytes received but not yet part of a complete message.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len() + self.lines.iter().map(|l| l.len() + 1).sum::<usize>()
    }
}

fn parse_block(lines: &[String]) -> Option<SseMessage> {
    let mut msg = SseMessage::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in lines {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "data" => data_lines.push(value),
            "event" => msg.event = Some(value.to_owned()),
            "id" => msg.id = Some(value.to_owned()),
            "retry" => msg.retry = value.trim().parse().ok(),
            _ => {}
        }
    }

    if data_lines.is_empty() && msg.event.is_none() && msg.id.is_none() && msg.retry.is_none() {
        return None;
    }
    msg.data = data_lines.join("\n");
    Some(msg)
}

/// Lazy, unbounded sequence of fleet events.
///
/// A reader task pulls chunks off the connection, decodes messages and
/// forwards parsed events. The sequence ends when the connection closes;
/// a connection or decode error is yielded once and then the sequence ends.
/// Dropping the stream aborts the reader and releases the connection.
pub struct EventStream {
    rx: mpsc::Receiver<Result<FleetEvent, ApiError>>,
    reader: JoinHandle<()>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("finished", &self.reader.is_finished())
            .finish_non_exhaustive()
    }
}

impl EventStream {
    /// Start consuming `body`. Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(body: ByteStream) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_loop(body, tx));
        Self { rx, reader }
    }

    /// Wait for the next event; `None` once the connection has closed.
    pub async fn next_event(&mut self) -> Option<Result<FleetEvent, ApiError>> {
        self.rx.recv().await
    }

    /// Stop reading and release the connection.
    pub fn close(&mut self) {
        self.reader.abort();
        self.rx.close();
    }
}

impl Stream for EventStream {
    type Item = Result<FleetEvent, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(mut body: ByteStream, tx: mpsc::Sender<Result<FleetEvent, ApiError>>) {
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("event stream connection error: {e}");
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        for msg in decoder.feed(&chunk) {
            if msg.data.is_empty() {
                continue;
            }
            match serde_json::from_str::<FleetEvent>(&msg.data) {
                Ok(event) => {
                    tracing::trace!(tag = %event.tag, "fleet event");
                    if tx.send(Ok(event)).await.is_err() {
                        return; // consumer gone
                    }
                }
                Err(e) => {
                    tracing::warn!("undecodable event payload: {e}");
                    let _ = tx.send(Err(ApiError::DecodeFailure(e))).await;
                    return;
                }
            }
        }
    }

    tracing::debug!(pending = decoder.pending(), "event stream closed");
}
