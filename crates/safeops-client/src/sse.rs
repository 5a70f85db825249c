//! Server-sent-event subscription.
//!
//! A subscription is a spawned task that decodes `data:` frames into JSON
//! values and hands them to a callback in arrival order. There is no
//! reconnect: a transport error or end of stream ends the subscription.

use std::fmt::Display;
use std::pin::pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetch::Fetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseClosed {
    Cancelled,
    EndOfStream,
    TransportError(String),
    ConnectFailed(String),
}

/// Owner of a running subscription.
#[derive(Debug)]
pub struct SseHandle {
    cancel: CancellationToken,
    task: JoinHandle<SseClosed>,
}

impl SseHandle {
    /// Stops delivery. No new callback starts once the task observes the
    /// cancellation, but one already in flight on another worker may finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn closed(self) -> SseClosed {
        match self.task.await {
            Ok(reason) => reason,
            Err(err) => SseClosed::TransportError(err.to_string()),
        }
    }
}

pub fn consume_sse<F>(
    fetcher: &Fetcher,
    url: impl Into<String>,
    mut on_message: F,
    cancel: CancellationToken,
) -> SseHandle
where
    F: FnMut(Value) + Send + 'static,
{
    let fetcher = fetcher.with_cancel(cancel.clone());
    let url = url.into();
    let stream_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        let response = match fetcher.open_stream(&url).await {
            Ok(response) => response,
            Err(FetchError::Cancelled) => return SseClosed::Cancelled,
            Err(err) => {
                warn!(%url, error = %err, "event stream connect failed");
                return SseClosed::ConnectFailed(err.to_string());
            }
        };

        info!(%url, "event stream opened");
        let closed = drive_events(response.bytes_stream(), &mut on_message, &stream_cancel).await;
        info!(%url, reason = ?closed, "event stream closed");
        closed
    });

    SseHandle { cancel, task }
}

/// Decodes `stream` until it ends, fails, or `cancel` fires. Payloads that
/// are not valid JSON are logged and skipped.
pub async fn drive_events<S, E, F>(
    stream: S,
    on_message: &mut F,
    cancel: &CancellationToken,
) -> SseClosed
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
    F: FnMut(Value),
{
    let mut stream = pin!(stream);
    let mut decoder = EventDecoder::default();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return SseClosed::Cancelled,
            next = stream.next() => next,
        };

        let chunk = match next {
            None => return SseClosed::EndOfStream,
            Some(Err(err)) => return SseClosed::TransportError(err.to_string()),
            Some(Ok(chunk)) => chunk,
        };

        for payload in decoder.push(&chunk) {
            if cancel.is_cancelled() {
                return SseClosed::Cancelled;
            }
            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => on_message(value),
                Err(err) => warn!(error = %err, "dropping malformed event payload"),
            }
        }
    }
}

/// Longest line the decoder buffers before discarding it.
const MAX_LINE_BYTES: usize = 256 * 1024;

/// Line-oriented frame decoder. Lines end in `\n`, `\r\n` or a lone `\r`.
/// Only `data` payloads of unnamed or `message` events are emitted.
#[derive(Debug, Default)]
struct EventDecoder {
    line: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    after_cr: bool,
    overlong: bool,
    discard_frame: bool,
}

impl EventDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut ready = Vec::new();

        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\r' | b'\n' => {
                    self.after_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if std::mem::take(&mut self.overlong) {
                        continue;
                    }
                    if let Some(payload) = self.process_line(&line) {
                        ready.push(payload);
                    }
                }
                _ if self.overlong => {}
                _ if self.line.len() >= MAX_LINE_BYTES => {
                    warn!(limit = MAX_LINE_BYTES, "discarding over-long event line");
                    self.line = Vec::new();
                    self.overlong = true;
                    self.discard_frame = true;
                }
                _ => self.line.push(byte),
            }
        }

        ready
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<String> {
        if raw.is_empty() {
            return self.dispatch();
        }
        if raw.starts_with(b":") {
            return None;
        }

        let line = String::from_utf8_lossy(raw);
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (&*line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let data = std::mem::take(&mut self.data);
        let event = self.event.take();
        if std::mem::take(&mut self.discard_frame) || data.is_empty() {
            return None;
        }
        match event.as_deref() {
            None | Some("" | "message") => Some(data.join("\n")),
            Some(name) => {
                debug!(event = name, "skipping named event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{Router, http::header, routing::get};
    use futures_util::stream;
    use serde_json::json;
    use tokio::net::TcpListener;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, Infallible>> + use<> {
        let owned: Vec<_> =
            parts.iter().map(|part| Ok(Bytes::from_static(part.as_bytes()))).collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn delivers_valid_payloads_in_order_and_skips_malformed() {
        let source = chunks(&[
            "data: {\"progress\":10}\n\n",
            "data: not-json\n\n",
            "data: {\"progress\":20}\n\n",
        ]);
        let mut seen = Vec::new();

        let closed =
            drive_events(source, &mut |value| seen.push(value), &CancellationToken::new()).await;

        assert_eq!(closed, SseClosed::EndOfStream);
        assert_eq!(seen, vec![json!({ "progress": 10 }), json!({ "progress": 20 })]);
    }

    #[tokio::test]
    async fn reassembles_frames_split_across_chunks() {
        let source = chunks(&[
            ": keep-alive\r\n",
            "id: 7\r\ndata: {\"progress\":",
            "42}\r\n\r\ndata: [1,\ndata: 2]\n\n",
        ]);
        let mut seen = Vec::new();

        drive_events(source, &mut |value| seen.push(value), &CancellationToken::new()).await;

        assert_eq!(seen, vec![json!({ "progress": 42 }), json!([1, 2])]);
    }

    #[tokio::test]
    async fn named_events_are_not_delivered() {
        let source = chunks(&[
            "data: {\"progress\":10}\n\n",
            "event: heartbeat\ndata: {\"progress\":0}\n\n",
            "event: message\ndata: {\"progress\":30}\n\n",
        ]);
        let mut seen = Vec::new();

        drive_events(source, &mut |value| seen.push(value), &CancellationToken::new()).await;

        assert_eq!(seen, vec![json!({ "progress": 10 }), json!({ "progress": 30 })]);
    }

    #[tokio::test]
    async fn bare_carriage_returns_end_lines() {
        let source = chunks(&["data: 1\r\rdata: 2\r", "\n\r\n"]);
        let mut seen = Vec::new();

        drive_events(source, &mut |value| seen.push(value), &CancellationToken::new()).await;

        assert_eq!(seen, vec![json!(1), json!(2)]);
    }

    #[test]
    fn over_long_lines_are_dropped_without_growing_the_buffer() {
        let mut decoder = EventDecoder::default();

        assert!(decoder.push(b"data: ").is_empty());
        assert!(decoder.push(&vec![b'x'; MAX_LINE_BYTES * 2]).is_empty());
        assert!(decoder.line.len() <= MAX_LINE_BYTES);

        assert!(decoder.push(b"\n\n").is_empty());
        assert_eq!(decoder.push(b"data: 3\n\n"), vec!["3".to_string()]);
    }

    #[tokio::test]
    async fn cancelled_before_first_event_delivers_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;

        let closed =
            drive_events(chunks(&["data: {}\n\n"]), &mut |_| calls += 1, &cancel).await;

        assert_eq!(closed, SseClosed::Cancelled);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn cancel_interrupts_an_idle_stream() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let idle = stream::pending::<Result<Bytes, Infallible>>();
        let closed = drive_events(idle, &mut |_| {}, &cancel).await;
        assert_eq!(closed, SseClosed::Cancelled);
    }

    #[tokio::test]
    async fn transport_errors_close_the_subscription() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"data: 1\n\n")),
            Err("connection reset"),
        ]);
        let mut seen = Vec::new();

        let closed =
            drive_events(source, &mut |value| seen.push(value), &CancellationToken::new()).await;

        assert_eq!(closed, SseClosed::TransportError("connection reset".to_string()));
        assert_eq!(seen, vec![json!(1)]);
    }

    #[tokio::test]
    async fn consumes_a_live_event_stream() {
        let router = Router::new().route(
            "/events",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    "data: {\"progress\":5}\n\ndata: {\"progress\":6}\n\n",
                )
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let fetcher = Fetcher::new(base, Duration::from_secs(1), CancellationToken::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = consume_sse(
            &fetcher,
            fetcher.url("/events"),
            move |value| sink.lock().unwrap().push(value),
            CancellationToken::new(),
        );

        assert_eq!(handle.closed().await, SseClosed::EndOfStream);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let fetcher =
            Fetcher::new("http://127.0.0.1:9", Duration::from_secs(1), CancellationToken::new());
        let handle =
            consume_sse(&fetcher, fetcher.url("/events"), |_| {}, CancellationToken::new());

        assert!(matches!(handle.closed().await, SseClosed::ConnectFailed(_)));
    }
}
