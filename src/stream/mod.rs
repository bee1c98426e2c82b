//! Pass-through stream interception.
//!
//! [`InterceptedStream`] sits between the upstream byte stream and the
//! client. Every chunk is forwarded unchanged and in order while a decoded
//! copy accumulates in a bounded capture buffer. What happens to the
//! capture depends on how the stream ends:
//!
//! | end state | client sees | commit hook |
//! |---|---|---|
//! | upstream finished | all chunks, then end | runs before end-of-stream |
//! | upstream error | chunks so far, then the error | never runs |
//! | dropped early (client gone) | n/a | never runs |
//!
//! Because the hook completes before end-of-stream is yielded, a client
//! that saw the whole body can immediately hit the cache for the same
//! message.

mod capture;
pub mod sse;

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{Stream, StreamExt};
use pin_project_lite::pin_project;
use tracing::debug;

use capture::Utf8Capture;
use crate::{Result, telemetry};

/// Default maximum number of bytes captured for caching (256 KiB).
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 256 * 1024;

/// Boxed byte stream, as produced by upstream providers.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// What a completed stream delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Answer text; `None` when it overflowed the capture or carried no
    /// decodable content.
    pub answer: Option<String>,
    /// Characters of answer text (bytes seen, when the capture overflowed).
    pub response_chars: usize,
}

impl Captured {
    fn from_capture(text: Option<String>, bytes_seen: usize) -> Self {
        let Some(text) = text else {
            return Self {
                answer: None,
                response_chars: bytes_seen,
            };
        };
        let answer = if sse::is_sse(&text) {
            sse::extract_content(&text)
        } else {
            text
        };
        if answer.is_empty() {
            return Self {
                answer: None,
                response_chars: 0,
            };
        }
        Self {
            response_chars: answer.chars().count(),
            answer: Some(answer),
        }
    }
}

/// Callback run once after the upstream stream completed normally.
pub type CommitHook = Box<dyn FnOnce(Captured) -> BoxFuture<'static, ()> + Send>;

pin_project! {
    /// Forwarding stream that captures its content and commits it on
    /// normal completion.
    pub struct InterceptedStream<S> {
        #[pin]
        inner: S,
        capture: Utf8Capture,
        hook: Option<CommitHook>,
        committing: Option<BoxFuture<'static, ()>>,
        finished: bool,
    }

    impl<S> PinnedDrop for InterceptedStream<S> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if !*this.finished {
                this.capture.discard();
                if this.hook.take().is_some() || this.committing.is_some() {
                    debug!("client went away before the stream completed, capture discarded");
                    metrics::counter!(telemetry::STREAMS_TOTAL, "outcome" => "disconnected")
                        .increment(1);
                }
            }
        }
    }
}

impl<S> InterceptedStream<S> {
    pub fn new(inner: S, hook: CommitHook) -> Self {
        Self {
            inner,
            capture: Utf8Capture::new(DEFAULT_MAX_CAPTURE_BYTES),
            hook: Some(hook),
            committing: None,
            finished: false,
        }
    }

    /// Stop buffering past `bytes` and commit the streamed sentinel instead.
    pub fn max_capture_bytes(mut self, bytes: usize) -> Self {
        self.capture = Utf8Capture::new(bytes);
        self
    }
}

impl<S> Stream for InterceptedStream<S>
where
    S: Stream<Item = Result<Bytes>>,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if let Some(commit) = this.committing.as_mut() {
            ready!(commit.as_mut().poll(cx));
            *this.committing = None;
            *this.finished = true;
            metrics::counter!(telemetry::STREAMS_TOTAL, "outcome" => "completed").increment(1);
            return Poll::Ready(None);
        }
        if *this.finished {
            return Poll::Ready(None);
        }

        match ready!(this.inner.as_mut().poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.capture.push(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                debug!(error = %e, "upstream stream failed, capture discarded");
                this.capture.discard();
                this.hook.take();
                *this.finished = true;
                metrics::counter!(telemetry::STREAMS_TOTAL, "outcome" => "failed").increment(1);
                Poll::Ready(Some(Err(e)))
            }
            None => {
                let captured = Captured::from_capture(this.capture.finish(), this.capture.bytes_seen());
                let Some(hook) = this.hook.take() else {
                    *this.finished = true;
                    return Poll::Ready(None);
                };
                let mut commit = hook(captured);
                match commit.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        *this.finished = true;
                        metrics::counter!(telemetry::STREAMS_TOTAL, "outcome" => "completed")
                            .increment(1);
                        Poll::Ready(None)
                    }
                    Poll::Pending => {
                        *this.committing = Some(commit);
                        Poll::Pending
                    }
                }
            }
        }
    }
}

/// Turn a failing byte stream into an infallible one for an HTTP body.
///
/// The first error is replaced by an [`sse::error_event`] carrying its
/// public message and the body ends there. Upstream details stay in the log.
pub fn in_band_errors<S>(
    stream: S,
) -> impl Stream<Item = std::result::Result<Bytes, std::convert::Infallible>> + Send + 'static
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
{
    futures_util::stream::unfold(Some(stream), |state| async move {
        let mut stream = state?;
        match stream.next().await? {
            Ok(chunk) => Some((Ok(chunk), Some(stream))),
            Err(e) => {
                tracing::warn!(error = %e, "stream aborted mid-flight");
                Some((Ok(sse::error_event(&e.public_message())), None))
            }
        }
    })
}
