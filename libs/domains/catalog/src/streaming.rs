//! Incremental recommendation streaming.
//!
//! A generation session is relayed through a bounded channel by a producer task.
//! The consumer side waits a bounded time for every fragment and wraps the
//! fragments into [`StreamEvent`]s, guaranteeing exactly one terminal event.
//!
//! ```text
//!  TextGenerator stream ──► producer task ──mpsc──► FragmentRelay ──► StreamSession ──► SSE
//!                              ▲                         │
//!                              └──────── abort on drop ──┘
//! ```

use std::future::Future;
use std::time::Duration;

use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{CatalogError, CatalogResult, RECOMMEND_UNAVAILABLE};

pub const DEFAULT_FRAGMENT_TIMEOUT: Duration = Duration::from_secs(60);

const RELAY_CAPACITY: usize = 32;

/// Fragments produced by a text generation session
pub type FragmentStream = BoxStream<'static, CatalogResult<String>>;

/// Event delivered to streaming clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Error(String),
}

#[derive(Serialize)]
struct WireEvent<'a> {
    event: &'static str,
    data: &'a str,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Delta(_) => "delta",
            StreamEvent::Done => "done",
            StreamEvent::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Delta(_))
    }

    /// `{"event": "...", "data": "..."}` as sent in an SSE `data:` line
    pub fn to_json(&self) -> String {
        let data = match self {
            StreamEvent::Delta(text) | StreamEvent::Error(text) => text.as_str(),
            StreamEvent::Done => "",
        };
        // Two plain string fields always serialize
        serde_json::to_string(&WireEvent {
            event: self.name(),
            data,
        })
        .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    Emitting,
    Terminated,
}

/// Event sequencer: `Open -> Emitting* -> Terminated`.
///
/// Every method returns the event to emit, or `None` once the session is terminated.
#[derive(Debug)]
pub struct StreamSession {
    state: SessionState,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Open,
        }
    }

    pub fn delta(&mut self, fragment: String) -> Option<StreamEvent> {
        match self.state {
            SessionState::Terminated => None,
            SessionState::Open | SessionState::Emitting => {
                self.state = SessionState::Emitting;
                Some(StreamEvent::Delta(fragment))
            }
        }
    }

    pub fn done(&mut self) -> Option<StreamEvent> {
        self.terminate(StreamEvent::Done)
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Option<StreamEvent> {
        self.terminate(StreamEvent::Error(message.into()))
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    fn terminate(&mut self, event: StreamEvent) -> Option<StreamEvent> {
        if self.is_terminated() {
            return None;
        }
        self.state = SessionState::Terminated;
        Some(event)
    }
}

/// Bounded producer/consumer relay around a fragment stream.
///
/// Dropping the relay aborts the producer task and with it the underlying generation call.
pub struct FragmentRelay {
    rx: mpsc::Receiver<CatalogResult<String>>,
    producer: JoinHandle<()>,
    producer_finished: bool,
    fragment_timeout: Duration,
}

impl FragmentRelay {
    pub fn spawn(mut source: FragmentStream, fragment_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(RELAY_CAPACITY);

        let producer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = tx.closed() => break,
                    item = source.next() => match item {
                        Some(item) => {
                            let failed = item.is_err();
                            if tx.send(item).await.is_err() || failed {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            rx,
            producer,
            producer_finished: false,
            fragment_timeout,
        }
    }

    /// Next fragment, or `Ok(None)` once the source ended cleanly.
    ///
    /// Waiting longer than the fragment timeout is an error.
    pub async fn next_fragment(&mut self) -> CatalogResult<Option<String>> {
        match tokio::time::timeout(self.fragment_timeout, self.rx.recv()).await {
            Ok(Some(Ok(fragment))) => Ok(Some(fragment)),
            Ok(Some(Err(err))) => Err(err),
            Ok(None) => self.join_producer().await.map(|_| None),
            Err(_) => Err(CatalogError::StreamTimeout(self.fragment_timeout)),
        }
    }

    // Channel closed: distinguish a clean end from a panicked producer
    async fn join_producer(&mut self) -> CatalogResult<()> {
        if self.producer_finished {
            return Ok(());
        }
        self.producer_finished = true;
        (&mut self.producer).await?;
        Ok(())
    }
}

impl Drop for FragmentRelay {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

/// Drive a generation session into a sequence of [`StreamEvent`]s.
///
/// `open` performs everything that precedes the first fragment (lookups, the generation
/// request) and must complete within `fragment_timeout`. Its failure, a fragment error
/// or a timeout produce a single `Error` event
/// carrying a client-safe message; a clean end produces a single `Done`.
pub fn event_stream<F>(open: F, fragment_timeout: Duration) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    F: Future<Output = CatalogResult<FragmentStream>> + Send + 'static,
{
    async_stream::stream! {
        let mut session = StreamSession::new();

        // Setup up to the first fragment is held to the same bound as each fragment
        let opened = tokio::time::timeout(fragment_timeout, open)
            .await
            .unwrap_or(Err(CatalogError::StreamTimeout(fragment_timeout)));

        let source = match opened {
            Ok(source) => source,
            Err(err) => {
                log_stream_failure(&err);
                if let Some(event) = session.fail(err.client_message(RECOMMEND_UNAVAILABLE)) {
                    yield event;
                }
                return;
            }
        };

        let mut relay = FragmentRelay::spawn(source, fragment_timeout);

        while !session.is_terminated() {
            let event = match relay.next_fragment().await {
                Ok(Some(fragment)) => session.delta(fragment),
                Ok(None) => session.done(),
                Err(err) => {
                    log_stream_failure(&err);
                    session.fail(err.client_message(RECOMMEND_UNAVAILABLE))
                }
            };
            if let Some(event) = event {
                yield event;
            }
        }
    }
}

fn log_stream_failure(err: &CatalogError) {
    if err.is_client_error() {
        tracing::info!(error = %err, "recommendation stream rejected");
    } else {
        tracing::error!(error = %err, "recommendation stream failed");
    }
}
