use crate::error::EngineError;
use crate::generate_text::step_result::StepResult;
use futures_util::Stream;
use genloop_provider::{CallWarning, FinishReason, StreamChunk, ToolCall, Usage};
use serde_json::Value;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// A boxed stream of items.
pub type AsyncIterableStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Where a streaming operation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// The request was sent; no chunk has arrived yet.
    Submitted,
    /// Chunks are arriving.
    Streaming,
    /// The stream has finished (successfully or not).
    Done,
}

/// Aggregate state maintained by the stream worker.
///
/// The worker is the sole mutator; readers access snapshots through the
/// mutex-guarded accessors on [`StreamTextResult`].
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    pub text: String,
    pub usage: Usage,
    pub warnings: Vec<CallWarning>,
    pub finish_reason: FinishReason,
    pub saw_finish: bool,
    pub context_management: Option<Value>,
    pub partial_output: Option<Value>,
    pub final_output: Option<Value>,
    pub tool_calls: Vec<ToolCall>,
    pub element_cursor: usize,
    pub error: Option<EngineError>,
    pub step: Option<StepResult>,
    pub raw_request: Option<Value>,
    pub raw_response: Option<Value>,
}

pub(crate) fn lock_state(state: &Mutex<StreamState>) -> MutexGuard<'_, StreamState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to a running text stream.
///
/// The stream is driven by the background worker; callers observe it
/// through two surfaces: the bounded chunk channel ([`Self::chunks`] /
/// [`Self::read_all`]) and the mutex-guarded aggregate accessors
/// ([`Self::text`], [`Self::partial_output`], ...). Chunk consumption is
/// single-consumer: the first call to `chunks()` or `read_all()` takes
/// the channel.
pub struct StreamTextResult {
    state: Arc<Mutex<StreamState>>,
    status_rx: watch::Receiver<StreamStatus>,
    chunks_rx: Mutex<Option<mpsc::Receiver<StreamChunk>>>,
    elements_rx: Mutex<Option<mpsc::UnboundedReceiver<(usize, Value)>>>,
    cancel: CancellationToken,
}

impl StreamTextResult {
    pub(crate) fn new(
        state: Arc<Mutex<StreamState>>,
        status_rx: watch::Receiver<StreamStatus>,
        chunks_rx: mpsc::Receiver<StreamChunk>,
        elements_rx: mpsc::UnboundedReceiver<(usize, Value)>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            status_rx,
            chunks_rx: Mutex::new(Some(chunks_rx)),
            elements_rx: Mutex::new(Some(elements_rx)),
            cancel,
        }
    }

    /// The current status of the stream.
    pub fn status(&self) -> StreamStatus {
        *self.status_rx.borrow()
    }

    /// Takes the chunk stream for consumption.
    ///
    /// Single-consumer: a second call yields an empty stream.
    pub fn chunks(&self) -> AsyncIterableStream<StreamChunk> {
        let receiver = self
            .chunks_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match receiver {
            Some(mut rx) => Box::pin(async_stream::stream! {
                while let Some(chunk) = rx.recv().await {
                    yield chunk;
                }
            }),
            None => Box::pin(futures_util::stream::empty()),
        }
    }

    /// Takes the element stream of an Array output.
    ///
    /// Yields `(index, element)` pairs in order, each element exactly
    /// once, with 0-based gapless indices. Empty for non-Array outputs.
    pub fn element_stream(&self) -> AsyncIterableStream<(usize, Value)> {
        let receiver = self
            .elements_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match receiver {
            Some(mut rx) => Box::pin(async_stream::stream! {
                while let Some(element) = rx.recv().await {
                    yield element;
                }
            }),
            None => Box::pin(futures_util::stream::empty()),
        }
    }

    /// Drains the stream to completion and returns the accumulated text.
    pub async fn read_all(&self) -> String {
        let receiver = self
            .chunks_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(mut rx) = receiver {
            while rx.recv().await.is_some() {}
        }
        self.wait().await;
        self.text()
    }

    /// Waits until the stream reaches [`StreamStatus::Done`].
    pub async fn wait(&self) {
        let mut rx = self.status_rx.clone();
        loop {
            if *rx.borrow_and_update() == StreamStatus::Done {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// The text accumulated so far.
    pub fn text(&self) -> String {
        lock_state(&self.state).text.clone()
    }

    /// The usage accumulated so far.
    pub fn usage(&self) -> Usage {
        lock_state(&self.state).usage.clone()
    }

    /// The finish reason, once a finish chunk has arrived.
    pub fn finish_reason(&self) -> FinishReason {
        lock_state(&self.state).finish_reason
    }

    /// The warnings collected so far.
    pub fn warnings(&self) -> Vec<CallWarning> {
        lock_state(&self.state).warnings.clone()
    }

    /// The tool calls buffered so far.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        lock_state(&self.state).tool_calls.clone()
    }

    /// The latest partial output value, when an output spec is configured.
    pub fn partial_output(&self) -> Option<Value> {
        lock_state(&self.state).partial_output.clone()
    }

    /// The complete parsed output, available once the stream is done.
    pub fn output(&self) -> Option<Value> {
        lock_state(&self.state).final_output.clone()
    }

    /// Opaque provider context-management info from the finish chunk.
    pub fn context_management(&self) -> Option<Value> {
        lock_state(&self.state).context_management.clone()
    }

    /// The step synthesized at EOF.
    pub fn step(&self) -> Option<StepResult> {
        lock_state(&self.state).step.clone()
    }

    /// The error slot. Accumulated data stays queryable alongside it.
    pub fn err(&self) -> Option<EngineError> {
        lock_state(&self.state).error.clone()
    }

    /// The raw request body, when retention asked for it.
    pub fn raw_request(&self) -> Option<Value> {
        lock_state(&self.state).raw_request.clone()
    }

    /// The raw response body, when retention asked for it.
    pub fn raw_response(&self) -> Option<Value> {
        lock_state(&self.state).raw_response.clone()
    }

    /// Cancels the worker and the underlying provider stream.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Acknowledges a live stream.
    ///
    /// Calling this on a finished stream is a programming error: it
    /// returns a failure and does not transition state.
    pub fn resume(&self) -> Result<(), EngineError> {
        if self.status() == StreamStatus::Done {
            return Err(EngineError::invalid_argument(
                "resume",
                "done",
                "cannot resume a stream that is already done",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_result() -> StreamTextResult {
        let state = Arc::new(Mutex::new(StreamState {
            text: "hello".to_string(),
            ..Default::default()
        }));
        let (status_tx, status_rx) = watch::channel(StreamStatus::Done);
        let (_chunks_tx, chunks_rx) = mpsc::channel(10);
        let (_elements_tx, elements_rx) = mpsc::unbounded_channel();
        drop(status_tx);
        StreamTextResult::new(
            state,
            status_rx,
            chunks_rx,
            elements_rx,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_resume_on_done_is_an_error() {
        let result = finished_result();
        assert!(result.resume().is_err());
        // No state transition happened.
        assert_eq!(result.status(), StreamStatus::Done);
    }

    #[test]
    fn test_accessors_snapshot_state() {
        let result = finished_result();
        assert_eq!(result.text(), "hello");
        assert_eq!(result.finish_reason(), FinishReason::Unknown);
        assert!(result.err().is_none());
    }

    #[tokio::test]
    async fn test_chunks_is_single_consumer() {
        let result = finished_result();
        let first = result.chunks();
        drop(first);
        // Second take yields an empty stream rather than panicking.
        use futures_util::StreamExt;
        let mut second = result.chunks();
        assert!(second.next().await.is_none());
    }
}
