//! Typed object streaming, sugar over [`StreamText`] with an Object or
//! Array output specification derived from the target type.

use crate::error::EngineError;
use crate::output::OutputSpec;
use crate::prompt::Prompt;
use crate::prompt::call_settings::{CallSettings, TimeoutConfig};
use crate::stream_text::stream_text_result::AsyncIterableStream;
use crate::stream_text::{StreamStatus, StreamText, StreamTextResult};
use futures_util::StreamExt;
use genloop_provider::{FinishReason, LanguageModel, ProviderOptions, Usage};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Whether the stream produces one object or a sequence of elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectMode {
    Object,
    Array,
}

/// Builder for streaming a typed object.
///
/// Use [`StreamObject::new`] to stream a single object of type `T`, or
/// [`StreamObject::array`] to stream an array whose *elements* are `T`
/// (enabling [`ObjectStream::elements`]).
pub struct StreamObject<T>
where
    T: DeserializeOwned + JsonSchema + Send + 'static,
{
    builder: StreamText,
    mode: ObjectMode,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StreamObject<T>
where
    T: DeserializeOwned + JsonSchema + Send + 'static,
{
    /// Streams a single object of type `T`.
    pub fn new(model: Arc<dyn LanguageModel>, prompt: impl Into<Prompt>) -> Self {
        Self {
            builder: StreamText::new(model, prompt).output(OutputSpec::object_of::<T>()),
            mode: ObjectMode::Object,
            _marker: PhantomData,
        }
    }

    /// Streams an array whose elements are `T`, element by element.
    pub fn array(model: Arc<dyn LanguageModel>, prompt: impl Into<Prompt>) -> Self {
        Self {
            builder: StreamText::new(model, prompt).output(OutputSpec::array_of::<T>()),
            mode: ObjectMode::Array,
            _marker: PhantomData,
        }
    }

    /// Sets the complete call settings.
    pub fn settings(mut self, settings: CallSettings) -> Self {
        self.builder = self.builder.settings(settings);
        self
    }

    /// Sets the system instructions.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.builder = self.builder.system(system);
        self
    }

    /// Sets the temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.builder = self.builder.temperature(temperature);
        self
    }

    /// Sets the maximum output tokens.
    pub fn max_output_tokens(mut self, max_tokens: u32) -> Self {
        self.builder = self.builder.max_output_tokens(max_tokens);
        self
    }

    /// Sets the sampling seed.
    pub fn seed(mut self, seed: u32) -> Self {
        self.builder = self.builder.seed(seed);
        self
    }

    /// Sets the cancellation signal.
    pub fn abort_signal(mut self, signal: CancellationToken) -> Self {
        self.builder = self.builder.abort_signal(signal);
        self
    }

    /// Sets the deadline configuration.
    pub fn timeout(mut self, timeouts: TimeoutConfig) -> Self {
        self.builder = self.builder.timeout(timeouts);
        self
    }

    /// Sets namespaced provider options.
    pub fn provider_options(mut self, options: ProviderOptions) -> Self {
        self.builder = self.builder.provider_options(options);
        self
    }

    /// Starts the stream.
    pub async fn execute(self) -> Result<ObjectStream<T>, EngineError> {
        let result = self.builder.execute().await?;

        // The raw chunk channel has no consumer in the typed surface;
        // drain it so the worker never stalls on backpressure.
        let mut chunks = result.chunks();
        tokio::spawn(async move { while chunks.next().await.is_some() {} });

        Ok(ObjectStream {
            result,
            mode: self.mode,
            _marker: PhantomData,
        })
    }
}

/// A running typed object stream.
pub struct ObjectStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    result: StreamTextResult,
    mode: ObjectMode,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ObjectStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// The latest partial object, when the accumulated text already
    /// deserializes into `T`.
    pub fn partial_object(&self) -> Option<T> {
        self.result
            .partial_output()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// The latest partial output as raw JSON.
    pub fn partial_value(&self) -> Option<serde_json::Value> {
        self.result.partial_output()
    }

    /// The typed element stream of an array-mode run.
    ///
    /// Yields `(index, element)` pairs in order; empty in object mode.
    pub fn elements(&self) -> AsyncIterableStream<(usize, T)> {
        let inner = self.result.element_stream();
        Box::pin(inner.filter_map(|(index, value)| async move {
            serde_json::from_value::<T>(value).ok().map(|el| (index, el))
        }))
    }

    /// Waits for completion and returns the object of an object-mode run.
    pub async fn object(&self) -> Result<T, EngineError> {
        let value = self.final_value().await?;
        serde_json::from_value(value).map_err(|e| {
            EngineError::no_object_generated(
                format!("failed to deserialize output: {e}"),
                self.result.text(),
                self.result.usage(),
                self.result.finish_reason(),
                None,
            )
        })
    }

    /// Waits for completion and returns all elements of an array-mode run.
    pub async fn objects(&self) -> Result<Vec<T>, EngineError> {
        let value = self.final_value().await?;
        serde_json::from_value(value).map_err(|e| {
            EngineError::no_object_generated(
                format!("failed to deserialize elements: {e}"),
                self.result.text(),
                self.result.usage(),
                self.result.finish_reason(),
                None,
            )
        })
    }

    async fn final_value(&self) -> Result<serde_json::Value, EngineError> {
        self.result.wait().await;
        if let Some(error) = self.result.err() {
            return Err(error);
        }
        self.result.output().ok_or_else(|| {
            EngineError::no_object_generated(
                "stream produced no output value",
                self.result.text(),
                self.result.usage(),
                self.result.finish_reason(),
                None,
            )
        })
    }

    /// Whether this stream was started in array mode.
    pub fn is_array(&self) -> bool {
        self.mode == ObjectMode::Array
    }

    /// The accumulated raw text.
    pub fn text(&self) -> String {
        self.result.text()
    }

    /// The accumulated usage.
    pub fn usage(&self) -> Usage {
        self.result.usage()
    }

    /// The finish reason, once known.
    pub fn finish_reason(&self) -> FinishReason {
        self.result.finish_reason()
    }

    /// The current stream status.
    pub fn status(&self) -> StreamStatus {
        self.result.status()
    }

    /// The error slot.
    pub fn err(&self) -> Option<EngineError> {
        self.result.err()
    }

    /// Cancels the stream.
    pub fn close(&self) {
        self.result.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use genloop_provider::language_model::{BoxError, GenerateResponse, StreamResponse};
    use genloop_provider::{CallOptions, StreamChunk};
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
    struct Color {
        name: String,
        hex: String,
    }

    struct ChunkModel {
        chunks: Mutex<Option<Vec<Result<StreamChunk, BoxError>>>>,
    }

    impl ChunkModel {
        fn new(chunks: Vec<Result<StreamChunk, BoxError>>) -> Arc<Self> {
            Arc::new(Self {
                chunks: Mutex::new(Some(chunks)),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ChunkModel {
        fn provider(&self) -> &str {
            "test-provider"
        }
        fn model_id(&self) -> &str {
            "test-model"
        }
        async fn generate(&self, _options: CallOptions) -> Result<GenerateResponse, BoxError> {
            Err("no generate".into())
        }
        async fn stream(&self, _options: CallOptions) -> Result<StreamResponse, BoxError> {
            let chunks = self
                .chunks
                .lock()
                .unwrap()
                .take()
                .ok_or("stream already consumed")?;
            Ok(StreamResponse {
                stream: Box::new(futures_util::stream::iter(chunks)),
                request: None,
                response: None,
            })
        }
    }

    #[tokio::test]
    async fn test_object_mode() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta(r#"{"name": "red", "#)),
            Ok(StreamChunk::text_delta(r##""hex": "#ff0000"}"##)),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let stream = StreamObject::<Color>::new(model, Prompt::text("a color"))
            .execute()
            .await
            .unwrap();
        let color = stream.object().await.unwrap();

        assert_eq!(
            color,
            Color {
                name: "red".to_string(),
                hex: "#ff0000".to_string()
            }
        );
        assert!(!stream.is_array());
        assert_eq!(stream.status(), StreamStatus::Done);
    }

    #[tokio::test]
    async fn test_array_mode_streams_typed_elements() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta(
                r##"{"elements":[{"name":"red","hex":"#ff0000"},"##,
            )),
            Ok(StreamChunk::text_delta(
                r##"{"name":"blue","hex":"#0000ff"}]}"##,
            )),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let stream = StreamObject::<Color>::array(model, Prompt::text("two colors"))
            .execute()
            .await
            .unwrap();

        let elements: Vec<(usize, Color)> = stream.elements().collect().await;
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].0, 0);
        assert_eq!(elements[0].1.name, "red");
        assert_eq!(elements[1].0, 1);
        assert_eq!(elements[1].1.name, "blue");

        let all = stream.objects().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(stream.is_array());
    }

    #[tokio::test]
    async fn test_object_mode_parse_failure() {
        let model = ChunkModel::new(vec![
            Ok(StreamChunk::text_delta("nope")),
            Ok(StreamChunk::finish(FinishReason::Stop)),
        ]);

        let stream = StreamObject::<Color>::new(model, Prompt::text("a color"))
            .execute()
            .await
            .unwrap();
        let error = stream.object().await.unwrap_err();
        assert!(matches!(error, EngineError::NoObjectGenerated { .. }));
    }
}
