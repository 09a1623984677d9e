//! The tool-augmented response loop.

use std::sync::Arc;
use std::time::Instant;
use alterego_core::error::{Error, ProviderError};
use alterego_core::event::{DomainEvent, EventBus};
use alterego_core::message::{Message, MessageToolCall};
use alterego_core::persona::Persona;
use alterego_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, Usage};
use alterego_core::tool::{ToolCall, ToolRegistry, ToolResult};
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default cap on tool-resolution rounds per turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// Answers visitor messages in character, running requested tools along the way.
///
/// Holds only shared, immutable collaborators; each turn builds its own
/// message sequence, so one loop can serve many conversations at once.
pub struct ResponseLoop {
    /// The chat completion service
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Optional response-length cap
    max_tokens: Option<u32>,

    /// Tools the model may call
    tools: Arc<ToolRegistry>,

    /// Who the model speaks as
    persona: Arc<Persona>,

    /// Maximum tool-resolution rounds per turn
    max_tool_rounds: u32,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

/// Outcome of the tool-resolution phase.
struct Resolved {
    response: ProviderResponse,
    rounds: u32,
}

enum StreamState {
    Resolving(Vec<Message>),
    Streaming {
        rx: ChunkReceiver,
        text: String,
        rounds: u32,
    },
    Finished,
}

impl ResponseLoop {
    /// Create a new response loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        persona: Arc<Persona>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            persona,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            event_bus,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the length of each response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of tool-resolution rounds.
    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.max_tool_rounds = max;
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// The sequence sent on the first call: system prompt, history verbatim, new input.
    pub fn build_messages(&self, user_message: &str, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.persona.system_prompt()));
        messages.extend_from_slice(history);
        messages.push(Message::user(user_message));
        messages
    }

    /// Answer one visitor message and return the final text.
    pub async fn respond(
        &self,
        user_message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        info!(history = history.len(), "Processing turn");

        let mut messages = self.build_messages(user_message, history);
        let resolved = self.resolve_tools(&mut messages, cancel).await?;

        self.record_response(&resolved.response.model, resolved.response.usage.as_ref(), resolved.rounds);
        Ok(resolved.response.message.content)
    }

    /// Answer one visitor message as a stream of growing prefixes of the answer.
    ///
    /// Nothing happens until the stream is polled. Tool calls are resolved with
    /// non-streaming requests first; the final answer is then requested again
    /// in streaming mode without tool schemas. The last item is the full answer.
    /// An error ends the stream.
    pub fn respond_streaming<'a>(
        &'a self,
        user_message: &str,
        history: &[Message],
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<String, Error>> {
        let initial = StreamState::Resolving(self.build_messages(user_message, history));

        stream::unfold(initial, move |state| {
            let cancel = cancel.clone();
            async move {
                match state {
                    StreamState::Finished => None,
                    StreamState::Resolving(messages) => match self.open_stream(messages, &cancel).await {
                        Ok((rx, rounds)) => {
                            self.next_prefix(rx, String::new(), rounds, &cancel).await
                        }
                        Err(e) => Some((Err(e), StreamState::Finished)),
                    },
                    StreamState::Streaming { rx, text, rounds } => {
                        self.next_prefix(rx, text, rounds, &cancel).await
                    }
                }
            }
        })
        .boxed()
    }

    /// Resolve tool calls, then request the final answer in streaming mode.
    async fn open_stream(
        &self,
        mut messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<(ChunkReceiver, u32), Error> {
        info!(messages = messages.len(), "Processing streaming turn");
        let resolved = self.resolve_tools(&mut messages, cancel).await?;

        let request = self.request(messages, true);
        let rx = cancellable(cancel, self.provider.stream(request)).await?;
        Ok((rx, resolved.rounds))
    }

    /// Read chunks until the answer grows, the stream ends, or the turn is cancelled.
    async fn next_prefix(
        &self,
        mut rx: ChunkReceiver,
        mut text: String,
        rounds: u32,
        cancel: &CancellationToken,
    ) -> Option<(Result<String, Error>, StreamState)> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Some((Err(Error::Cancelled), StreamState::Finished)),
                next = rx.recv() => next,
            };

            let chunk = match next {
                None => return None,
                Some(Err(e)) => return Some((Err(e.into()), StreamState::Finished)),
                Some(Ok(chunk)) => chunk,
            };

            if chunk.done {
                self.record_response(&self.model, chunk.usage.as_ref(), rounds);
            }

            match chunk.content.filter(|c| !c.is_empty()) {
                Some(fragment) => {
                    text.push_str(&fragment);
                    let next_state = if chunk.done {
                        StreamState::Finished
                    } else {
                        StreamState::Streaming { rx, text: text.clone(), rounds }
                    };
                    return Some((Ok(text), next_state));
                }
                None if chunk.done => return None,
                None => continue,
            }
        }
    }

    /// Call the model until it stops asking for tools.
    ///
    /// Tool results are appended to `messages` right after the assistant
    /// message that requested them.
    async fn resolve_tools(
        &self,
        messages: &mut Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<Resolved, Error> {
        let tool_definitions = self.tools.definitions();
        let mut rounds = 0;

        loop {
            debug!(round = rounds, messages = messages.len(), "Requesting completion");

            let mut request = self.request(messages.clone(), false);
            request.tools = tool_definitions.clone();
            let response = cancellable(cancel, self.provider.complete(request)).await?;

            if !response.wants_tool_calls() {
                return Ok(Resolved { response, rounds });
            }

            if rounds >= self.max_tool_rounds {
                warn!(rounds, "Tool resolution did not settle");
                return Err(Error::MaxRoundsExceeded { rounds });
            }
            rounds += 1;

            debug!(
                round = rounds,
                tool_count = response.message.tool_calls.len(),
                "Executing tool calls"
            );

            let results = self.execute_tool_calls(&response.message.tool_calls, cancel).await?;
            messages.push(response.message);
            messages.extend(results.into_iter().map(ToolResult::into_message));
        }
    }

    /// Run each requested call in order.
    ///
    /// Unknown tools answer `{}`; malformed arguments and tool errors end the turn.
    async fn execute_tool_calls(
        &self,
        calls: &[MessageToolCall],
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>, Error> {
        let mut results = Vec::with_capacity(calls.len());

        for wire_call in calls {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let call = ToolCall::parse(wire_call)?;
            info!(tool = %call.name, "Tool called");

            let Some(tool) = self.tools.get(&call.name) else {
                warn!(tool = %call.name, "Model requested an unregistered tool, answering with an empty result");
                self.event_bus.publish(DomainEvent::UnknownToolRequested {
                    tool_name: call.name.clone(),
                    timestamp: Utc::now(),
                });
                results.push(ToolResult::empty(call.id));
                continue;
            };

            let start = Instant::now();
            let outcome = tool.execute(call.arguments).await;
            self.event_bus.publish(DomainEvent::ToolExecuted {
                tool_name: call.name.clone(),
                success: outcome.is_ok(),
                duration_ms: start.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            let value = outcome?;
            results.push(ToolResult::new(call.id, &value));
        }

        Ok(results)
    }

    fn request(&self, messages: Vec<Message>, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: vec![],
            stream,
        }
    }

    fn record_response(&self, model: &str, usage: Option<&Usage>, tool_rounds: u32) {
        if let Some(usage) = usage {
            self.event_bus.publish(DomainEvent::ResponseGenerated {
                model: model.to_string(),
                tokens_used: usage.total_tokens,
                tool_rounds,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Await a provider call unless the turn is cancelled first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl std::future::Future<Output = Result<T, ProviderError>>,
) -> Result<T, Error> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = call => result.map_err(Error::from),
    }
}
