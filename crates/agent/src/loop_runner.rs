//! The conversation loop: model call, tool calls, model call, until the
//! model answers in text.

use std::sync::Arc;

use courier_core::agent::AgentDefinition;
use courier_core::event::{DomainEvent, EventBus};
use courier_core::message::{Conversation, Message, MessageToolCall, Role};
use courier_core::provider::{Provider, ProviderRequest};
use courier_core::tool::ToolCall;
use tracing::{debug, info, warn};

const MAX_ITERATIONS_REPLY: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// Hosts an [`AgentDefinition`] against a chat model.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,

    definition: Arc<AgentDefinition>,

    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Maximum model calls that may end in tool calls, per turn
    max_iterations: u32,

    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        definition: Arc<AgentDefinition>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            definition,
            temperature: 0.7,
            max_tokens: None,
            max_iterations: 8,
            event_bus,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// Append a user message and run the loop.
    pub async fn respond(
        &self,
        conversation: &mut Conversation,
        user_text: impl Into<String>,
    ) -> Result<String, courier_core::Error> {
        conversation.push(Message::user(user_text));
        self.process(conversation).await
    }

    /// Run the loop over `conversation` and return the final text reply.
    ///
    /// The instruction is kept as the first message. Tool failures are
    /// reported back to the model as `Error: ...` outputs so it can relay
    /// them; only provider failures end the turn with an error. If tools
    /// already ran in this turn, that error carries their outcomes.
    pub async fn process(
        &self,
        conversation: &mut Conversation,
    ) -> Result<String, courier_core::Error> {
        info!(
            conversation_id = %conversation.id,
            agent = %self.definition.name(),
            messages = conversation.messages.len(),
            "Processing conversation"
        );

        let instruction = Message::system(self.definition.instruction());
        let has_instruction = conversation
            .messages
            .first()
            .is_some_and(|m| m.role == Role::System);
        if has_instruction {
            conversation.messages[0] = instruction;
        } else {
            conversation.messages.insert(0, instruction);
        }

        let tools = self.definition.tools();
        let tool_definitions = tools.definitions();
        let mut completed: Vec<String> = Vec::new();

        for iteration in 1..=self.max_iterations {
            debug!(
                conversation_id = %conversation.id,
                iteration,
                "Agent loop iteration"
            );

            let request = ProviderRequest {
                model: self.definition.model().to_string(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(source) if completed.is_empty() => return Err(source.into()),
                Err(source) => {
                    warn!(
                        conversation_id = %conversation.id,
                        completed = completed.len(),
                        error = %source,
                        "Provider failed after tool calls ran"
                    );
                    return Err(courier_core::Error::AfterToolCalls { completed, source });
                }
            };

            if let Some(usage) = &response.usage {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    conversation_id: conversation.id.to_string(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: chrono::Utc::now(),
                });
            }

            if response.message.tool_calls.is_empty() {
                let text = response.message.content.clone();
                conversation.push(response.message);
                return Ok(text);
            }

            debug!(
                tool_count = response.message.tool_calls.len(),
                "Executing tool calls"
            );
            let calls = response.message.tool_calls.clone();
            conversation.push(response.message);

            for call in &calls {
                let output = self.run_tool_call(call).await;
                completed.push(format!("{}: {output}", call.name));
                conversation.push(Message::tool_result(&call.id, output));
            }
        }

        warn!(
            conversation_id = %conversation.id,
            max_iterations = self.max_iterations,
            "Max tool iterations reached, forcing text response"
        );
        conversation.push(Message::assistant(MAX_ITERATIONS_REPLY));
        Ok(MAX_ITERATIONS_REPLY.into())
    }

    /// Execute one requested call and return the text the model sees.
    async fn run_tool_call(&self, call: &MessageToolCall) -> String {
        let arguments = if call.arguments.trim().is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_str(&call.arguments) {
                Ok(args) => args,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Model produced unparseable arguments");
                    self.publish_execution(call, serde_json::Value::Null, false, 0);
                    return format!("Error: arguments are not valid JSON: {e}");
                }
            }
        };

        let tool_call = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: arguments.clone(),
        };

        let start = std::time::Instant::now();
        let result = self.definition.tools().execute(&tool_call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(tool_result) => {
                info!(
                    tool = %call.name,
                    success = tool_result.success,
                    duration_ms,
                    "Tool call finished"
                );
                self.publish_execution(call, arguments, tool_result.success, duration_ms);
                if tool_result.success {
                    tool_result.output
                } else {
                    format!("Error: {}", tool_result.output)
                }
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                self.publish_execution(call, arguments, false, duration_ms);
                format!("Error: {e}")
            }
        }
    }

    fn publish_execution(
        &self,
        call: &MessageToolCall,
        arguments: serde_json::Value,
        success: bool,
        duration_ms: u64,
    ) {
        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            arguments,
            success,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier_core::error::{ProviderError, ToolError};
    use courier_core::provider::{ProviderResponse, Usage};
    use courier_core::tool::{Tool, ToolRegistry, ToolResult};
    use std::sync::Mutex;

    /// Replays canned assistant messages and records every request.
    struct MockProvider {
        replies: Mutex<Vec<Message>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl MockProvider {
        fn new(mut replies: Vec<Message>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let message = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Message::assistant_with_calls("", vec![call("echo", "{}")]));
            Ok(ProviderResponse {
                message,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "mock-model".into(),
            })
        }
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo arguments"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            if arguments.get("fail").is_some() {
                return Ok(ToolResult {
                    call_id: String::new(),
                    success: false,
                    output: "refused".into(),
                    data: None,
                });
            }
            Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: arguments.to_string(),
                data: None,
            })
        }
    }

    fn call(name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn agent(provider: Arc<MockProvider>) -> AgentLoop {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(Echo));
        let definition = AgentDefinition::new("test", "mock-model", "Be brief.", Arc::new(tools));
        AgentLoop::new(provider, Arc::new(definition), Arc::new(EventBus::default()))
    }

    #[tokio::test]
    async fn simple_text_response() {
        let provider = Arc::new(MockProvider::new(vec![Message::assistant("Hello! How can I help?")]));
        let agent = agent(provider.clone());

        let mut conv = Conversation::new();
        let reply = agent.respond(&mut conv, "Hello!").await.unwrap();
        assert_eq!(reply, "Hello! How can I help?");
        // System + User + Assistant
        assert_eq!(conv.messages.len(), 3);
        assert_eq!(conv.messages[0].content, "Be brief.");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].model, "mock-model");
    }

    #[tokio::test]
    async fn instruction_is_not_duplicated_across_turns() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant("one"),
            Message::assistant("two"),
        ]));
        let agent = agent(provider);

        let mut conv = Conversation::new();
        agent.respond(&mut conv, "first").await.unwrap();
        agent.respond(&mut conv, "second").await.unwrap();
        let system_count = conv.messages.iter().filter(|m| m.role == Role::System).count();
        assert_eq!(system_count, 1);
        assert_eq!(conv.messages.len(), 5);
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant_with_calls("", vec![call("echo", r#"{"x":1}"#)]),
            Message::assistant("done"),
        ]));
        let agent = agent(provider.clone());

        let mut conv = Conversation::new();
        let reply = agent.respond(&mut conv, "go").await.unwrap();
        assert_eq!(reply, "done");

        let requests = provider.requests.lock().unwrap();
        let fed_back = requests[1].messages.last().unwrap();
        assert_eq!(fed_back.role, Role::Tool);
        assert_eq!(fed_back.tool_call_id.as_deref(), Some("call_echo"));
        assert_eq!(fed_back.content, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn failures_are_relayed_as_error_text() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant_with_calls(
                "",
                vec![
                    call("echo", r#"{"fail":true}"#),
                    call("send_email", "{}"),
                    call("echo", "not json"),
                ],
            ),
            Message::assistant("reported"),
        ]));
        let agent = agent(provider);
        let mut events = agent.event_bus.subscribe();

        let mut conv = Conversation::new();
        agent.respond(&mut conv, "go").await.unwrap();

        let outputs: Vec<&str> = conv
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(outputs[0], "Error: refused");
        assert!(outputs[1].starts_with("Error: Tool not found: send_email"));
        assert!(outputs[2].starts_with("Error: arguments are not valid JSON"));

        let mut failed = 0;
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::ToolExecuted { success: false, .. } = *event {
                failed += 1;
            }
        }
        assert_eq!(failed, 3);
    }

    /// Asks for one tool call, then fails every later request.
    struct FailsAfterToolCall {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Provider for FailsAfterToolCall {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls > 1 {
                return Err(ProviderError::Network("connection reset".into()));
            }
            Ok(ProviderResponse {
                message: Message::assistant_with_calls("", vec![call("echo", r#"{"sent":true}"#)]),
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    #[tokio::test]
    async fn provider_failure_after_tools_reports_their_outcomes() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(Echo));
        let definition = AgentDefinition::new("test", "mock-model", "Be brief.", Arc::new(tools));
        let provider = Arc::new(FailsAfterToolCall { calls: Mutex::new(0) });
        let agent = AgentLoop::new(provider, Arc::new(definition), Arc::new(EventBus::default()));

        let mut conv = Conversation::new();
        let err = agent.respond(&mut conv, "send it").await.unwrap_err();
        match &err {
            courier_core::Error::AfterToolCalls { completed, .. } => {
                assert_eq!(completed, &vec![r#"echo: {"sent":true}"#.to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn provider_failure_before_tools_is_plain() {
        let provider = Arc::new(FailsAfterToolCall { calls: Mutex::new(1) });
        let agent = AgentLoop::new(
            provider,
            Arc::new(AgentDefinition::new("test", "m", "x", Arc::new(ToolRegistry::new()))),
            Arc::new(EventBus::default()),
        );
        let err = agent.respond(&mut Conversation::new(), "hi").await.unwrap_err();
        assert!(matches!(err, courier_core::Error::Provider(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn max_iterations_forces_text_reply() {
        // No scripted replies: the mock keeps asking for tool calls.
        let provider = Arc::new(MockProvider::new(vec![]));
        let agent = agent(provider.clone()).with_max_iterations(2);

        let mut conv = Conversation::new();
        let reply = agent.respond(&mut conv, "loop").await.unwrap();
        assert!(reply.contains("maximum number of tool call iterations"));
        assert_eq!(provider.requests.lock().unwrap().len(), 2);
    }
}
