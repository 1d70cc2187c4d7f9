//! Dialogue scenarios against a scripted model and a recording
//! `send_message` procedure.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_agent::{AgentLoop, DISCLAIMER, MESSAGING_INSTRUCTION, messaging_agent, with_disclaimer};
use courier_core::error::{ProviderError, ToolError};
use courier_core::event::{DomainEvent, EventBus};
use courier_core::message::{Conversation, Message, MessageToolCall, Role};
use courier_core::provider::{Provider, ProviderRequest, ProviderResponse};
use courier_core::tool::{Tool, ToolRegistry, ToolResult};

/// Plays back assistant turns in order and keeps every request it saw.
struct ScriptedProvider {
    turns: Mutex<VecDeque<Message>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(vec![]),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let message = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "gemini-2.0-flash".into(),
        })
    }
}

/// Stands in for the WhatsApp server's `send_message`.
#[derive(Clone, Default)]
struct RecordingSend {
    calls: Arc<Mutex<Vec<serde_json::Value>>>,
    reply: Option<(bool, &'static str)>,
}

#[async_trait]
impl Tool for RecordingSend {
    fn name(&self) -> &str {
        "send_message"
    }
    fn description(&self) -> &str {
        "Send a WhatsApp message to a phone number or JID"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "recipient": {"type": "string"},
                "message": {"type": "string"}
            },
            "required": ["recipient", "message"]
        })
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.calls.lock().unwrap().push(arguments);
        let (success, output) = self.reply.unwrap_or((true, "Message sent successfully"));
        Ok(ToolResult {
            call_id: String::new(),
            success,
            output: output.into(),
            data: None,
        })
    }
}

struct Harness {
    agent: AgentLoop,
    provider: Arc<ScriptedProvider>,
    sent: Arc<Mutex<Vec<serde_json::Value>>>,
    events: Arc<EventBus>,
}

fn harness(turns: Vec<Message>, send: RecordingSend) -> Harness {
    let sent = send.calls.clone();
    let mut tools = ToolRegistry::new();
    tools.register(Box::new(send));
    let definition = Arc::new(messaging_agent("gemini-2.0-flash", Arc::new(tools)));

    let provider = ScriptedProvider::new(turns);
    let events = Arc::new(EventBus::default());
    let agent = AgentLoop::new(provider.clone(), definition, events.clone());
    Harness {
        agent,
        provider,
        sent,
        events,
    }
}

fn send_call(recipient: &str, message: &str) -> Message {
    Message::assistant_with_calls(
        "",
        vec![MessageToolCall {
            id: "call_send_1".into(),
            name: "send_message".into(),
            arguments: serde_json::json!({"recipient": recipient, "message": message}).to_string(),
        }],
    )
}

#[tokio::test]
async fn greeting_gets_text_and_no_tool_calls() {
    let h = harness(
        vec![Message::assistant(
            "Hi there! How can I help you send a WhatsApp message today?",
        )],
        RecordingSend::default(),
    );

    let mut conv = Conversation::new();
    let reply = h.agent.respond(&mut conv, "Hey").await.unwrap();

    assert!(reply.starts_with("Hi there!"));
    assert!(h.sent.lock().unwrap().is_empty());
    assert_eq!(conv.tool_calls().count(), 0);

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(requests[0].messages[0].content, MESSAGING_INSTRUCTION);
    assert_eq!(requests[0].tools[0].name, "send_message");
}

#[tokio::test]
async fn send_request_makes_exactly_one_send_message_call() {
    let final_message = with_disclaimer("Hey! Just letting you know I'm running 5 minutes late.");
    let h = harness(
        vec![
            send_call("+15551234567", &final_message),
            Message::assistant(
                "Okay, I've tried to send your message to +15551234567. The server said: Message sent successfully",
            ),
        ],
        RecordingSend::default(),
    );
    let mut events = h.events.subscribe();

    let mut conv = Conversation::new();
    let reply = h
        .agent
        .respond(&mut conv, "Tell +15551234567 I'm running 5 minutes late")
        .await
        .unwrap();

    let sent = h.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["recipient"], "+15551234567");
    let message = sent[0]["message"].as_str().unwrap();
    assert!(message.ends_with(&format!("\n{DISCLAIMER}")));
    assert!(!message.starts_with('\n'));

    assert!(reply.contains("+15551234567"));
    assert!(reply.contains("Message sent successfully"));

    // The model saw the procedure's own result before reporting.
    let requests = h.provider.requests();
    let fed_back = requests[1].messages.last().unwrap();
    assert_eq!(fed_back.role, Role::Tool);
    assert_eq!(fed_back.content, "Message sent successfully");

    let event = events.try_recv().unwrap();
    assert!(matches!(
        &*event,
        DomainEvent::ToolExecuted { tool_name, success: true, .. } if tool_name == "send_message"
    ));
}

#[tokio::test]
async fn missing_number_is_asked_for_in_text() {
    let h = harness(
        vec![Message::assistant(
            "Sure, I can help with that! What's the phone number of the recipient?",
        )],
        RecordingSend::default(),
    );

    let mut conv = Conversation::new();
    let reply = h
        .agent
        .respond(&mut conv, "Tell Bob I'm late")
        .await
        .unwrap();

    assert!(reply.contains("phone number"));
    assert!(h.sent.lock().unwrap().is_empty());
    assert_eq!(conv.tool_calls().count(), 0);
}

#[tokio::test]
async fn clarification_then_send_across_turns() {
    let h = harness(
        vec![
            Message::assistant("Okay, and what message would you like to send?"),
            send_call("+15551234567", &with_disclaimer("Happy birthday!")),
            Message::assistant("Okay, I've tried to send your message to +15551234567."),
        ],
        RecordingSend::default(),
    );

    let mut conv = Conversation::new();
    h.agent
        .respond(&mut conv, "Message +15551234567 for me")
        .await
        .unwrap();
    assert!(h.sent.lock().unwrap().is_empty());

    h.agent
        .respond(&mut conv, "Wish them a happy birthday")
        .await
        .unwrap();
    assert_eq!(h.sent.lock().unwrap().len(), 1);
    assert_eq!(conv.tool_calls().count(), 1);
}

#[tokio::test]
async fn send_failure_is_relayed_to_the_model() {
    let h = harness(
        vec![
            send_call("+15550000000", &with_disclaimer("Hello")),
            Message::assistant(
                "I tried to send your message to +15550000000, but it failed: recipient not on WhatsApp",
            ),
        ],
        RecordingSend {
            reply: Some((false, "recipient not on WhatsApp")),
            ..RecordingSend::default()
        },
    );

    let mut conv = Conversation::new();
    let reply = h
        .agent
        .respond(&mut conv, "Say hello to +15550000000")
        .await
        .unwrap();

    let requests = h.provider.requests();
    let fed_back = requests[1].messages.last().unwrap();
    assert_eq!(fed_back.content, "Error: recipient not on WhatsApp");
    assert!(reply.contains("recipient not on WhatsApp"));
}
