//! End-to-end: configuration -> bootstrap (launch, patch, register) ->
//! conversation loop -> real `tools/call` against a scripted stdio server
//! started through a `uv`-shaped launcher.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use courier_agent::{AgentLoop, DISCLAIMER, bootstrap, with_disclaimer};
use courier_config::AppConfig;
use courier_core::error::ProviderError;
use courier_core::event::EventBus;
use courier_core::message::{Conversation, Message, MessageToolCall, Role};
use courier_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use courier_tools::LaunchFailure;

// ── Scripted stdio server ───────────────────────────────────────────────

/// Accepts `--directory <dir> run <script>` and runs the script with sh.
const FAKE_UV: &str = r#"#!/bin/sh
[ "$1" = "--directory" ] && [ "$3" = "run" ] || { echo "usage: uv --directory DIR run SCRIPT" >&2; exit 2; }
exec sh "$2/$4"
"#;

const SERVER: &str = r#"read -r line
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"whatsapp","version":"1.0"}}}'
read -r line
read -r line
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"send_message","description":"Send a WhatsApp message","inputSchema":{"type":"object","properties":{"recipient":{"type":"string"},"message":{"type":"string"}},"required":["recipient","message"]}},{"name":"list_chats","description":"List chats","inputSchema":{"type":"object","properties":{"query":{"type":"string","anyOf":[{"type":"string"},{"type":"null"}]}}}}]}}'
while read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"Message sent successfully\"}],\"isError\":false}}"
done
"#;

fn install_fake_server(root: &Path) -> AppConfig {
    let server_dir = root.join("whatsapp-mcp-server");
    std::fs::create_dir(&server_dir).unwrap();
    std::fs::write(server_dir.join("main.py"), SERVER).unwrap();

    let launcher = root.join("uv");
    std::fs::write(&launcher, FAKE_UV).unwrap();
    std::fs::set_permissions(&launcher, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = AppConfig::default();
    config.apply_env(|key| match key {
        "UV_EXECUTABLE_PATH" => Some(launcher.to_string_lossy().into_owned()),
        "PYTHON_MCP_SERVER_DIRECTORY" => Some(server_dir.to_string_lossy().into_owned()),
        _ => None,
    });
    config
}

// ── Scripted model ──────────────────────────────────────────────────────

struct ScriptedProvider {
    responses: Mutex<Vec<Message>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(mut responses: Vec<Message>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(vec![]),
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let message = self
            .responses
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedProvider exhausted");
        Ok(ProviderResponse {
            message,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "gemini-2.0-flash".into(),
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_bootstrap_patches_and_registers_tools() {
    let root = tempfile::tempdir().unwrap();
    let config = install_fake_server(root.path());

    let boot = bootstrap(&config, &EventBus::default()).await;
    assert!(boot.launch_failure.is_none(), "{:?}", boot.launch_failure);
    assert_eq!(boot.definition.tools().names(), vec!["list_chats", "send_message"]);

    let report = boot.patch.as_ref().unwrap();
    assert!(report.contains("list_chats", "query"));

    // The model is offered the patched declaration.
    let defs = boot.definition.tools().definitions();
    let list_chats = defs.iter().find(|d| d.name == "list_chats").unwrap();
    assert!(list_chats.parameters["properties"]["query"].get("type").is_none());

    boot.shutdown().await;
}

#[tokio::test]
async fn e2e_send_message_reaches_the_server() {
    let root = tempfile::tempdir().unwrap();
    let config = install_fake_server(root.path());
    let events = Arc::new(EventBus::default());
    let boot = bootstrap(&config, &events).await;

    let provider = Arc::new(ScriptedProvider::new(vec![
        Message::assistant_with_calls(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "send_message".into(),
                arguments: serde_json::json!({
                    "recipient": "+15551234567",
                    "message": with_disclaimer("Hey, running 5 minutes late!"),
                })
                .to_string(),
            }],
        ),
        Message::assistant("Okay, I've tried to send your message to +15551234567: Message sent successfully"),
    ]));
    let agent = AgentLoop::new(provider.clone(), boot.definition.clone(), events);

    let mut conv = Conversation::new();
    let reply = agent
        .respond(&mut conv, "Tell +15551234567 I'm 5 minutes late")
        .await
        .unwrap();
    assert!(reply.contains("Message sent successfully"));

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let tool_reply = requests[1].messages.last().unwrap();
    assert_eq!(tool_reply.role, Role::Tool);
    assert_eq!(tool_reply.content, "Message sent successfully");

    let sent: Vec<_> = conv.tool_calls().collect();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].arguments.contains(DISCLAIMER));

    boot.shutdown().await;
}

#[tokio::test]
async fn e2e_bad_launcher_still_defines_an_agent() {
    let mut config = AppConfig::default();
    config.mcp.launcher = Some("/nonexistent/bin/uv".into());
    config.mcp.server_directory = Some("/nonexistent/server".into());

    let boot = bootstrap(&config, &EventBus::default()).await;
    assert!(matches!(
        boot.launch_failure,
        Some(LaunchFailure::LauncherNotFound { .. })
    ));
    assert!(!boot.has_tools());
    assert_eq!(boot.definition.name(), "WhatsApp_Orchestrator_Agent");
}
