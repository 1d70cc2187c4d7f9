//! `courier chat`: interactive or single-message conversation.

use std::io::Write;
use std::sync::Arc;

use courier_agent::{AgentLoop, bootstrap};
use courier_config::AppConfig;
use courier_core::event::{DomainEvent, EventBus};
use courier_core::message::Conversation;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for an API key early and say where to put one.
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    GEMINI_API_KEY=...    (Google AI Studio key)");
        eprintln!("    GOOGLE_API_KEY=...");
        eprintln!("    COURIER_API_KEY=...   (generic)");
        eprintln!();
        eprintln!("  Or add api_key to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = courier_providers::router::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;

    let event_bus = Arc::new(EventBus::default());
    let boot = bootstrap(&config, &event_bus).await;

    let agent = AgentLoop::new(provider, boot.definition.clone(), event_bus.clone())
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_iterations(config.agent.max_tool_iterations);

    let activity = spawn_activity_printer(&event_bus);

    if let Some(msg) = message {
        // Single message mode
        let mut conv = Conversation::new();
        eprint!("  Thinking...");
        let result = agent.respond(&mut conv, msg).await;
        eprint!("\r              \r");
        match result {
            Ok(response) => println!("{response}"),
            Err(e) => {
                boot.shutdown().await;
                return Err(e.into());
            }
        }
    } else {
        // Interactive mode
        let tool_names = boot.definition.tools().names().join(", ");
        println!();
        println!("  Courier: WhatsApp messaging agent");
        println!();
        println!("  Provider:  {}", config.default_provider);
        println!("  Model:     {}", boot.definition.model());
        println!("  Agent:     {}", boot.definition.name());
        match &boot.launch_failure {
            Some(failure) => println!("  Tools:     unavailable ({failure})"),
            None if tool_names.is_empty() => println!("  Tools:     none"),
            None => println!("  Tools:     {tool_names}"),
        }
        println!();
        println!("  Type your message and press Enter.");
        println!("  Type 'exit' or Ctrl+C to quit.");
        println!();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut conv = Conversation::new();

        loop {
            print!("  You > ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else { break };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if matches!(input, "exit" | "quit") {
                break;
            }

            eprint!("  ...");
            match agent.respond(&mut conv, input).await {
                Ok(response) => {
                    eprint!("\r     \r");
                    println!();
                    for line in response.lines() {
                        println!("  Assistant > {line}");
                    }
                    println!();
                }
                Err(e) => {
                    eprint!("\r     \r");
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }

        println!();
        println!("  Goodbye!");
        println!();
    }

    activity.abort();
    boot.shutdown().await;
    Ok(())
}

/// Print each tool call to stderr as it happens.
fn spawn_activity_printer(event_bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            if let DomainEvent::ToolExecuted {
                tool_name,
                success,
                duration_ms,
                ..
            } = &*event
            {
                let status = if *success { "ok" } else { "failed" };
                eprintln!("\r  [tool] {tool_name} {status} ({duration_ms} ms)");
            }
        }
    })
}
