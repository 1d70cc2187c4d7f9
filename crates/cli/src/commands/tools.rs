//! `courier tools`: launch the tool server, patch, and list what it offers.

use courier_agent::{SEND_TOOL, bootstrap};
use courier_config::AppConfig;
use courier_core::event::EventBus;
use courier_core::schema::FunctionDeclaration;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let boot = bootstrap(&config, &EventBus::default()).await;

    let Some(toolset) = &boot.toolset else {
        let reason = boot
            .launch_failure
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown reason".into());
        println!("  ❌ Tool server unavailable: {reason}");
        return Ok(());
    };

    let info = toolset.server_info();
    println!(
        "  {} ({} {}): {} tool(s)",
        toolset.server_name(),
        info.name,
        info.version,
        toolset.tools().len()
    );
    println!();

    for tool in toolset.tools() {
        let marker = if tool.name == SEND_TOOL { "*" } else { " " };
        println!(" {marker} {}", tool.name);
        if let Some(summary) = tool.description.lines().map(str::trim).find(|l| !l.is_empty()) {
            println!("      {summary}");
        }
        match FunctionDeclaration::from_parts(&tool.name, &tool.description, &tool.input_schema) {
            Ok(decl) => {
                let params: Vec<String> = decl
                    .parameter_names()
                    .into_iter()
                    .map(|(name, required)| {
                        let patched = boot
                            .patch
                            .as_ref()
                            .is_some_and(|report| report.contains(&tool.name, name));
                        format!(
                            "{name}{}{}",
                            if required { "" } else { "?" },
                            if patched { " (patched)" } else { "" }
                        )
                    })
                    .collect();
                if !params.is_empty() {
                    println!("      params: {}", params.join(", "));
                }
            }
            Err(e) => println!("      params: unreadable schema ({e})"),
        }
    }

    println!();
    match &boot.patch {
        Some(report) if report.is_empty() => println!("  Schema patch: nothing to change"),
        Some(report) => println!("  Schema patch: {} parameter(s) updated", report.patched.len()),
        None => println!("  Schema patch: not applied"),
    }

    boot.shutdown().await;
    Ok(())
}
