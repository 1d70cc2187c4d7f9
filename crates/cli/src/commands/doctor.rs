//! `courier doctor`: diagnose configuration and environment.

use std::path::Path;

use courier_config::{AppConfig, ENV_LAUNCHER, ENV_SERVER_DIRECTORY, McpConfig};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Courier Doctor: System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ℹ️  No config file, using defaults and environment");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured for '{}'", config.default_provider);
        let router = courier_providers::router::build_from_config(&config);
        if let Some(provider) = router.default() {
            match provider.health_check().await {
                Ok(true) => println!("  ✅ Model API reachable"),
                Ok(false) => {
                    println!("  ⚠️  Model API answered but rejected the request; check the key");
                    issues += 1;
                }
                Err(e) => {
                    println!("  ⚠️  Model API unreachable: {e}");
                    issues += 1;
                }
            }
        }
    } else {
        println!("  ❌ No API key: set GEMINI_API_KEY (or COURIER_API_KEY) in the environment or .env");
        issues += 1;
    }
    println!("  ℹ️  Model: {}", config.default_model);

    let problems = launch_problems(&config.mcp);
    if !config.mcp.enabled {
        println!("  ℹ️  Tool server disabled; the agent will run without tools");
    } else if problems.is_empty() {
        println!("  ✅ Tool server launch settings look usable");
    }
    for problem in &problems {
        println!("  ❌ {problem}");
        issues += 1;
    }

    if config.mcp.schema_patch.enabled {
        println!(
            "  ✅ Schema patch enabled for {}",
            config.mcp.schema_patch.tools.join(", ")
        );
    } else {
        println!("  ℹ️  Schema patch disabled");
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Problems that would stop the tool server from launching.
fn launch_problems(mcp: &McpConfig) -> Vec<String> {
    if !mcp.enabled {
        return vec![];
    }
    let mut problems = Vec::new();

    match mcp.launcher.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => problems.push(format!("{ENV_LAUNCHER} is not set")),
        Some(launcher) => {
            let path = Path::new(launcher);
            // A bare name is resolved through PATH at spawn time.
            if path.components().count() > 1 && !path.is_file() {
                problems.push(format!("{ENV_LAUNCHER} points to a missing file: {launcher}"));
            }
        }
    }

    match mcp
        .server_directory
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        None => problems.push(format!("{ENV_SERVER_DIRECTORY} is not set")),
        Some(dir) => {
            let dir = Path::new(dir);
            if !dir.is_dir() {
                problems.push(format!(
                    "{ENV_SERVER_DIRECTORY} is not a directory: {}",
                    dir.display()
                ));
            } else if !dir.join(&mcp.script).is_file() {
                problems.push(format!(
                    "{} not found in {}",
                    mcp.script,
                    dir.display()
                ));
            }
        }
    }

    problems
}
