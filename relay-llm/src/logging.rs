use std::path::PathBuf;

use relay_core::{EngineError, InvokeOptions};

/// Log a failed engine invocation to a file for debugging
///
/// Configuration via environment variables:
/// - `RELAY_LLM_LOGGING_ENABLED`: Set to "true" to enable error logging (default: false)
/// - `RELAY_LLM_LOGGING_FOLDER`: Directory for error logs (default: `.relay/logs/`)
pub fn log_engine_error(
    prompt: &str,
    options: &InvokeOptions,
    error: &EngineError,
    engine_name: &str,
) {
    let enabled = std::env::var("RELAY_LLM_LOGGING_ENABLED")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    if !enabled {
        return;
    }

    let log_dir = std::env::var("RELAY_LLM_LOGGING_FOLDER")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".relay/logs/"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        tracing::warn!("Failed to create error log directory: {}", e);
        return;
    }

    let timestamp = chrono::Utc::now();
    let filename = format!(
        "error_{}_{}.log",
        timestamp.format("%Y%m%d_%H%M%S"),
        timestamp.format("%3f") // milliseconds
    );
    let log_path = log_dir.join(filename);

    let content = format_error_log(prompt, options, error, engine_name, &timestamp.to_rfc3339());

    if let Err(e) = std::fs::write(&log_path, content) {
        tracing::warn!("Failed to write error log to {}: {}", log_path.display(), e);
    } else {
        tracing::info!("Engine error logged to: {}", log_path.display());
    }
}

fn format_error_log(
    prompt: &str,
    options: &InvokeOptions,
    error: &EngineError,
    engine_name: &str,
    timestamp: &str,
) -> String {
    let mut log_content = String::new();

    log_content.push_str("=== Engine Invocation Error Log ===\n");
    log_content.push_str(&format!("Timestamp: {}\n", timestamp));
    log_content.push_str(&format!("Engine: {}\n", engine_name));
    log_content.push_str(&format!("Working directory: {}\n", options.cwd.display()));
    log_content.push_str(&format!("Permission mode: {}\n", options.permission_mode));
    log_content.push_str(&format!("Allowed tools: {}\n", options.allowed_tools.join(",")));
    log_content.push_str(&format!(
        "Resume: {}\n",
        options.resume.as_deref().unwrap_or("new session")
    ));

    log_content.push_str("\n=== PROMPT ===\n");
    log_content.push_str(prompt);
    log_content.push('\n');

    log_content.push_str("\n=== ERROR ===\n");
    log_content.push_str(&format!("{}\n", error));

    log_content
}
