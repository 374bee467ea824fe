pub mod doctor;
pub mod migrate;
pub mod seed;

use serde::Serialize;
use storefront_core::config::{AppConfig, LoadOptions};
use tokio::runtime::Runtime;

/// Failure raised inside a command's async body: error class, message, exit code.
pub(crate) type StepFailure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::CommandResult;

    #[test]
    fn failure_payload_carries_error_class_and_exit_code() {
        let result = CommandResult::failure("seed", "migration", "no such table", 5);

        assert_eq!(result.exit_code, 5);
        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "migration");
        assert_eq!(payload["message"], "no such table");
    }

    #[test]
    fn success_payload_has_null_error_class() {
        let result = CommandResult::success("migrate", "applied pending migrations");

        assert_eq!(result.exit_code, 0);
        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["status"], "ok");
        assert!(payload["error_class"].is_null());
    }
}
