use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of messages the executor synthesizes for a successful step.
pub const SUCCESS_MARKER: &str = "✅";
/// Prefix of messages the executor synthesizes for a failed step.
pub const WARNING_MARKER: &str = "⚠️";
/// Framing that tells the model a turn carries command results, not chat.
pub const TOOL_OUTPUT_HEADER: &str = "TOOL_OUTPUT:";

// ==================== Conversation Types ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged entry of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<String>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![text.into()],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![text.into()],
        }
    }

    /// All parts joined, which is what single-string chat APIs receive.
    pub fn text(&self) -> String {
        self.parts.join("\n")
    }

    pub fn is_tool_output(&self) -> bool {
        self.role == Role::User
            && self
                .parts
                .first()
                .map_or(false, |p| p.starts_with(TOOL_OUTPUT_HEADER))
    }
}

// ==================== Response Types ====================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub explanation: String,
    pub commands: Vec<String>,
}

impl ParsedResponse {
    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Rebuilds the response text the model would have produced.
    pub fn render(&self) -> String {
        if self.commands.is_empty() {
            return self.explanation.clone();
        }
        format!(
            "{}\n```bash\n{}\n```",
            self.explanation,
            self.commands.join("\n")
        )
    }
}

// ==================== Execution Types ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Raw output of a command that ran.
    Ok,
    /// A ✅ message written by the executor itself.
    Success,
    Warning,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub command: String,
    pub output: String,
    pub status: ExecStatus,
}

impl ExecutionResult {
    pub fn ok(command: &str, output: impl Into<String>) -> Self {
        Self {
            command: command.to_string(),
            output: output.into(),
            status: ExecStatus::Ok,
        }
    }

    pub fn success(command: &str, message: impl fmt::Display) -> Self {
        Self {
            command: command.to_string(),
            output: format!("{} {}", SUCCESS_MARKER, message),
            status: ExecStatus::Success,
        }
    }

    pub fn warning(command: &str, message: impl fmt::Display) -> Self {
        Self {
            command: command.to_string(),
            output: format!("{} {}", WARNING_MARKER, message),
            status: ExecStatus::Warning,
        }
    }

    pub fn timeout(command: &str) -> Self {
        Self {
            command: command.to_string(),
            output: format!(
                "{} Command '{}' timed out (waiting for input?)",
                WARNING_MARKER, command
            ),
            status: ExecStatus::Timeout,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ExecStatus::Ok | ExecStatus::Success)
    }

    /// The `$ command` block that goes into the tool-output turn.
    pub fn transcript(&self) -> String {
        format!("$ {}\n{}", self.command, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output_detection() {
        assert!(Turn::user("TOOL_OUTPUT:\n$ ls\nfoo").is_tool_output());
        assert!(!Turn::user("list my files").is_tool_output());
        assert!(!Turn::model("TOOL_OUTPUT: pretend").is_tool_output());
    }

    #[test]
    fn test_render_without_commands_is_explanation() {
        let parsed = ParsedResponse {
            explanation: "All done!".to_string(),
            commands: vec![],
        };
        assert_eq!(parsed.render(), "All done!");
    }

    #[test]
    fn test_execution_result_markers() {
        let warn = ExecutionResult::warning("cd /nope", "Error in 'cd': missing");
        assert!(warn.output.starts_with(WARNING_MARKER));
        assert_eq!(warn.status, ExecStatus::Warning);

        let timeout = ExecutionResult::timeout("sleep 60");
        assert_eq!(timeout.status, ExecStatus::Timeout);
        assert!(timeout.output.contains("'sleep 60' timed out"));

        let success = ExecutionResult::success("true", "(Command executed, no output)");
        assert_eq!(success.output, "✅ (Command executed, no output)");
        assert_eq!(success.status, ExecStatus::Success);
        assert!(success.is_ok());

        let ok = ExecutionResult::ok("pwd", "/tmp");
        assert!(ok.is_ok());
        assert_eq!(ok.transcript(), "$ pwd\n/tmp");
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
        assert_eq!(Role::User.to_string(), "user");
    }
}
