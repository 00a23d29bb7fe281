use async_trait::async_trait;

pub mod ai;
pub mod ai_providers;
pub mod config;
pub mod environment;
pub mod error;
pub mod parser;
pub mod selection;
pub mod session_log;
pub mod shell;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use ai::{Conversation, HistoryRetention};
pub use anyhow::Result;
pub use config::Config;
pub use error::ShellmateError;
pub use parser::parse_response;
pub use selection::parse_selection;
pub use shell::{LineReader, RustylineReader, Shell, ShellOptions};
pub use tools::ToolExecutor;
pub use types::{ExecStatus, ExecutionResult, ParsedResponse, Role, Turn};

// ==================== Supporting Components ====================

/// A conversational model backend.
///
/// `turns` is the retained history, oldest first, and always starts with a
/// user turn. Implementations return the raw reply text.
#[async_trait]
pub trait AiProvider {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn generate(&self, turns: &[Turn], system_instruction: &str) -> Result<String>;
}
