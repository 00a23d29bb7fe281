use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Role, Turn, TOOL_OUTPUT_HEADER};

/// How much of the conversation is handed to the backend on each call.
///
/// The stored log is never shortened; retention only selects the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRetention {
    #[default]
    Full,
    LastTurns(usize),
}

/// Append-only record of everything said in the session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    retention: HistoryRetention,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: HistoryRetention) -> Self {
        Self {
            turns: Vec::new(),
            retention,
        }
    }

    pub fn push_user(&mut self, content: &str) {
        self.turns.push(Turn::user(content));
    }

    pub fn push_model(&mut self, content: &str) {
        self.turns.push(Turn::model(content));
    }

    /// Adds one tool-output turn carrying every `$ command` block of a batch.
    pub fn push_tool_output(&mut self, blocks: &[String]) {
        let content = format!("{}\n{}", TOOL_OUTPUT_HEADER, blocks.join("\n"));
        self.turns.push(Turn::user(content));
    }

    pub fn push_skipped(&mut self) {
        let content = format!("{}\n(Commands skipped by user)", TOOL_OUTPUT_HEADER);
        self.turns.push(Turn::user(content));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn retention(&self) -> HistoryRetention {
        self.retention
    }

    /// The turns to send to the backend under the retention policy.
    ///
    /// A windowed view always starts with a user turn; chat APIs reject
    /// histories that open with the model.
    pub fn window(&self) -> &[Turn] {
        match self.retention {
            HistoryRetention::Full => &self.turns,
            HistoryRetention::LastTurns(limit) => {
                let mut start = self.turns.len().saturating_sub(limit.max(1));
                while start < self.turns.len() && self.turns[start].role != Role::User {
                    start += 1;
                }
                debug!(
                    "History window: {} of {} turns",
                    self.turns.len() - start,
                    self.turns.len()
                );
                &self.turns[start..]
            }
        }
    }
}

/// Builds the fixed instruction describing persona, loop and rules.
pub fn system_instruction(environment: &str) -> String {
    format!(
        r#"You are 'Shellmate', an expert command-line assistant running inside the user's terminal.
You communicate in **English**.
Your goal is to guide the user step-by-step to solve their tasks, like an interactive shell expert.

YOUR WORKFLOW IS A LOOP:
1.  The user (USER) provides a task or problem.
2.  You respond (AI) with a **brief explanation** of your thinking and propose the *next* logical command(s) inside a ```bash code block.
3.  The script executes the command and provides the output (TOOL_OUTPUT).
4.  You analyze this output, provide a *new* explanation (AI), and propose the *next* command in a ```bash code block.
5.  Repeat this (explanation, command, output, explanation, command, output...) until the task is solved.
6.  When the task is solved or you have no more commands, provide a final report and an **empty** ```bash code block.
7.  If the user interrupts with a chat message instead of a command confirmation, that message will appear in the input. Respond to it appropriately.

RULES:
- Your response MUST ALWAYS consist of: Explanation (Markdown) FOLLOWED BY a code block (```bash ... ```).
- Propose commands step-by-step. One logical action per turn.
- Use 'sudo' where necessary.
- The 'cd' command is supported.
- DO NOT use interactive commands (like 'sudo -i', 'nano', 'vim', or those requiring runtime input).
- Commands that run longer than the timeout are stopped.
- Current environment: {environment}
"#
    )
}
