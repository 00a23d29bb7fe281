use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use tracing::{debug, error, info, warn};

use crate::ai::{system_instruction, Conversation};
use crate::config::SessionConfig;
use crate::parser::parse_response;
use crate::selection::parse_selection;
use crate::session_log::{CommandLog, NullCommandLog};
use crate::tools::ToolExecutor;
use crate::types::{ExecStatus, ExecutionResult};
use crate::AiProvider;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD_YELLOW: &str = "\x1b[1;33m";
const BOLD_CYAN: &str = "\x1b[1;36m";

// ==================== Terminal Input ====================

/// Line-based input; `Ok(None)` means the input stream is closed.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

pub struct RustylineReader {
    editor: DefaultEditor,
}

impl RustylineReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineReader for RustylineReader {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

// ==================== Decisions ====================

/// What the user asked for after seeing the proposed commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    All,
    Skip,
    /// Ascending zero-based indices into the proposed commands.
    Select(Vec<usize>),
    /// Not a decision at all: a message for the model.
    Interrupt(String),
}

/// An empty answer accepts the default, which is to run everything.
pub fn classify_decision(input: &str, command_count: usize) -> Decision {
    let trimmed = input.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "y" | "yes" => Decision::All,
        "n" | "no" => Decision::Skip,
        _ => {
            let indices = parse_selection(trimmed, command_count);
            if indices.is_empty() {
                Decision::Interrupt(input.to_string())
            } else {
                Decision::Select(indices)
            }
        }
    }
}

// ==================== Session State ====================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    AwaitingUserInput,
    /// `rounds` counts model replies since the last fresh user message.
    AiWorking { rounds: usize },
    AwaitingUserDecision { commands: Vec<String>, rounds: usize },
    Executing { commands: Vec<String>, rounds: usize },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellOptions {
    pub auto_continue: bool,
    pub max_rounds: usize,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            auto_continue: true,
            max_rounds: 0,
        }
    }
}

impl From<&SessionConfig> for ShellOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            auto_continue: config.auto_continue,
            max_rounds: config.max_rounds,
        }
    }
}

pub struct Shell<R: LineReader, W: Write> {
    provider: Box<dyn AiProvider + Send + Sync>,
    executor: ToolExecutor,
    conversation: Conversation,
    command_log: Box<dyn CommandLog>,
    reader: R,
    out: W,
    environment: String,
    system_instruction: String,
    options: ShellOptions,
}

impl<R: LineReader, W: Write> Shell<R, W> {
    pub fn new(
        provider: Box<dyn AiProvider + Send + Sync>,
        executor: ToolExecutor,
        environment: &str,
        reader: R,
        out: W,
    ) -> Self {
        Self {
            provider,
            executor,
            conversation: Conversation::new(),
            command_log: Box::new(NullCommandLog),
            reader,
            out,
            environment: environment.to_string(),
            system_instruction: system_instruction(environment),
            options: ShellOptions::default(),
        }
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn with_command_log(mut self, command_log: Box<dyn CommandLog>) -> Self {
        self.command_log = command_log;
        self
    }

    pub fn with_options(mut self, options: ShellOptions) -> Self {
        self.options = options;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Runs the session until the user quits or input ends.
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner()?;

        let mut phase = Phase::AwaitingUserInput;
        while phase != Phase::Finished {
            phase = match phase {
                Phase::AwaitingUserInput => self.await_user_input()?,
                Phase::AiWorking { rounds } => self.ai_turn(rounds).await?,
                Phase::AwaitingUserDecision { commands, rounds } => {
                    self.await_decision(commands, rounds)?
                }
                Phase::Executing { commands, rounds } => {
                    self.execute_batch(&commands, rounds).await?
                }
                Phase::Finished => Phase::Finished,
            };
        }

        info!(
            "Session finished after {} conversation turns",
            self.conversation.len()
        );
        Ok(())
    }

    fn print_banner(&mut self) -> Result<()> {
        writeln!(self.out, "{CYAN}Detected environment:{RESET} {}", self.environment)?;
        writeln!(
            self.out,
            "{CYAN}Using API:{RESET} {} {DIM}({}){RESET}",
            self.provider.name().to_uppercase(),
            self.provider.model()
        )?;
        writeln!(self.out, "{BOLD_CYAN}Shellmate terminal companion{RESET}")?;
        writeln!(self.out, "{DIM}Type 'exit' or 'quit' to leave{RESET}\n")?;
        Ok(())
    }

    fn await_user_input(&mut self) -> Result<Phase> {
        writeln!(
            self.out,
            "{DIM}({}){RESET}",
            self.executor.working_directory().display()
        )?;
        self.out.flush()?;

        let Some(line) = self.reader.read_line("You: ")? else {
            return self.finish();
        };

        let input = line.trim();
        if input.is_empty() {
            return Ok(Phase::AwaitingUserInput);
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            return self.finish();
        }

        debug!("User message: {}", input);
        self.conversation.push_user(&line);
        Ok(Phase::AiWorking { rounds: 0 })
    }

    async fn ai_turn(&mut self, rounds: usize) -> Result<Phase> {
        if self.options.max_rounds > 0 && rounds >= self.options.max_rounds {
            warn!("Stopping after {} model rounds without user input", rounds);
            writeln!(
                self.out,
                "\n{BOLD_YELLOW}Paused after {} rounds; send a message to continue.{RESET}",
                rounds
            )?;
            return Ok(Phase::AwaitingUserInput);
        }

        let response = self
            .provider
            .generate(self.conversation.window(), &self.system_instruction)
            .await;

        let response_text = match response {
            Ok(text) => text,
            Err(e) => {
                error!("AI backend call failed: {:#}", e);
                writeln!(
                    self.out,
                    "{BOLD_RED}An error occurred in the AI loop: {:#}{RESET}",
                    e
                )?;
                return Ok(Phase::AwaitingUserInput);
            }
        };

        self.conversation.push_model(&response_text);
        let parsed = parse_response(&response_text);

        writeln!(self.out, "\n{BOLD_CYAN}Shellmate:{RESET}")?;
        writeln!(self.out, "{}", parsed.explanation)?;

        if !parsed.has_commands() {
            debug!("No commands proposed, turn complete");
            return Ok(Phase::AwaitingUserInput);
        }

        writeln!(self.out, "{BOLD_YELLOW}Suggested commands:{RESET}")?;
        for (i, command) in parsed.commands.iter().enumerate() {
            writeln!(self.out, "  {}. {CYAN}{}{RESET}", i + 1, command)?;
        }

        Ok(Phase::AwaitingUserDecision {
            commands: parsed.commands,
            rounds: rounds + 1,
        })
    }

    fn await_decision(&mut self, commands: Vec<String>, rounds: usize) -> Result<Phase> {
        writeln!(
            self.out,
            "\n{BOLD}Action:{RESET} {GREEN}y{RESET} (all), {RED}n{RESET} (skip), {CYAN}numbers{RESET} (select, e.g. 1,3-4) or type a message to interrupt."
        )?;
        self.out.flush()?;

        let Some(line) = self.reader.read_line("Choice [y]: ")? else {
            return self.finish();
        };

        match classify_decision(&line, commands.len()) {
            Decision::All => Ok(Phase::Executing { commands, rounds }),
            Decision::Skip => {
                info!("User skipped {} command(s)", commands.len());
                self.conversation.push_skipped();
                Ok(self.after_tool_output(rounds))
            }
            Decision::Select(indices) => {
                let selected = indices.into_iter().map(|i| commands[i].clone()).collect();
                Ok(Phase::Executing {
                    commands: selected,
                    rounds,
                })
            }
            Decision::Interrupt(message) => {
                writeln!(self.out, "Understood, interrupting with new input.")?;
                self.conversation.push_user(&message);
                Ok(Phase::AiWorking { rounds: 0 })
            }
        }
    }

    async fn execute_batch(&mut self, commands: &[String], rounds: usize) -> Result<Phase> {
        let mut blocks = Vec::with_capacity(commands.len());

        for command in commands {
            writeln!(self.out, "\n{BOLD_YELLOW}Executing:{RESET} {CYAN}{}{RESET}", command)?;
            self.out.flush()?;

            let result = self.executor.execute(command).await;
            self.display_result(&result)?;

            if let Err(e) = self.command_log.record(
                self.executor.working_directory(),
                &result.command,
                &result.output,
            ) {
                warn!("Could not log command '{}': {:#}", result.command, e);
                writeln!(self.out, "{RED}Error writing command log: {:#}{RESET}", e)?;
            }

            blocks.push(result.transcript());
        }

        self.conversation.push_tool_output(&blocks);
        Ok(self.after_tool_output(rounds))
    }

    fn display_result(&mut self, result: &ExecutionResult) -> Result<()> {
        let color = match result.status {
            ExecStatus::Ok => DIM,
            ExecStatus::Success => GREEN,
            ExecStatus::Warning => RED,
            ExecStatus::Timeout => YELLOW,
        };
        writeln!(self.out, "{color}{}{RESET}", result.output)?;
        Ok(())
    }

    fn after_tool_output(&self, rounds: usize) -> Phase {
        if self.options.auto_continue {
            Phase::AiWorking { rounds }
        } else {
            Phase::AwaitingUserInput
        }
    }

    fn finish(&mut self) -> Result<Phase> {
        writeln!(self.out, "See you later!")?;
        Ok(Phase::Finished)
    }
}
