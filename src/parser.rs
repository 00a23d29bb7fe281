use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::types::ParsedResponse;

const FENCE_OPEN: &str = "```bash";

fn bash_block_regex() -> &'static Regex {
    static BASH_BLOCK: OnceLock<Regex> = OnceLock::new();
    // The closing fence must start its own line; backticks inside a command
    // do not end the block. An empty body still matches.
    BASH_BLOCK.get_or_init(|| {
        Regex::new(r"(?sm)```bash[ \t]*\r?\n(.*?)^[ \t]*```").expect("static regex is valid")
    })
}

/// Splits a raw model response into its explanation and the commands of the
/// first ```bash block.
pub fn parse_response(text: &str) -> ParsedResponse {
    let Some(captures) = bash_block_regex().captures(text) else {
        debug!("No bash block in response, treating it as final");
        return ParsedResponse {
            explanation: text.trim().to_string(),
            commands: Vec::new(),
        };
    };

    let explanation = text
        .split(FENCE_OPEN)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    let commands: Vec<String> = captures
        .get(1)
        .map(|body| body.as_str())
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    debug!("Parsed {} command(s) from response", commands.len());

    ParsedResponse {
        explanation,
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explanation_and_commands() {
        let parsed = parse_response("Do X.\n```bash\nls -la\npwd\n```");
        assert_eq!(parsed.explanation, "Do X.");
        assert_eq!(parsed.commands, vec!["ls -la", "pwd"]);
    }

    #[test]
    fn test_no_block_means_done() {
        let parsed = parse_response("  All done!\n");
        assert_eq!(parsed.explanation, "All done!");
        assert!(parsed.commands.is_empty());
    }

    #[test]
    fn test_empty_block_yields_no_commands() {
        let parsed = parse_response("Task solved, nothing left to run.\n```bash\n```");
        assert_eq!(parsed.explanation, "Task solved, nothing left to run.");
        assert!(!parsed.has_commands());
    }

    #[test]
    fn test_backticks_inside_a_command_do_not_close_the_block() {
        let parsed =
            parse_response("Add a fence to the README.\n```bash\necho '```' >> README.md\nls\n```");
        assert_eq!(parsed.explanation, "Add a fence to the README.");
        assert_eq!(parsed.commands, vec!["echo '```' >> README.md", "ls"]);
    }

    #[test]
    fn test_indented_closing_fence() {
        let parsed = parse_response("Nested in a list:\n  ```bash\n  whoami\n  ```\nDone.");
        assert_eq!(parsed.commands, vec!["whoami"]);
    }

    #[test]
    fn test_blank_lines_and_indentation_are_dropped() {
        let parsed = parse_response("Check disks\n```bash\n\n   df -h  \n\n\tdu -sh /var\n```\n");
        assert_eq!(parsed.commands, vec!["df -h", "du -sh /var"]);
    }

    #[test]
    fn test_only_first_block_is_honored() {
        let text = "First\n```bash\nuname -a\n```\nThen maybe\n```bash\nrm -rf /tmp/x\n```";
        let parsed = parse_response(text);
        assert_eq!(parsed.explanation, "First");
        assert_eq!(parsed.commands, vec!["uname -a"]);
    }

    #[test]
    fn test_other_languages_are_not_commands() {
        let text = "Here is a config file\n```toml\n[package]\nname = \"x\"\n```";
        let parsed = parse_response(text);
        assert!(parsed.commands.is_empty());
        assert_eq!(parsed.explanation, text.trim());
    }

    #[test]
    fn test_crlf_line_endings() {
        let parsed = parse_response("Windows style\r\n```bash\r\nls\r\npwd\r\n```");
        assert_eq!(parsed.explanation, "Windows style");
        assert_eq!(parsed.commands, vec!["ls", "pwd"]);
    }

    #[test]
    fn test_reparsing_rendered_response_is_stable() {
        let samples = [
            "Do X.\n```bash\nls -la\npwd\n```",
            "All done!",
            "## Plan\n\n1. update\n2. install\n```bash\nsudo apt update\nsudo apt install -y htop\n```\ntrailing",
            "```bash\necho only commands\n```",
        ];

        for sample in samples {
            let first = parse_response(sample);
            let second = parse_response(&first.render());
            assert_eq!(first, second, "unstable parse for {:?}", sample);
        }
    }
}
