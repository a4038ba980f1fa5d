//! Operator confirmation prompts.

use std::io::{self, BufRead, Write};

/// Ask the operator a yes/no question
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Prompt on stdout and read the answer from stdin.
///
/// Blocks until a line arrives. End of input counts as "no".
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let mut stdout = io::stdout();
        write!(stdout, "  [*] {} [y/N] ", question)?;
        stdout.flush()?;

        let mut answer = String::new();
        let read = io::stdin().lock().read_line(&mut answer)?;
        if read == 0 {
            return Ok(false);
        }
        Ok(is_affirmative(&answer))
    }
}

/// Answer yes to everything (`--yes`)
#[derive(Debug, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        log::info!("{} [assumed yes]", question);
        Ok(true)
    }
}

/// Only an explicit `y` or `yes` counts; the default is no.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
