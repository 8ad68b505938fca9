//! Operator prompts.
use std::io::{self, BufRead, Write};

use crate::error::Result;

/// Source of operator answers.
pub trait Prompt {
    /// Show a message and read one answer. `None` means input is exhausted.
    fn ask(&mut self, message: &str) -> Result<Option<String>>;

    /// Show a message that needs no answer.
    fn say(&mut self, message: &str) -> Result<()>;
}

/// Reads answers from stdin.
#[derive(Default)]
pub struct Terminal;

impl Prompt for Terminal {
    fn ask(&mut self, message: &str) -> Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{message}")?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(io::stdout().lock(), "{message}")?;
        Ok(())
    }
}

/// Answer to a destructive action confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// The operator typed exactly `yes`.
    Accepted,
    /// Anything else.
    Declined,
}

/// Ask for a destructive action confirmation. Only the literal `yes` accepts.
pub fn confirm(prompt: &mut impl Prompt, message: &str) -> Result<Confirmation> {
    match prompt.ask(&format!("{message} Type 'yes' to continue: "))? {
        Some(answer) if answer == "yes" => Ok(Confirmation::Accepted),
        _ => Ok(Confirmation::Declined),
    }
}

/// Ask a y/N question. `y` and `yes` in any case accept, anything else declines.
pub fn ask_yes_no(prompt: &mut impl Prompt, message: &str) -> Result<bool> {
    Ok(prompt
        .ask(&format!("{message} (y/N): "))?
        .map(|answer| is_yes(&answer))
        .unwrap_or(false))
}

/// True for `y` or `yes` in any case.
pub fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
