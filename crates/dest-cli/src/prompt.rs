//! Blocking console prompts.
//!
//! Every prompt recognizes `quit`/`q` and returns [`PromptError::Cancelled`].
//! Prompt helpers return that variant with `?` all the way up to the command
//! handler, so one `quit` abandons the whole record being built.

use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Printed once when the operator quits a prompt sequence.
pub const QUIT_MESSAGE: &str = "\nDEST: Quitting DEST command...\n";

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("cancelled by operator")]
    Cancelled,

    #[error("input closed")]
    Eof,

    #[error("console IO error: {0}")]
    Io(#[from] io::Error),
}

/// True for the cancellation keywords.
pub fn is_quit(answer: &str) -> bool {
    answer == "quit" || answer == "q"
}

/// An operator console: a line-oriented input and a text output.
pub struct Console<'a> {
    input: Box<dyn BufRead + 'a>,
    output: Box<dyn Write + 'a>,
}

impl<'a> Console<'a> {
    pub fn new(input: impl BufRead + 'a, output: impl Write + 'a) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    /// Read one raw line without interpreting it.  `None` at end of input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Print `prompt` (newline-terminated) and read the trimmed answer.
    pub fn ask(&mut self, prompt: &str) -> Result<String, PromptError> {
        writeln!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let answer = self.read_line()?.ok_or(PromptError::Eof)?;
        if is_quit(&answer) {
            writeln!(self.output, "{}", QUIT_MESSAGE)?;
            self.output.flush()?;
            return Err(PromptError::Cancelled);
        }
        Ok(answer)
    }

    /// Ask until `parse` accepts the answer.  Empty input yields `default`
    /// when one is given; otherwise it is handed to `parse` like any text.
    pub fn ask_until<T>(
        &mut self,
        prompt: &str,
        default: Option<T>,
        retry: &str,
        mut parse: impl FnMut(&str) -> Option<T>,
    ) -> Result<T, PromptError> {
        let mut default = default;
        loop {
            let answer = self.ask(prompt)?;
            if answer.is_empty() {
                if let Some(value) = default.take() {
                    return Ok(value);
                }
            }
            if let Some(value) = parse(&answer) {
                return Ok(value);
            }
            writeln!(self.output, "{}", retry)?;
        }
    }

    /// `Y`/`y` means yes; anything else means no.
    pub fn confirm(&mut self, question: &str) -> Result<bool, PromptError> {
        let answer = self.ask(question)?;
        Ok(answer == "Y" || answer == "y")
    }
}

impl Write for Console<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
