//! The interactive read-eval-print loop.

use std::io::{self, Write};

use tracing::{debug, trace, warn};

use crate::pcall::{protected_call, CallResult};
use crate::readline::LineReader;
use crate::runtime::{GcMode, Runtime};

pub const PROMPT: &str = "(chisel) ";
pub const PROMPT_CONTINUE: &str = "    ...) ";
pub const CHUNK_NAME: &str = "=stdin";

/// Printed when an error object has no text to show.
pub const NOT_A_STRING: &str = "(error object is not a string)";

/// Prefixes `return` so that bare expressions print their value.
/// Lines that already return, or contain `=`, are kept as typed.
pub fn rewrite_first_line(line: &str) -> String {
    if line.is_empty() || line.starts_with("return") || line.contains('=') {
        line.to_owned()
    } else {
        format!("return {line}")
    }
}

pub struct Repl<L, O, E> {
    reader: L,
    stdout: O,
    stderr: E,
}

impl<L: LineReader, O: Write, E: Write> Repl<L, O, E> {
    pub fn new(reader: L, stdout: O, stderr: E) -> Self {
        Self {
            reader,
            stdout,
            stderr,
        }
    }

    /// Runs until end of input. Errors from user code are reported and
    /// never end the session; only I/O failures on the terminal do.
    pub fn run<R: Runtime>(&mut self, runtime: &mut R) -> io::Result<()> {
        loop {
            runtime.clear_stack();
            let outcome = match self.load_statement(runtime)? {
                CallResult::Ok(chunk) => protected_call(runtime, &chunk),
                CallResult::SyntaxError(message) => CallResult::SyntaxError(message),
                CallResult::RuntimeError(message) => CallResult::RuntimeError(message),
                CallResult::NoInput => break,
            };
            match outcome {
                CallResult::Ok(values) => self.print_results(runtime, values)?,
                CallResult::SyntaxError(message) => self.report(runtime, Some(message))?,
                CallResult::RuntimeError(message) => self.report(runtime, message)?,
                CallResult::NoInput => break,
            }
        }
        runtime.clear_stack();
        writeln!(self.stdout)?;
        self.stdout.flush()
    }

    /// Reads lines until they form a chunk that compiles, or fails to
    /// compile for a reason other than running out of input.
    fn load_statement<R: Runtime>(&mut self, runtime: &mut R) -> io::Result<CallResult<R::Chunk>> {
        let Some(first) = self.reader.read_line(PROMPT)? else {
            return Ok(CallResult::NoInput);
        };
        let mut typed = first.clone();
        let mut pending = rewrite_first_line(&first);

        loop {
            match runtime.compile(pending.as_bytes(), CHUNK_NAME) {
                Ok(chunk) => {
                    trace!(statement = %pending, "compiled");
                    if !typed.trim().is_empty() {
                        self.reader.add_history(&typed);
                    }
                    return Ok(CallResult::Ok(chunk));
                }
                Err(err) if runtime.is_incomplete(&err) => {
                    trace!(%err, "statement incomplete");
                    let Some(line) = self.reader.read_line(PROMPT_CONTINUE)? else {
                        return Ok(CallResult::NoInput);
                    };
                    pending.push('\n');
                    pending.push_str(&line);
                    typed.push('\n');
                    typed.push_str(&line);
                }
                Err(err) => return Ok(CallResult::SyntaxError(err.message)),
            }
        }
    }

    fn print_results<R: Runtime>(&mut self, runtime: &mut R, values: R::Values) -> io::Result<()> {
        if runtime.result_count(&values) == 0 {
            return Ok(());
        }
        if let Err(message) = runtime.print(values) {
            writeln!(self.stderr, "error calling \"print\" ({message})")?;
            self.stderr.flush()?;
        }
        Ok(())
    }

    fn report<R: Runtime>(&mut self, runtime: &mut R, message: Option<String>) -> io::Result<()> {
        writeln!(self.stderr, "{}", message.as_deref().unwrap_or(NOT_A_STRING))?;
        self.stderr.flush()?;
        debug!("collecting garbage after error");
        if let Err(err) = runtime.gc(GcMode::Collect) {
            warn!(%err, "garbage collection failed");
        }
        Ok(())
    }
}
