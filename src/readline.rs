//! Line input for the REPL.
//!
//! [`PlainReader`] prints the prompt and does a bounded blocking read.
//! With the `readline` feature, [`HistoryReader`] wraps a `rustyline`
//! editor and keeps a history of accepted statements.

use std::io::{self, BufRead, Write};

use tracing::warn;

/// Longest physical line accepted, in bytes.
pub const MAX_INPUT: usize = 512;

pub trait LineReader {
    /// Shows `prompt` and reads one physical line without its line
    /// terminator. `None` means end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    fn add_history(&mut self, _line: &str) {}
}

/// Removes the line terminator and enforces [`MAX_INPUT`].
pub fn trim_line(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    if line.len() > MAX_INPUT {
        let mut end = MAX_INPUT;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        warn!(len = line.len(), "input line truncated to {MAX_INPUT} bytes");
        line.truncate(end);
    }
    line
}

pub struct PlainReader<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> PlainReader<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl PlainReader<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LineReader for PlainReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.prompt_out.write_all(prompt.as_bytes())?;
        self.prompt_out.flush()?;

        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(trim_line(String::from_utf8_lossy(&buf).into_owned())))
    }
}

#[cfg(feature = "readline")]
pub use history::HistoryReader;

#[cfg(feature = "readline")]
mod history {
    use std::io;
    use std::path::PathBuf;

    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use tracing::{debug, warn};

    use super::{trim_line, LineReader};

    pub struct HistoryReader {
        editor: DefaultEditor,
        file: Option<PathBuf>,
    }

    impl HistoryReader {
        /// `file` is loaded now, if it exists, and rewritten on drop.
        pub fn new(file: Option<PathBuf>) -> io::Result<Self> {
            let mut editor = DefaultEditor::new().map_err(io::Error::other)?;
            if let Some(path) = &file {
                if let Err(err) = editor.load_history(path) {
                    debug!(path = %path.display(), %err, "no history loaded");
                }
            }
            Ok(Self { editor, file })
        }
    }

    impl LineReader for HistoryReader {
        fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
            match self.editor.readline(prompt) {
                Ok(line) => Ok(Some(trim_line(line))),
                // No signal handling: Ctrl-C ends the session like Ctrl-D.
                Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
                Err(ReadlineError::Io(err)) => Err(err),
                Err(err) => Err(io::Error::other(err)),
            }
        }

        fn add_history(&mut self, line: &str) {
            if let Err(err) = self.editor.add_history_entry(line) {
                warn!(%err, "could not record history entry");
            }
        }
    }

    impl Drop for HistoryReader {
        fn drop(&mut self) {
            if let Some(path) = &self.file {
                if let Err(err) = self.editor.save_history(path) {
                    warn!(path = %path.display(), %err, "could not save history");
                }
            }
        }
    }
}
