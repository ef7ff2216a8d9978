//! Scripted stand-ins for the runtime and the line reader.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::readline::LineReader;
use crate::runtime::{GcMode, NativeLibrary, Raised, Runtime, SyntaxError, VmError, EOF_MARK};
use crate::value::Value;

/// Ordered record of what the reader and the runtime were asked to do.
pub type EventLog = Rc<RefCell<Vec<String>>>;

/// Compiles a chunk to its own source text. A chunk with more block
/// openers (`do`, `then`, `function`) than `end`s is incomplete. Calling
/// `return <rest>` yields `rest` as a single result.
#[derive(Default)]
pub struct FakeRuntime {
    pub log: EventLog,
    pub version_error: Option<String>,
    pub gc_error: Option<String>,
    pub stdlib_error: Option<String>,
    pub library_error: Option<String>,
    pub global_error: Option<String>,
    pub syntax_on: Vec<String>,
    pub raise_on: Vec<(String, Raised)>,
    pub print_error: Option<String>,
    pub globals: Vec<(String, Value)>,
    pub libraries: Vec<String>,
    pub compiled: Vec<String>,
    pub printed: Vec<Vec<String>>,
    pub gc_calls: Vec<GcMode>,
}

impl FakeRuntime {
    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn raising(mut self, pattern: &str, raised: Raised) -> Self {
        self.raise_on.push((pattern.to_owned(), raised));
        self
    }

    fn event(&self, event: impl Into<String>) {
        self.log.borrow_mut().push(event.into());
    }
}

fn open_blocks(source: &str) -> isize {
    source
        .split(|c: char| !c.is_alphanumeric())
        .map(|word| match word {
            "do" | "then" | "function" => 1,
            "end" => -1,
            _ => 0,
        })
        .sum()
}

impl Runtime for FakeRuntime {
    type Chunk = String;
    type Values = Vec<String>;

    fn check_version(&self) -> Result<(), VmError> {
        self.event("check_version");
        match &self.version_error {
            Some(e) => Err(VmError::new(e.clone())),
            None => Ok(()),
        }
    }

    fn gc(&mut self, mode: GcMode) -> Result<(), VmError> {
        self.event(format!("gc {mode:?}"));
        if let Some(e) = &self.gc_error {
            return Err(VmError::new(e.clone()));
        }
        self.gc_calls.push(mode);
        Ok(())
    }

    fn open_stdlib(&mut self) -> Result<(), VmError> {
        self.event("open_stdlib");
        match &self.stdlib_error {
            Some(e) => Err(VmError::new(e.clone())),
            None => Ok(()),
        }
    }

    fn install_library(&mut self, library: &NativeLibrary) -> Result<(), VmError> {
        self.event(format!("install {}", library.name));
        if let Some(e) = &self.library_error {
            return Err(VmError::new(e.clone()));
        }
        self.libraries.push(library.name.to_owned());
        Ok(())
    }

    fn set_global(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        self.event(format!("set_global {name}"));
        if let Some(e) = &self.global_error {
            return Err(VmError::new(e.clone()));
        }
        self.globals.push((name.to_owned(), value));
        Ok(())
    }

    fn compile(&mut self, source: &[u8], chunk_name: &str) -> Result<String, SyntaxError> {
        let source = String::from_utf8_lossy(source).into_owned();
        self.event(format!("compile {source:?}"));
        self.compiled.push(source.clone());
        let name = chunk_name.trim_start_matches(['=', '@']);
        if let Some(bad) = self.syntax_on.iter().find(|p| source.contains(p.as_str())) {
            return Err(SyntaxError::new(format!(
                "{name}:1: unexpected symbol near '{bad}'"
            )));
        }
        if open_blocks(&source) > 0 {
            let line = source.lines().count().max(1);
            return Err(SyntaxError::new(format!(
                "{name}:{line}: 'end' expected near {EOF_MARK}"
            )));
        }
        Ok(source)
    }

    fn call_protected(&mut self, chunk: &String) -> Result<Vec<String>, Raised> {
        self.event(format!("call {chunk:?}"));
        if let Some((_, raised)) = self.raise_on.iter().find(|(p, _)| chunk.contains(p.as_str())) {
            return Err(raised.clone());
        }
        Ok(match chunk.strip_prefix("return") {
            Some(rest) if !rest.trim().is_empty() => vec![rest.trim().to_owned()],
            _ => Vec::new(),
        })
    }

    fn result_count(&self, values: &Vec<String>) -> usize {
        values.len()
    }

    fn print(&mut self, values: Vec<String>) -> Result<(), String> {
        self.event(format!("print {values:?}"));
        if let Some(e) = &self.print_error {
            return Err(e.clone());
        }
        self.printed.push(values);
        Ok(())
    }

    fn clear_stack(&mut self) {
        self.event("clear_stack");
    }
}

/// Replays canned input lines, then reports end of input.
#[derive(Default)]
pub struct ScriptedReader {
    pub lines: VecDeque<String>,
    pub prompts: Vec<String>,
    pub history: Vec<String>,
    pub log: EventLog,
}

impl ScriptedReader {
    pub fn new(lines: &[&str], log: EventLog) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            log,
            ..Self::default()
        }
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.prompts.push(prompt.to_owned());
        let line = self.lines.pop_front();
        self.log
            .borrow_mut()
            .push(format!("read {:?}", line.as_deref().unwrap_or("<EOF>")));
        Ok(line)
    }

    fn add_history(&mut self, line: &str) {
        self.history.push(line.to_owned());
    }
}
