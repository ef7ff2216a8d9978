//! The boundary between the launcher and the embedded interpreter.
//!
//! Everything the bootstrap sequence and the REPL need from the VM goes
//! through [`Runtime`], so both can be driven by a fake in tests.

use thiserror::Error;

use crate::value::Value;

/// Trailing marker of a syntax error caused only by truncated input.
pub const EOF_MARK: &str = "<eof>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcMode {
    Stop,
    Restart,
    Collect,
}

/// Failure of a runtime primitive other than compiling or calling a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct VmError(pub String);

impl VmError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An error object as seen by the message handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorValue {
    Text(String),
    /// Non-string object; holds the output of its `__tostring`, if it has one.
    Opaque(Option<String>),
    Nil,
}

/// What the message handler recorded at the point the error was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raised {
    pub value: ErrorValue,
    /// Only collected for `Text` errors.
    pub traceback: String,
}

impl Raised {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            value: ErrorValue::Text(message.into()),
            traceback: String::new(),
        }
    }
}

/// A host function exposed to scripts. `Err` is raised as a script error;
/// recoverable failures belong in the returned values.
pub type NativeFn = fn(&[Value]) -> Result<Vec<Value>, String>;

/// A table of host functions installed under a fixed global name.
#[derive(Debug, Clone, Copy)]
pub struct NativeLibrary {
    pub name: &'static str,
    pub functions: &'static [(&'static str, NativeFn)],
}

pub trait Runtime {
    type Chunk;
    type Values;

    fn check_version(&self) -> Result<(), VmError>;

    fn gc(&mut self, mode: GcMode) -> Result<(), VmError>;

    fn open_stdlib(&mut self) -> Result<(), VmError>;

    fn install_library(&mut self, library: &NativeLibrary) -> Result<(), VmError>;

    fn set_global(&mut self, name: &str, value: Value) -> Result<(), VmError>;

    fn compile(&mut self, source: &[u8], chunk_name: &str) -> Result<Self::Chunk, SyntaxError>;

    /// Whether `error` was caused only by the input ending too early.
    fn is_incomplete(&self, error: &SyntaxError) -> bool {
        error.message.ends_with(EOF_MARK)
    }

    /// Calls `chunk` with no arguments, keeping every result. A message
    /// handler sits below the call frame for the duration of the call only.
    fn call_protected(&mut self, chunk: &Self::Chunk) -> Result<Self::Values, Raised>;

    fn result_count(&self, values: &Self::Values) -> usize;

    /// Hands `values` to the runtime's own `print`.
    fn print(&mut self, values: Self::Values) -> Result<(), String>;

    /// Drops any transient values left over from the previous evaluation.
    fn clear_stack(&mut self);
}
