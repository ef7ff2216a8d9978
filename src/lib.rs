//! Launcher for Lua scripts: finds the script, boots an embedded Lua state
//! with a `chisel` table describing the invocation, then runs the script
//! or an interactive prompt.

pub mod bootstrap;
pub mod config;
pub mod env;
pub mod error;
pub mod fs;
pub mod logging;
pub mod pcall;
pub mod readline;
pub mod repl;
pub mod resolve;
pub mod runtime;
pub mod value;
pub mod vm;

#[cfg(test)]
mod fake;

use std::borrow::Cow;
use std::path::Path;

use crate::error::LaunchError;
use crate::pcall::{protected_call, CallResult};
use crate::repl::NOT_A_STRING;
use crate::runtime::Runtime;

/// Libraries installed next to the Lua standard library.
pub const NATIVE_LIBRARIES: &[runtime::NativeLibrary] = &[fs::FS_LIBRARY];

/// Blanks out a leading `#` line so scripts can start with `#!`. The line
/// break is kept so that line numbers in messages stay right.
pub fn skip_shebang(source: &[u8]) -> Cow<'_, [u8]> {
    if source.first() != Some(&b'#') {
        return Cow::Borrowed(source);
    }
    match source.iter().position(|&b| b == b'\n') {
        Some(eol) => Cow::Borrowed(&source[eol..]),
        None => Cow::Borrowed(&[]),
    }
}

/// Compiles and runs `source` once. Any failure is fatal to the caller.
pub fn run_chunk<R: Runtime>(
    runtime: &mut R,
    source: &[u8],
    chunk_name: &str,
    path: &Path,
) -> error::Result<()> {
    let script_error = |message: String| LaunchError::Script {
        path: path.to_owned(),
        message,
    };

    let chunk = runtime
        .compile(&skip_shebang(source), chunk_name)
        .map_err(|err| script_error(err.message))?;
    match protected_call(runtime, &chunk) {
        CallResult::Ok(_) | CallResult::NoInput => Ok(()),
        CallResult::SyntaxError(message) => Err(script_error(message)),
        CallResult::RuntimeError(message) => Err(script_error(
            message.unwrap_or_else(|| NOT_A_STRING.to_owned()),
        )),
    }
}
