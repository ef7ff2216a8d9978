use std::path::PathBuf;

use thiserror::Error;

use crate::resolve::ResolveError;
use crate::runtime::{SyntaxError, VmError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("incompatible runtime: {0}")]
    Version(VmError),
    #[error("could not control the garbage collector (libdir = '{libdir}'): {source}")]
    Gc { libdir: String, source: VmError },
    #[error("could not open standard libraries (libdir = '{libdir}'): {source}")]
    Stdlib { libdir: String, source: VmError },
    #[error("could not install library '{name}' (libdir = '{libdir}'): {source}")]
    Library {
        name: &'static str,
        libdir: String,
        source: VmError,
    },
    #[error("could not install environment (libdir = '{libdir}'): {source}")]
    Environment { libdir: String, source: VmError },
    #[error("could not compile boot code (libdir = '{libdir}'): {source}")]
    Compile { libdir: String, source: SyntaxError },
    #[error("could not initialize, libdir = '{libdir}'\n{message}")]
    Init { libdir: String, message: String },
}

/// Failures that end the process with a non-zero status.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("could not initialize Lua VM: {0}")]
    Runtime(VmError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("{message}")]
    Script { path: PathBuf, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LaunchError>;
