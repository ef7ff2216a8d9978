use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub const SCRIPT_EXTENSION: &str = "lua";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScript {
    pub path: PathBuf,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "could not find script '{requested}', checked locations:\n    - {}\n    - {}",
    .library.display(),
    .literal.display()
)]
pub struct ResolveError {
    pub requested: String,
    pub library: PathBuf,
    pub literal: PathBuf,
}

/// The part after the last `/`; empty when the name ends with one.
pub fn base_name(requested: &str) -> &str {
    requested.rsplit('/').next().unwrap_or(requested)
}

/// Regular file with at least one of the owner/group/other read bits set.
fn is_readable_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o444 != 0,
        Err(_) => false,
    }
}

/// Looks for `<libdir>/<base>.lua` first, so that a binary invoked through
/// a symlink finds its script next to the library, then for `requested`
/// exactly as given.
pub fn resolve(requested: &str, libdir: &str) -> Result<ResolvedScript, ResolveError> {
    let library = PathBuf::from(format!(
        "{libdir}/{}.{SCRIPT_EXTENSION}",
        base_name(requested)
    ));
    if is_readable_file(&library) {
        debug!(path = %library.display(), "script found in library directory");
        return Ok(ResolvedScript {
            path: library,
            exists: true,
        });
    }

    let literal = PathBuf::from(requested);
    if is_readable_file(&literal) {
        debug!(path = %literal.display(), "script found at literal path");
        return Ok(ResolvedScript {
            path: literal,
            exists: true,
        });
    }

    Err(ResolveError {
        requested: requested.to_owned(),
        library,
        literal,
    })
}
