//! File system utilities, installed as the `fs` library.
//!
//! Operating system failures are returned the Lua way, as
//! `nil, "<path>: <reason>", errno`. Bad arguments raise an error.

use std::fs;
use std::io;
use std::os::unix::fs as unix_fs;

use crate::runtime::{NativeFn, NativeLibrary};
use crate::value::Value;

pub const FS_LIBRARY: NativeLibrary = NativeLibrary {
    name: "fs",
    functions: &[
        ("listdir", listdir as NativeFn),
        ("exists", exists as NativeFn),
        ("symlink", symlink as NativeFn),
        ("isdir", isdir as NativeFn),
        ("basename", basename as NativeFn),
        ("dirname", dirname as NativeFn),
    ],
};

fn failure(path: &str, err: io::Error) -> Vec<Value> {
    let errno = err.raw_os_error().unwrap_or(0);
    let text = err.to_string();
    let reason = text.split(" (os error").next().unwrap_or(&text);
    vec![
        Value::Nil,
        Value::String(format!("{path}: {reason}")),
        Value::Integer(errno.into()),
    ]
}

fn arg_str(args: &[Value], n: usize, func: &str) -> Result<Option<String>, String> {
    match args.get(n) {
        None | Some(Value::Nil) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Bytes(b)) => Ok(Some(String::from_utf8_lossy(b).into_owned())),
        Some(Value::Integer(i)) => Ok(Some(i.to_string())),
        Some(Value::Number(x)) => Ok(Some(x.to_string())),
        Some(other) => Err(format!(
            "bad argument #{} to '{func}' (string expected, got {})",
            n + 1,
            other.type_name()
        )),
    }
}

fn check_str(args: &[Value], n: usize, func: &str) -> Result<String, String> {
    arg_str(args, n, func)?.ok_or_else(|| {
        format!("bad argument #{} to '{func}' (string expected, got no value)", n + 1)
    })
}

/// Lists a directory, `.` by default. Dot-files only when `hidden` is true.
/// Returns the list of names and its length.
fn listdir(args: &[Value]) -> Result<Vec<Value>, String> {
    let path = arg_str(args, 0, "listdir")?.unwrap_or_else(|| ".".to_owned());
    let hidden = args.get(1).is_some_and(Value::is_truthy);

    let entries = match fs::read_dir(&path) {
        Ok(entries) => entries,
        Err(err) => return Ok(failure(&path, err)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => return Ok(failure(&path, err)),
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if hidden || !name.starts_with('.') {
            names.push(Value::String(name));
        }
    }
    let count = names.len() as i64;
    Ok(vec![Value::List(names), Value::Integer(count)])
}

/// Does not follow symlinks: a dangling link exists.
fn exists(args: &[Value]) -> Result<Vec<Value>, String> {
    let path = check_str(args, 0, "exists")?;
    Ok(match fs::symlink_metadata(&path) {
        Ok(_) => vec![Value::Boolean(true)],
        Err(err) if err.kind() == io::ErrorKind::NotFound => vec![Value::Boolean(false)],
        Err(err) => failure(&path, err),
    })
}

fn symlink(args: &[Value]) -> Result<Vec<Value>, String> {
    let target = check_str(args, 0, "symlink")?;
    let path = check_str(args, 1, "symlink")?;
    Ok(match unix_fs::symlink(&target, &path) {
        Ok(()) => vec![Value::Integer(0)],
        Err(err) => failure(&path, err),
    })
}

fn isdir(args: &[Value]) -> Result<Vec<Value>, String> {
    let path = check_str(args, 0, "isdir")?;
    Ok(match fs::metadata(&path) {
        Ok(meta) => vec![Value::Boolean(meta.is_dir())],
        Err(err) => failure(&path, err),
    })
}

fn basename(args: &[Value]) -> Result<Vec<Value>, String> {
    let path = check_str(args, 0, "basename")?;
    Ok(vec![posix_basename(&path).into()])
}

fn dirname(args: &[Value]) -> Result<Vec<Value>, String> {
    let path = check_str(args, 0, "dirname")?;
    Ok(vec![posix_dirname(&path).into()])
}

/// Last component, ignoring trailing slashes, as POSIX `basename(3)`.
pub fn posix_basename(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Everything before the last component, as POSIX `dirname(3)`.
pub fn posix_dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { "/" };
    }
    match trimmed.rfind('/') {
        None => ".",
        Some(i) => match trimmed[..i].trim_end_matches('/') {
            "" => "/",
            parent => parent,
        },
    }
}
