//! [`Runtime`] backed by an embedded Lua 5.4 state.

use std::cell::RefCell;
use std::panic;
use std::rc::Rc;

use mlua::{Function, Lua, LuaOptions, MultiValue, StdLib, Table};
use tracing::trace;

use crate::runtime::{ErrorValue, GcMode, NativeLibrary, Raised, Runtime, SyntaxError, VmError};
use crate::value::Value;

pub const LUA_VERSION: &str = "Lua 5.4";

const TRACEBACK_MARK: &str = "\nstack traceback:";

pub struct LuaVm {
    lua: Lua,
    xpcall: Function,
}

fn vm_error(err: mlua::Error) -> VmError {
    VmError::new(message_only(&err))
}

/// The error text without the traceback `mlua` appends to runtime errors.
fn message_only(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(message) => message
            .split_once(TRACEBACK_MARK)
            .map_or(message.as_str(), |(head, _)| head)
            .to_owned(),
        mlua::Error::CallbackError { cause, .. } => message_only(cause),
        other => other.to_string(),
    }
}

impl LuaVm {
    pub fn new() -> Result<Self, VmError> {
        // SAFETY: the unsafe constructor only lifts the restriction on the
        // debug library, which tracebacks need. Libraries are opened later.
        let lua = panic::catch_unwind(|| unsafe {
            Lua::unsafe_new_with(StdLib::NONE, LuaOptions::new())
        })
        .map_err(|_| VmError::new("could not allocate a Lua state"))?;
        // Kept aside so scripts reassigning the global cannot break error reporting.
        let xpcall = lua.globals().get::<Function>("xpcall").map_err(vm_error)?;
        Ok(Self { lua, xpcall })
    }

    fn install(&self, library: &NativeLibrary) -> mlua::Result<()> {
        let table = self.lua.create_table()?;
        for &(name, func) in library.functions {
            let f = self.lua.create_function(move |lua, args: MultiValue| {
                let args: Vec<Value> = args.iter().map(from_lua).collect();
                let results = func(&args)
                    .map_err(mlua::Error::RuntimeError)?
                    .iter()
                    .map(|v| to_lua(lua, v))
                    .collect::<mlua::Result<Vec<_>>>()?;
                Ok(MultiValue::from_vec(results))
            })?;
            table.set(name, f)?;
        }

        let globals = self.lua.globals();
        globals.set(library.name, table.clone())?;
        if let Some(package) = globals.get::<Option<Table>>("package")? {
            if let Some(loaded) = package.get::<Option<Table>>("loaded")? {
                loaded.set(library.name, table)?;
            }
        }
        Ok(())
    }
}

/// Only primitive values are passed to host functions; anything else
/// arrives as its type name.
fn from_lua(value: &mlua::Value) -> Value {
    match value {
        mlua::Value::Nil => Value::Nil,
        mlua::Value::Boolean(b) => Value::Boolean(*b),
        mlua::Value::Integer(i) => Value::Integer(*i),
        mlua::Value::Number(n) => Value::Number(*n),
        mlua::Value::String(s) => Value::from_bytes(s.as_bytes().to_vec()),
        other => Value::Opaque(other.type_name()),
    }
}

fn to_lua(lua: &Lua, value: &Value) -> mlua::Result<mlua::Value> {
    Ok(match value {
        Value::Nil => mlua::Value::Nil,
        Value::Boolean(b) => mlua::Value::Boolean(*b),
        Value::Integer(i) => mlua::Value::Integer(*i),
        Value::Number(n) => mlua::Value::Number(*n),
        Value::String(s) => mlua::Value::String(lua.create_string(s)?),
        Value::Bytes(b) => mlua::Value::String(lua.create_string(b)?),
        Value::Opaque(_) => mlua::Value::Nil,
        Value::List(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, to_lua(lua, item)?)?;
            }
            mlua::Value::Table(table)
        }
        Value::Table(fields) => {
            let table = lua.create_table()?;
            for (key, item) in fields {
                table.raw_set(to_lua(lua, key)?, to_lua(lua, item)?)?;
            }
            mlua::Value::Table(table)
        }
    })
}

fn debug_function(lua: &Lua, name: &str) -> mlua::Result<Option<Function>> {
    match lua.globals().get::<Option<Table>>("debug")? {
        Some(debug) => debug.get::<Option<Function>>(name),
        None => Ok(None),
    }
}

/// Result of the object's `__tostring` metamethod, when it has one that
/// yields a string.
fn tostring_metamethod(lua: &Lua, value: &mlua::Value) -> mlua::Result<Option<String>> {
    let Some(getmetatable) = debug_function(lua, "getmetatable")? else {
        return Ok(None);
    };
    let Some(meta) = getmetatable.call::<Option<Table>>(value.clone())? else {
        return Ok(None);
    };
    let Some(tostring) = meta.raw_get::<Option<Function>>("__tostring")? else {
        return Ok(None);
    };
    Ok(match tostring.call::<mlua::Value>(value.clone())? {
        mlua::Value::String(s) => Some(s.to_string_lossy().into()),
        _ => None,
    })
}

/// The outermost frame is always `xpcall` itself and is left out.
fn traceback(lua: &Lua) -> mlua::Result<String> {
    let Some(traceback) = debug_function(lua, "traceback")? else {
        return Ok(String::new());
    };
    // Level 1 is the message handler itself.
    let text = traceback.call::<String>((mlua::Value::Nil, 2))?;
    Ok(without_outer_frame(text))
}

fn without_outer_frame(mut text: String) -> String {
    let cut = match text.rsplit_once('\n') {
        Some((head, last)) if last.starts_with("\t[C]: in ") => Some(head.len()),
        _ => None,
    };
    if let Some(cut) = cut {
        text.truncate(cut);
    }
    text
}

/// Runs inside the message handler, while the failing frames are still live.
fn inspect_error(lua: &Lua, err: &mlua::Value) -> mlua::Result<Raised> {
    let value = match err {
        mlua::Value::Nil => ErrorValue::Nil,
        mlua::Value::String(s) => ErrorValue::Text(s.to_string_lossy().into()),
        mlua::Value::Integer(_) | mlua::Value::Number(_) => ErrorValue::Text(
            lua.coerce_string(err.clone())?
                .map(|s| String::from(s.to_string_lossy()))
                .unwrap_or_default(),
        ),
        mlua::Value::Error(e) => ErrorValue::Text(message_only(e)),
        other => ErrorValue::Opaque(tostring_metamethod(lua, other)?),
    };
    let traceback = match value {
        ErrorValue::Text(_) => traceback(lua)?,
        _ => String::new(),
    };
    Ok(Raised { value, traceback })
}

impl Runtime for LuaVm {
    type Chunk = Function;
    type Values = MultiValue;

    fn check_version(&self) -> Result<(), VmError> {
        let version: String = self.lua.globals().get("_VERSION").map_err(vm_error)?;
        if version == LUA_VERSION {
            Ok(())
        } else {
            Err(VmError::new(format!(
                "expected {LUA_VERSION}, found {version}"
            )))
        }
    }

    fn gc(&mut self, mode: GcMode) -> Result<(), VmError> {
        trace!(?mode, "gc");
        match mode {
            GcMode::Stop => self.lua.gc_stop(),
            GcMode::Restart => self.lua.gc_restart(),
            GcMode::Collect => return self.lua.gc_collect().map_err(vm_error),
        }
        Ok(())
    }

    fn open_stdlib(&mut self) -> Result<(), VmError> {
        self.lua.load_std_libs(StdLib::ALL).map_err(vm_error)
    }

    fn install_library(&mut self, library: &NativeLibrary) -> Result<(), VmError> {
        self.install(library).map_err(vm_error)
    }

    fn set_global(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        let value = to_lua(&self.lua, &value).map_err(vm_error)?;
        self.lua.globals().set(name, value).map_err(vm_error)
    }

    fn compile(&mut self, source: &[u8], chunk_name: &str) -> Result<Function, SyntaxError> {
        self.lua
            .load(source)
            .set_name(chunk_name)
            .into_function()
            .map_err(|err| match err {
                mlua::Error::SyntaxError { message, .. } => SyntaxError::new(message),
                other => SyntaxError::new(message_only(&other)),
            })
    }

    fn call_protected(&mut self, chunk: &Function) -> Result<MultiValue, Raised> {
        let slot: Rc<RefCell<Option<Raised>>> = Rc::default();
        let handler = {
            let slot = Rc::clone(&slot);
            self.lua
                .create_function(move |lua, err: mlua::Value| {
                    *slot.borrow_mut() = Some(inspect_error(lua, &err)?);
                    Ok(err)
                })
                .map_err(|e| Raised::text(message_only(&e)))?
        };

        let mut results: MultiValue = self
            .xpcall
            .call((chunk.clone(), handler))
            .map_err(|e| Raised::text(message_only(&e)))?;
        if let Some(mlua::Value::Boolean(true)) = results.pop_front() {
            return Ok(results);
        }

        let captured = slot.borrow_mut().take();
        // An empty slot means the handler itself failed.
        Err(captured.unwrap_or_else(|| {
            let message = match results.pop_front() {
                Some(mlua::Value::String(s)) => s.to_string_lossy().into(),
                _ => String::from("error in error handling"),
            };
            Raised::text(message)
        }))
    }

    fn result_count(&self, values: &MultiValue) -> usize {
        values.len()
    }

    fn print(&mut self, values: MultiValue) -> Result<(), String> {
        let print: Function = self
            .lua
            .globals()
            .get("print")
            .map_err(|e| message_only(&e))?;
        print.call::<()>(values).map_err(|e| message_only(&e))
    }

    fn clear_stack(&mut self) {
        // mlua keeps no value stack between calls; dropping expired registry
        // slots is the nearest thing.
        self.lua.expire_registry_values();
    }
}
