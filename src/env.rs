//! The `chisel` table handed to scripts.

use std::collections::BTreeMap;
use std::ffi::OsString;

use crate::config::LaunchConfig;
use crate::value::Value;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub libdir: String,
    pub version: &'static str,
    pub script: String,
    pub loglevel: u8,
    pub interactive: bool,
    /// Tokens as raw bytes; scripts see them as Lua strings.
    pub argv: Vec<Vec<u8>>,
    pub options: BTreeMap<Vec<u8>, Value>,
}

impl Environment {
    /// `script` is the resolved path when there is one, else the requested name.
    pub fn build(config: &LaunchConfig, script: &str, args: &[OsString]) -> Self {
        let mut argv = Vec::with_capacity(args.len());
        let mut options = BTreeMap::new();

        for arg in args {
            let arg = arg.as_encoded_bytes();
            argv.push(arg.to_vec());
            match arg.iter().position(|&b| b == b'=') {
                Some(eq) => options.insert(
                    arg[..eq].to_vec(),
                    Value::from_bytes(arg[eq + 1..].to_vec()),
                ),
                None => options.insert(arg.to_vec(), Value::Boolean(true)),
            };
        }

        Self {
            libdir: config.libdir.clone(),
            version: VERSION,
            script: script.to_owned(),
            loglevel: config.loglevel,
            interactive: config.interactive,
            argv,
            options,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Table(vec![
            ("libdir".into(), self.libdir.as_str().into()),
            ("version".into(), self.version.into()),
            ("script".into(), self.script.as_str().into()),
            ("loglevel".into(), Value::Integer(self.loglevel.into())),
            ("interactive".into(), self.interactive.into()),
            (
                "argv".into(),
                Value::List(self.argv.iter().map(|a| Value::from_bytes(a.clone())).collect()),
            ),
            (
                "options".into(),
                Value::Table(
                    self.options
                        .iter()
                        .map(|(k, v)| (Value::from_bytes(k.clone()), v.clone()))
                        .collect(),
                ),
            ),
        ])
    }
}
