use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Library directory used when `-L` is not given.
pub const DEFAULT_LIBDIR: &str = match option_env!("CHISEL_LUA_LIBDIR") {
    Some(dir) => dir,
    None => "lua",
};

/// Environment variable naming the REPL history file.
pub const HISTORY_VAR: &str = "CHISEL_HISTORY";

#[derive(Parser, Debug)]
#[command(
    about = "Boot a Lua script with its options, or run an interactive interpreter",
    override_usage = "chisel [flags] [option1=value1 ... [optionN=valueN]]",
    after_help = "Useable options vary depending on the script being run."
)]
pub struct Cli {
    /// Set library path
    #[arg(short = 'L', value_name = "PATH", default_value = DEFAULT_LIBDIR)]
    libdir: String,

    /// Script to run (default: same as program name)
    #[arg(short = 'S', value_name = "NAME")]
    script: Option<String>,

    /// Be verbose. Use twice for debugging output
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Run an interactive Lua interpreter
    #[arg(short = 'i')]
    interactive: bool,

    /// Script options, `name` or `name=value`
    #[arg(value_name = "OPTION")]
    options: Vec<OsString>,
}

/// Everything decided on the command line, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub libdir: String,
    pub script: String,
    pub loglevel: u8,
    pub interactive: bool,
    /// Invocation name, used as the prefix of fatal diagnostics.
    pub program: String,
}

impl LaunchConfig {
    /// Parses `args` (program name first) into the config and the
    /// remaining positional arguments.
    pub fn parse_from<I, T>(args: I) -> Result<(Self, Vec<OsString>), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let program = args
            .first()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());
        let cli = Cli::try_parse_from(args)?;
        Ok(Self::from_cli(cli, program))
    }

    pub fn from_cli(cli: Cli, program: String) -> (Self, Vec<OsString>) {
        let config = Self {
            libdir: cli.libdir,
            script: cli.script.unwrap_or_else(|| program.clone()),
            loglevel: cli.verbose,
            interactive: cli.interactive,
            program,
        };
        (config, cli.options)
    }
}

pub fn history_file() -> Option<PathBuf> {
    std::env::var_os(HISTORY_VAR).map(PathBuf::from)
}
