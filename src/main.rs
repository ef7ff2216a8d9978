use std::ffi::OsString;
use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{debug, info};

use chisel::bootstrap::bootstrap;
use chisel::config::LaunchConfig;
use chisel::env::Environment;
use chisel::error::LaunchError;
use chisel::repl::{Repl, CHUNK_NAME};
use chisel::resolve::resolve;
use chisel::vm::LuaVm;
use chisel::{logging, run_chunk, NATIVE_LIBRARIES};

fn main() -> ExitCode {
    let (config, args) = match LaunchConfig::parse_from(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(err) => err.exit(),
    };
    logging::init(config.loglevel);

    match run(&config, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {err:#}", config.program);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &LaunchConfig, args: &[OsString]) -> anyhow::Result<()> {
    let script = if config.interactive {
        None
    } else {
        Some(resolve(&config.script, &config.libdir)?)
    };
    let script_name = match &script {
        Some(found) => found.path.display().to_string(),
        None => config.script.clone(),
    };

    let env = Environment::build(config, &script_name, args);
    debug!(?env, "environment");

    let mut vm = LuaVm::new().map_err(LaunchError::Runtime)?;
    bootstrap(&mut vm, &env, NATIVE_LIBRARIES)?;

    let Some(script) = script else {
        return interact(&mut vm);
    };

    info!(path = %script.path.display(), "running script");
    let source = std::fs::read(&script.path)
        .with_context(|| format!("could not read '{}'", script.path.display()))?;
    run_chunk(
        &mut vm,
        &source,
        &format!("@{}", script.path.display()),
        &script.path,
    )?;
    Ok(())
}

/// A terminal gets the prompt loop; piped input is run as one chunk.
fn interact(vm: &mut LuaVm) -> anyhow::Result<()> {
    if !io::stdin().is_terminal() {
        let mut source = Vec::new();
        io::stdin()
            .read_to_end(&mut source)
            .context("could not read standard input")?;
        run_chunk(vm, &source, CHUNK_NAME, Path::new("stdin"))?;
        return Ok(());
    }

    #[cfg(feature = "readline")]
    let reader = chisel::readline::HistoryReader::new(chisel::config::history_file())
        .context("could not set up line editor")?;
    #[cfg(not(feature = "readline"))]
    let reader = chisel::readline::PlainReader::stdio();

    Repl::new(reader, io::stdout(), io::stderr()).run(vm)?;
    Ok(())
}
