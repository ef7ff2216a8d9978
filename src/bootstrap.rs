use tracing::{debug, info};

use crate::env::Environment;
use crate::error::BootstrapError;
use crate::pcall::{protected_call, CallResult};
use crate::repl::NOT_A_STRING;
use crate::runtime::{GcMode, NativeLibrary, Runtime};

/// Global the environment table is installed under.
pub const ENV_GLOBAL: &str = "chisel";

pub const BOOT_CHUNK_NAME: &str = "=(boot)";

/// Restricts module lookup to the library directory and hands control to
/// its `_boot` module.
pub const BOOT_SCRIPT: &str = "package.cpath = \"\"\n\
                               package.path = chisel.libdir .. \"/?.lua\"\n\
                               require \"_boot\"";

/// Brings a fresh runtime up to the point where scripts can run.
///
/// The collector stays stopped from the first library install until the
/// boot module has loaded. On failure it is left stopped: the caller is
/// expected to exit.
pub fn bootstrap<R: Runtime>(
    runtime: &mut R,
    env: &Environment,
    libraries: &[NativeLibrary],
) -> Result<(), BootstrapError> {
    let libdir = || env.libdir.clone();

    runtime.check_version().map_err(BootstrapError::Version)?;
    runtime
        .gc(GcMode::Stop)
        .map_err(|source| BootstrapError::Gc {
            libdir: libdir(),
            source,
        })?;

    runtime
        .open_stdlib()
        .map_err(|source| BootstrapError::Stdlib {
            libdir: libdir(),
            source,
        })?;
    for library in libraries {
        debug!(name = library.name, "installing native library");
        runtime
            .install_library(library)
            .map_err(|source| BootstrapError::Library {
                name: library.name,
                libdir: libdir(),
                source,
            })?;
    }

    runtime
        .set_global(ENV_GLOBAL, env.to_value())
        .map_err(|source| BootstrapError::Environment {
            libdir: libdir(),
            source,
        })?;

    let chunk = runtime
        .compile(BOOT_SCRIPT.as_bytes(), BOOT_CHUNK_NAME)
        .map_err(|source| BootstrapError::Compile {
            libdir: libdir(),
            source,
        })?;
    match protected_call(runtime, &chunk) {
        CallResult::Ok(_) => {}
        CallResult::RuntimeError(message) => {
            return Err(BootstrapError::Init {
                libdir: libdir(),
                message: message.unwrap_or_else(|| NOT_A_STRING.to_owned()),
            })
        }
        CallResult::SyntaxError(message) => {
            return Err(BootstrapError::Init {
                libdir: libdir(),
                message,
            })
        }
        CallResult::NoInput => {}
    }

    runtime
        .gc(GcMode::Restart)
        .map_err(|source| BootstrapError::Gc {
            libdir: libdir(),
            source,
        })?;
    info!(libdir = %env.libdir, "runtime ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchConfig;
    use crate::fake::FakeRuntime;
    use crate::runtime::Raised;
    use crate::value::Value;

    const NOOP: NativeLibrary = NativeLibrary {
        name: "noop",
        functions: &[],
    };

    fn env() -> Environment {
        let config = LaunchConfig {
            libdir: "/opt/chisel".into(),
            script: "tool".into(),
            loglevel: 0,
            interactive: false,
            program: "tool".into(),
        };
        Environment::build(&config, "tool", &["k=v".into()])
    }

    #[test]
    fn steps_run_in_order() {
        let mut rt = FakeRuntime::default();
        bootstrap(&mut rt, &env(), &[NOOP]).unwrap();

        let log = rt.log.borrow().clone();
        assert_eq!(
            log,
            vec![
                "check_version".to_owned(),
                "gc Stop".into(),
                "open_stdlib".into(),
                "install noop".into(),
                "set_global chisel".into(),
                format!("compile {BOOT_SCRIPT:?}"),
                format!("call {BOOT_SCRIPT:?}"),
                "gc Restart".into(),
            ]
        );
        let (name, value) = &rt.globals[0];
        assert_eq!(name, ENV_GLOBAL);
        assert_eq!(value.get("libdir"), Some(&Value::from("/opt/chisel")));
    }

    #[test]
    fn version_mismatch_touches_nothing() {
        let mut rt = FakeRuntime {
            version_error: Some("version mismatch".into()),
            ..FakeRuntime::default()
        };
        let err = bootstrap(&mut rt, &env(), &[NOOP]).unwrap_err();
        assert!(matches!(err, BootstrapError::Version(_)));
        assert!(rt.gc_calls.is_empty());
        assert!(rt.libraries.is_empty());
    }

    #[test]
    fn boot_failure_reports_libdir_and_leaves_gc_stopped() {
        let mut rt = FakeRuntime::default().raising(
            "_boot",
            Raised::text("module '_boot' not found"),
        );
        let err = bootstrap(&mut rt, &env(), &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not initialize, libdir = '/opt/chisel'\nmodule '_boot' not found"
        );
        assert_eq!(rt.gc_calls, vec![GcMode::Stop]);
    }

    #[test]
    fn stdlib_failure_reports_libdir() {
        let mut rt = FakeRuntime {
            stdlib_error: Some("not enough memory".into()),
            ..FakeRuntime::default()
        };
        let err = bootstrap(&mut rt, &env(), &[NOOP]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("libdir = '/opt/chisel'"), "{message}");
        assert!(message.contains("not enough memory"), "{message}");
        assert!(rt.libraries.is_empty());
        assert_eq!(rt.gc_calls, vec![GcMode::Stop]);
    }

    #[test]
    fn library_failure_names_library_and_libdir() {
        let mut rt = FakeRuntime {
            library_error: Some("table overflow".into()),
            ..FakeRuntime::default()
        };
        let err = bootstrap(&mut rt, &env(), &[NOOP]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not install library 'noop' (libdir = '/opt/chisel'): table overflow"
        );
        assert!(rt.globals.is_empty());
        assert_eq!(rt.gc_calls, vec![GcMode::Stop]);
    }

    #[test]
    fn boot_chunk_compile_failure_reports_libdir() {
        let mut rt = FakeRuntime {
            syntax_on: vec!["require".into()],
            ..FakeRuntime::default()
        };
        let err = bootstrap(&mut rt, &env(), &[]).unwrap_err();
        assert!(matches!(err, BootstrapError::Compile { .. }));
        let message = err.to_string();
        assert!(message.contains("libdir = '/opt/chisel'"), "{message}");
        assert!(message.contains("(boot):1: unexpected symbol near 'require'"), "{message}");
        assert!(!rt.log.borrow().iter().any(|e| e.starts_with("call")));
        assert_eq!(rt.gc_calls, vec![GcMode::Stop]);
    }

    #[test]
    fn gc_failure_is_not_blamed_on_stdlib() {
        let mut rt = FakeRuntime {
            gc_error: Some("collector busy".into()),
            ..FakeRuntime::default()
        };
        let err = bootstrap(&mut rt, &env(), &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not control the garbage collector (libdir = '/opt/chisel'): collector busy"
        );
        assert!(!rt.log.borrow().contains(&"open_stdlib".to_owned()));
    }

    #[test]
    fn environment_failure_stops_before_boot_code() {
        let mut rt = FakeRuntime {
            global_error: Some("out of memory".into()),
            ..FakeRuntime::default()
        };
        let err = bootstrap(&mut rt, &env(), &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not install environment (libdir = '/opt/chisel'): out of memory"
        );
        assert!(rt.compiled.is_empty());
    }
}
