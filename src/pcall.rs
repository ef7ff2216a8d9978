use tracing::debug;

use crate::runtime::{ErrorValue, Raised, Runtime};

/// Stand-in for an error object that has no `__tostring`.
pub const NO_ERROR_MESSAGE: &str = "(no error message)";

/// Outcome of loading and running one chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum CallResult<V> {
    Ok(V),
    SyntaxError(String),
    /// `None` when the error object was `nil`.
    RuntimeError(Option<String>),
    NoInput,
}

/// Renders what the message handler captured: strings get a traceback,
/// other objects their `__tostring` text, and `nil` nothing at all.
pub fn describe(raised: Raised) -> Option<String> {
    match raised.value {
        ErrorValue::Text(message) if raised.traceback.is_empty() => Some(message),
        ErrorValue::Text(message) => Some(format!("{message}\n{}", raised.traceback)),
        ErrorValue::Opaque(text) => Some(text.unwrap_or_else(|| NO_ERROR_MESSAGE.to_owned())),
        ErrorValue::Nil => None,
    }
}

pub fn protected_call<R: Runtime>(runtime: &mut R, chunk: &R::Chunk) -> CallResult<R::Values> {
    match runtime.call_protected(chunk) {
        Ok(values) => CallResult::Ok(values),
        Err(raised) => {
            debug!(value = ?raised.value, "call raised an error");
            CallResult::RuntimeError(describe(raised))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRuntime;

    const TRACEBACK: &str = "stack traceback:\n\t[C]: in function 'error'";

    #[test]
    fn text_errors_get_a_traceback() {
        let raised = Raised {
            value: ErrorValue::Text("stdin:1: boom".into()),
            traceback: TRACEBACK.into(),
        };
        assert_eq!(
            describe(raised).unwrap(),
            "stdin:1: boom\nstack traceback:\n\t[C]: in function 'error'"
        );
    }

    #[test]
    fn opaque_errors_use_tostring_or_placeholder() {
        let with = Raised {
            value: ErrorValue::Opaque(Some("custom error".into())),
            traceback: String::new(),
        };
        let without = Raised {
            value: ErrorValue::Opaque(None),
            traceback: String::new(),
        };
        assert_eq!(describe(with).as_deref(), Some("custom error"));
        assert_eq!(describe(without).as_deref(), Some(NO_ERROR_MESSAGE));
    }

    #[test]
    fn nil_errors_have_no_message() {
        let raised = Raised {
            value: ErrorValue::Nil,
            traceback: TRACEBACK.into(),
        };
        assert_eq!(describe(raised), None);
    }

    #[test]
    fn protected_call_passes_results_through() {
        let mut rt = FakeRuntime::default().raising("boom", Raised::text("stdin:1: boom"));

        let ok = rt.compile(b"return 42", "=t").unwrap();
        assert_eq!(protected_call(&mut rt, &ok), CallResult::Ok(vec!["42".to_owned()]));

        let bad = rt.compile(b"error 'boom'", "=t").unwrap();
        assert_eq!(
            protected_call(&mut rt, &bad),
            CallResult::RuntimeError(Some("stdin:1: boom".into()))
        );
    }
}
