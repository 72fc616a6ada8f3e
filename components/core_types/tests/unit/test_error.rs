//! Unit tests for error types

use core_types::{CompileError, ErrorKind, InterpretError, RuntimeError, StackFrame};

#[test]
fn test_traceback_innermost_first() {
    let err = RuntimeError {
        kind: ErrorKind::UndefinedVariable,
        message: "Undefined variable 'x'.".to_string(),
        stack: vec![
            StackFrame {
                function_name: Some("inner".to_string()),
                line: 4,
            },
            StackFrame {
                function_name: Some("outer".to_string()),
                line: 8,
            },
            StackFrame {
                function_name: None,
                line: 12,
            },
        ],
    };

    assert_eq!(
        err.traceback(),
        "Undefined variable 'x'.\n[line 4] in inner()\n[line 8] in outer()\n[line 12] in script"
    );
}

#[test]
fn test_interpret_error_wraps_runtime() {
    let err: InterpretError = RuntimeError::new(ErrorKind::StackOverflow, "Stack overflow.").into();
    assert!(matches!(err, InterpretError::Runtime(ref e) if e.kind == ErrorKind::StackOverflow));
    assert_eq!(err.to_string(), "runtime error: Stack overflow.");
}

#[test]
fn test_interpret_error_wraps_compile() {
    let err: InterpretError = CompileError::new("Expect ';' after value.").into();
    assert_eq!(err.to_string(), "compile error: Expect ';' after value.");
    assert_eq!(err.exit_code(), 65);
}
