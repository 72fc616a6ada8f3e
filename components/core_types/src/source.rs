//! Stack frame records used in runtime error tracebacks.

use std::fmt;

/// One line of a runtime error traceback.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame {
///     function_name: Some("inc".to_string()),
///     line: 3,
/// };
/// assert_eq!(frame.to_string(), "[line 3] in inc()");
///
/// let script = StackFrame { function_name: None, line: 9 };
/// assert_eq!(script.to_string(), "[line 9] in script");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the function, or None for the top-level script
    pub function_name: Option<String>,
    /// Source line of the instruction being executed in this frame
    pub line: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function_name {
            Some(name) => write!(f, "[line {}] in {}()", self.line, name),
            None => write!(f, "[line {}] in script", self.line),
        }
    }
}
