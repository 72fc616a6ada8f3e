//! Integration test suite for the interpreter workspace
//!
//! This crate verifies that components work together across their
//! boundaries: the dispatch loop with the native library, the collector
//! with host-side allocation, and the compiler/backend seams.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use core_types::{RuntimeError, Value};
use interpreter::{FunctionBuilder, Vm, VmConfig};
use memory_manager::GcConfig;

/// Re-export components for test convenience
pub mod components {
    pub use builtins;
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
}

/// Program output captured from a VM
#[derive(Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    /// Everything written so far
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A VM with the native library installed and output captured
pub fn setup() -> (Vm, SharedOutput) {
    setup_with(GcConfig::default())
}

/// Same as [`setup`], collecting before every allocation
pub fn setup_stressed() -> (Vm, SharedOutput) {
    setup_with(GcConfig::default().with_stress(true))
}

/// A VM with the library installed and the given collector settings
pub fn setup_with(gc: GcConfig) -> (Vm, SharedOutput) {
    let _ = env_logger::builder().is_test(true).try_init();
    let output = SharedOutput::default();
    let mut vm = Vm::with_config(VmConfig::default().with_gc(gc));
    vm.set_output(Box::new(output.clone()));
    if let Err(e) = builtins::install(&mut vm) {
        panic!("library failed to install: {}", e);
    }
    (vm, output)
}

/// Assembles a script and runs it to completion
pub fn run(vm: &mut Vm, script: FunctionBuilder) -> Result<Value, RuntimeError> {
    match script.build(vm) {
        Ok(function) => vm.run_function(function),
        Err(e) => panic!("script failed to assemble: {}", e),
    }
}

/// Runs a script and renders its result the way `print` would
pub fn run_shown(vm: &mut Vm, script: FunctionBuilder) -> String {
    match run(vm, script) {
        Ok(value) => vm.format_value(value),
        Err(e) => panic!("script failed: {}", e.traceback()),
    }
}
