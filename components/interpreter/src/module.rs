//! Native modules
//!
//! A module is registered under a name with an init function. Importing it
//! the first time creates a fresh class named `__Module<n>_<name>` and one
//! instance of it; the init function fills the class with native methods
//! and may run interpreted code with the instance as `this`. Later imports
//! return the cached instance.

use core_types::{ObjRef, Value};
use memory_manager::{BoundMethod, Class, Closure, Instance, Object, Table};

use crate::native::{NativeError, NativeFn};
use crate::vm::Vm;

/// Module initializer passed to [`Vm::register_module`].
pub type ModuleInit = fn(&mut ModuleRegistrar<'_>) -> Result<(), NativeError>;

/// Handle given to a module initializer.
pub struct ModuleRegistrar<'vm> {
    vm: &'vm mut Vm,
    class: ObjRef,
    instance: ObjRef,
}

impl ModuleRegistrar<'_> {
    /// The module instance scripts receive from the import
    pub fn instance(&self) -> Value {
        Value::object(self.instance)
    }

    /// The VM being initialized
    pub fn vm(&mut self) -> &mut Vm {
        self.vm
    }

    /// Adds a native method; it is called with the module instance as
    /// receiver
    pub fn native_method(&mut self, name: &str, function: NativeFn) {
        self.native_method_with(name, function, false);
    }

    /// Adds a native method, choosing its call mode
    pub fn native_method_with(&mut self, name: &str, function: NativeFn, calls_lox: bool) {
        let native = self.vm.new_native(name, function, calls_lox);
        let mut vm = self.vm.pin(Value::object(native));
        let name = vm.intern(name);
        let key = vm.heap.key(name);
        if let Some(class) = vm.heap.get_mut(self.class).as_class_mut() {
            class.methods.set(key, Value::object(native));
        }
        vm.recharge(self.class);
    }

    /// Compiles and runs interpreted code with the module instance bound
    /// to `this`
    pub fn lox_code(&mut self, source: &str) -> Result<Value, NativeError> {
        let function = self
            .vm
            .compile(source)
            .map_err(|e| NativeError::new(e.to_string()))?;

        let mark = self.vm.root_mark();
        self.vm.add_root(Value::object(function));
        let closure = self.vm.alloc(Object::Closure(Closure {
            function,
            upvalues: Box::new([]),
        }));
        self.vm.add_root(Value::object(closure));
        let bound = self.vm.alloc(Object::BoundMethod(BoundMethod {
            receiver: Value::object(self.instance),
            method: closure,
        }));
        let result = self.vm.call(Value::object(bound), &[]);
        self.vm.release_roots(mark);
        Ok(result?)
    }
}

impl Vm {
    /// Makes a native module available to [`Vm::import_module`]
    pub fn register_module(&mut self, name: &str, init: ModuleInit) {
        self.modules.insert(name.to_string(), init);
    }

    /// Imports a registered module, initializing it on first use
    ///
    /// # Arguments
    ///
    /// * `name` - Name the module was registered under
    ///
    /// # Returns
    ///
    /// The module instance
    pub fn import_module(&mut self, name: &str) -> Result<Value, NativeError> {
        let cache_key = format!("__module_{}", name);
        if let Some(instance) = self.get_global(&cache_key) {
            return Ok(instance);
        }
        let init = self
            .modules
            .get(name)
            .copied()
            .ok_or_else(|| NativeError::new(format!("Unknown module '{}'.", name)))?;

        self.module_count += 1;
        let class_name = format!("__Module{}_{}", self.module_count, name);
        log::debug!("importing module {} as {}", name, class_name);

        let class_name = self.intern(&class_name);
        let mut vm = self.pin(Value::object(class_name));
        let class = vm.alloc(Object::Class(Class {
            name: class_name,
            methods: Table::new(),
        }));
        let mut vm = vm.pin(Value::object(class));
        let instance = vm.alloc(Object::Instance(Instance {
            class,
            fields: Table::new(),
        }));
        let mut vm = vm.pin(Value::object(instance));

        init(&mut ModuleRegistrar {
            vm: &mut *vm,
            class,
            instance,
        })?;
        vm.define_global(&cache_key, Value::object(instance));
        Ok(Value::object(instance))
    }
}
