//! Classes, methods, modules and error unwinding

use crate::vm::debug::StackTraceEntry;
use crate::vm::defaults::MAX_FIELDS;
use crate::vm::fiber::FiberState;
use crate::vm::object::{Method, Obj, ObjClass, ObjKind, ObjRef};
use crate::vm::value::Value;
use crate::vm::{ErrorKind, Vm, VmError};

impl Vm {
    // ========================================================================
    // Classes
    // ========================================================================

    /// Create a class and its metaclass.
    ///
    /// `num_fields` counts only the fields the class declares itself; the
    /// superclass's are added on top. `None` makes a foreign class.
    pub(crate) fn new_class(&mut self, superclass: ObjRef, num_fields: Option<usize>, name: ObjRef) -> ObjRef {
        let metaclass_name = format!("{} metaclass", self.heap.str_lossy(name));
        let metaclass_name = self.new_string_obj(metaclass_name.as_bytes());
        self.push_root(metaclass_name);

        let class_class = self.core.class;
        let metaclass = self.allocate(Some(class_class), Obj::Class(ObjClass::new(metaclass_name, 0, false)));
        self.pop_root(metaclass_name);
        self.bind_superclass(metaclass, class_class);

        self.push_root(metaclass);
        let class = self.allocate(
            Some(metaclass),
            Obj::Class(ObjClass::new(name, num_fields.unwrap_or(0), num_fields.is_none())),
        );
        self.pop_root(metaclass);
        self.bind_superclass(class, superclass);
        class
    }

    /// Make `subclass` inherit from `superclass`: fields and every method
    pub(crate) fn bind_superclass(&mut self, subclass: ObjRef, superclass: ObjRef) {
        let parent = self.heap.class(superclass);
        let methods = parent.methods.clone();
        let inherited_fields = parent.num_fields;

        let class = self.heap.class_mut(subclass);
        class.superclass = Some(superclass);
        if !class.is_foreign {
            class.num_fields += inherited_fields;
        }

        // Methods the subclass defines later override these.
        for (symbol, method) in methods.into_iter().enumerate() {
            if !matches!(method, Method::None) {
                class.bind_method(symbol, method);
            }
        }
    }

    /// Check that `superclass` can be inherited by a class called `name`
    fn validate_superclass(&self, name: ObjRef, superclass: Value, num_fields: Option<usize>) -> Result<(), String> {
        let name = self.heap.str_lossy(name);

        let Some(superclass) = superclass.try_obj().filter(|obj| self.heap.entry(*obj).kind() == ObjKind::Class)
        else {
            return Err(format!("Class '{}' cannot inherit from a non-class object.", name));
        };

        let core = &self.core;
        let builtins = [
            core.class,
            core.fiber,
            core.fn_class,
            core.list,
            core.map,
            core.range,
            core.string,
            core.bool_class,
            core.null,
            core.num,
        ];
        // Core classes not yet defined still point at Object.
        if superclass != core.object && builtins.contains(&superclass) {
            return Err(format!(
                "Class '{}' cannot inherit from built-in class '{}'.",
                name,
                self.heap.class_name(superclass)
            ));
        }

        let parent = self.heap.class(superclass);
        if parent.is_foreign {
            return Err(format!(
                "Class '{}' cannot inherit from foreign class '{}'.",
                name,
                self.heap.class_name(superclass)
            ));
        }

        match num_fields {
            None if parent.num_fields > 0 => Err(format!(
                "Foreign class '{}' may not inherit from a class with fields.",
                name
            )),
            Some(fields) if fields + parent.num_fields > MAX_FIELDS => Err(format!(
                "Class '{}' may not have more than 255 fields, including inherited ones.",
                name
            )),
            _ => Ok(()),
        }
    }

    /// `CLASS`/`FOREIGN_CLASS`: turn the name and superclass on top of the
    /// stack into a class
    pub(crate) fn create_class(&mut self, fiber: ObjRef, num_fields: Option<usize>) -> Result<(), Value> {
        let name = self.heap.fiber(fiber).peek(1).as_obj();
        let superclass = self.heap.fiber(fiber).peek(0);

        if let Err(message) = self.validate_superclass(name, superclass, num_fields) {
            return Err(self.error_value(&message));
        }

        let class = self.new_class(superclass.as_obj(), num_fields, name);
        let f = self.heap.fiber_mut(fiber);
        f.pop();
        f.set_top(Value::from(class));

        if num_fields.is_none() {
            self.bind_foreign_class(fiber, class);
        }
        Ok(())
    }

    /// Ask the host for a foreign class's allocation hooks
    fn bind_foreign_class(&mut self, fiber: ObjRef, class: ObjRef) {
        let module = self.running_module(fiber);
        let module_name = self.module_name(module);
        let class_name = self.heap.class_name(class);

        let methods = match self.options.bind_foreign_class.as_mut() {
            Some(hook) => hook(&module_name, &class_name),
            None => None,
        };
        if methods.is_none() {
            log::debug!("no allocator bound for foreign class {}.{}", module_name, class_name);
        }
        self.heap.class_mut(class).foreign = methods;
    }

    /// `METHOD_INSTANCE`/`METHOD_STATIC`: bind the method below the class on
    /// the stack, then pop both
    pub(crate) fn define_method(&mut self, fiber: ObjRef, symbol: usize, is_static: bool) -> Result<(), Value> {
        let class = self.heap.fiber(fiber).peek(0).as_obj();
        let body = self.heap.fiber(fiber).peek(1);
        let target = if is_static { self.class_of(Value::from(class)) } else { class };

        let method = if let Some(signature) = self.heap.try_string(body) {
            // A foreign method: the body is its signature.
            let signature = signature.to_str_lossy().into_owned();
            let module = self.running_module(fiber);
            let module_name = self.module_name(module);
            let class_name = self.heap.class_name(class);

            let bound = match self.options.bind_foreign_method.as_mut() {
                Some(hook) => hook(&module_name, &class_name, is_static, &signature),
                None => None,
            };
            match bound {
                Some(function) => Method::Foreign(function),
                None => {
                    let message = format!(
                        "Could not find foreign method '{}' for class {} in module '{}'.",
                        signature, class_name, module_name
                    );
                    return Err(self.error_value(&message));
                }
            }
        } else {
            let closure = body.as_obj();
            self.heap.closure_mut(closure).owner = Some(target);
            Method::Block(closure)
        };

        self.heap.class_mut(target).bind_method(symbol, method);

        let f = self.heap.fiber_mut(fiber);
        f.pop();
        f.pop();
        Ok(())
    }

    /// Module of the function running in `fiber`'s innermost frame
    pub(crate) fn running_module(&self, fiber: ObjRef) -> ObjRef {
        match self.heap.fiber(fiber).frames.last() {
            Some(frame) => self.heap.func(self.heap.closure(frame.closure).function).module,
            None => self.core_module,
        }
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// `IMPORT_MODULE`: the loaded module, or a closure for its body if it
    /// still has to run
    pub(crate) fn import_module(&mut self, fiber: ObjRef, name: Value) -> Result<Value, Value> {
        let name = self.heap.string(name.as_obj()).to_str_lossy().into_owned();
        let importer = self.module_name(self.running_module(fiber));

        let resolved = match self.options.resolve_module.as_mut() {
            Some(hook) => hook(&importer, &name),
            None => Some(name.clone()),
        };
        let Some(resolved) = resolved else {
            log::warn!("could not resolve module '{}' imported from '{}'", name, importer);
            let message = format!("Could not resolve module '{}' imported from '{}'.", name, importer);
            return Err(self.error_value(&message));
        };

        if let Some(module) = self.module(&resolved) {
            return Ok(Value::from(module));
        }

        let source = match self.options.load_module.as_mut() {
            Some(hook) => hook(&resolved),
            None => None,
        };
        let Some(source) = source else {
            log::warn!("could not load module '{}'", resolved);
            let message = format!("Could not load module '{}'.", resolved);
            return Err(self.error_value(&message));
        };

        log::debug!("loading module '{}'", resolved);
        let module = self.module_or_new(&resolved);
        match self.compile_in_module(module, &source, false, true) {
            Ok(closure) => Ok(Value::from(closure)),
            Err(_) => {
                // Let a later import try again.
                self.modules.remove(&resolved);
                let message = format!("Could not compile module '{}'.", resolved);
                Err(self.error_value(&message))
            }
        }
    }

    /// `IMPORT_VARIABLE`: a variable of the most recently imported module
    pub(crate) fn import_variable(&mut self, name: Value) -> Result<Value, Value> {
        let name = self.heap.string(name.as_obj()).to_str_lossy().into_owned();
        let module = self.last_module.unwrap_or(self.core_module);

        let found = {
            let m = self.heap.module(module);
            m.variable_names.find(&name).map(|symbol| m.variables[symbol])
        };
        match found {
            Some(value) => Ok(value),
            None => {
                let message = format!(
                    "Could not find a variable named '{}' in module '{}'.",
                    name,
                    self.module_name(module)
                );
                Err(self.error_value(&message))
            }
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Abort the running fiber with `error` and unwind.
    ///
    /// The error travels up the chain of callers. The first fiber entered
    /// with `try` catches it: its caller resumes with the error as the
    /// result and is returned. If nothing catches it the error is reported
    /// and returned.
    pub(crate) fn runtime_error(&mut self, error: Value) -> Result<ObjRef, VmError> {
        let Some(failed) = self.fiber else {
            return Err(VmError::Runtime {
                message: self.error_message(error),
                stack_trace: Vec::new(),
            });
        };

        let mut current = Some(failed);
        while let Some(fiber) = current {
            let f = self.heap.fiber_mut(fiber);
            f.error = error;
            let caller = f.caller.take();

            if f.state == FiberState::Try {
                if let Some(caller) = caller {
                    log::trace!("error in fiber {:?} caught by {:?}", fiber, caller);
                    self.heap.fiber_mut(caller).set_top(error);
                    self.fiber = Some(caller);
                    return Ok(caller);
                }
            }
            current = caller;
        }

        let message = self.error_message(error);
        let stack_trace = self.stack_trace(failed);

        self.report_error(ErrorKind::Runtime, None, -1, &message);
        for entry in &stack_trace {
            self.report_error(ErrorKind::StackTrace, Some(&entry.module), entry.line as i32, &entry.function);
        }

        self.fiber = None;
        self.api_stack = None;
        Err(VmError::Runtime { message, stack_trace })
    }

    /// Text of an error value
    fn error_message(&self, error: Value) -> String {
        match self.heap.try_string(error) {
            Some(text) => text.to_str_lossy().into_owned(),
            None => "[error object]".to_string(),
        }
    }

    /// Frames of `fiber`, innermost first, leaving out core library code
    pub(crate) fn stack_trace(&self, fiber: ObjRef) -> Vec<StackTraceEntry> {
        self.heap
            .fiber(fiber)
            .frames
            .iter()
            .rev()
            .filter_map(|frame| {
                let function = self.heap.func(self.heap.closure(frame.closure).function);
                if function.module == self.core_module {
                    return None;
                }
                // The ip has already moved past the failing instruction.
                let line = function.line_at(frame.ip.saturating_sub(1)).unwrap_or(0);
                Some(StackTraceEntry {
                    module: self.module_name(function.module),
                    line,
                    function: function.debug.name.clone(),
                })
            })
            .collect()
    }
}
