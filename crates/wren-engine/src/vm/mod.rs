//! Wren virtual machine
//!
//! The [`Vm`] owns the heap, the collector, the loaded modules and the
//! global method symbol table. Source goes in through [`Vm::interpret`];
//! host code talks to running scripts through the slot API in [`api`].

pub mod api;
mod builtins;
pub mod debug;
pub mod defaults;
pub mod fiber;
pub mod gc;
pub mod interpreter;
pub mod map;
pub mod object;
pub mod options;
pub mod symbol;
pub mod value;

pub use api::SlotType;
pub use debug::{disassemble_function, StackTraceEntry};
pub use gc::{GcStats, Handle};
pub use object::{ForeignClassMethods, ForeignMethodFn, ObjRef};
pub use options::VmOptions;
pub use value::Value;

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::compiler::{self, CompileError};
use api::ApiStack;
use gc::{GarbageCollector, HandleTable, Heap, TempRoots};
use object::{Obj, ObjClass, ObjClosure, ObjKind, ObjModule, ObjString};
use symbol::SymbolTable;

/// What an error hook call is reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A compile error in some module
    Compile,
    /// The message of an uncaught runtime error
    Runtime,
    /// One frame of a runtime error's stack trace
    StackTrace,
}

/// VM errors
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Source failed to compile
    #[error("{}", format_compile_errors(.0))]
    Compile(Vec<CompileError>),

    /// A fiber aborted and nothing caught the error
    #[error("{message}")]
    Runtime {
        /// Error message, or `[error object]` for a non-string error value
        message: String,
        /// Frames at the point of failure, innermost first
        stack_trace: Vec<StackTraceEntry>,
    },
}

fn format_compile_errors(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// VM operation result
pub type VmResult<T> = Result<T, VmError>;

/// Classes the VM needs to find without a lookup
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoreClasses {
    pub object: ObjRef,
    pub class: ObjRef,
    pub bool_class: ObjRef,
    pub fiber: ObjRef,
    pub fn_class: ObjRef,
    pub list: ObjRef,
    pub map: ObjRef,
    pub null: ObjRef,
    pub num: ObjRef,
    pub range: ObjRef,
    pub string: ObjRef,
}

impl CoreClasses {
    /// Every slot pointing at `object` until bootstrap fills in the rest
    fn new(object: ObjRef) -> Self {
        Self {
            object,
            class: object,
            bool_class: object,
            fiber: object,
            fn_class: object,
            list: object,
            map: object,
            null: object,
            num: object,
            range: object,
            string: object,
        }
    }

    fn all(&self) -> [ObjRef; 11] {
        [
            self.object,
            self.class,
            self.bool_class,
            self.fiber,
            self.fn_class,
            self.list,
            self.map,
            self.null,
            self.num,
            self.range,
            self.string,
        ]
    }
}

/// A Wren virtual machine
pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) gc: GarbageCollector,
    pub(crate) temp_roots: TempRoots,
    pub(crate) handles: HandleTable,

    /// Objects Rust code holds across allocations: compiler output and
    /// host call arguments
    pub(crate) compiler_roots: Vec<ObjRef>,

    /// Every method signature ever seen, indexing all method tables
    pub(crate) method_names: SymbolTable,

    /// Loaded modules by name. The core module is kept separately.
    pub(crate) modules: FxHashMap<String, ObjRef>,
    pub(crate) core_module: ObjRef,

    /// Module most recently imported, for `import ... for` bindings
    pub(crate) last_module: Option<ObjRef>,

    /// Fiber currently running, if any
    pub(crate) fiber: Option<ObjRef>,

    /// Slots visible to the host, during a foreign call or between host calls
    pub(crate) api_stack: Option<ApiStack>,

    /// Fibers interrupted by a host call made from a foreign method
    pub(crate) suspended_fibers: Vec<ObjRef>,

    pub(crate) core: CoreClasses,
    pub(crate) options: VmOptions,

    /// When the VM was created, for `System.clock`
    pub(crate) started: Instant,
}

impl Vm {
    /// Create a VM and load the core library
    pub fn new(options: VmOptions) -> Self {
        let mut heap = Heap::new();

        // Object comes first: every other class points at it.
        let name = heap.insert(None, Obj::String(ObjString::new(&b"Object"[..])));
        let object = heap.insert(None, Obj::Class(ObjClass::new(name, 0, false)));
        let core_module = heap.insert(None, Obj::Module(ObjModule::default()));

        let gc = GarbageCollector::new(
            options.initial_heap_size,
            options.min_heap_size,
            options.heap_growth_percent,
        );

        let mut vm = Self {
            heap,
            gc,
            temp_roots: TempRoots::new(),
            handles: HandleTable::new(),
            compiler_roots: Vec::new(),
            method_names: SymbolTable::new(),
            modules: FxHashMap::default(),
            core_module,
            last_module: None,
            fiber: None,
            api_stack: None,
            suspended_fibers: Vec::new(),
            core: CoreClasses::new(object),
            options,
            started: Instant::now(),
        };
        builtins::initialize(&mut vm);
        vm
    }

    // ========================================================================
    // Running code
    // ========================================================================

    /// Compile and run `source` as the module named `module`.
    ///
    /// Running into an existing module adds to its variables, which is what
    /// a REPL wants.
    pub fn interpret(&mut self, module: &str, source: &str) -> VmResult<()> {
        let closure = self.compile_source(module, source, false, true)?;
        self.run_closure(closure).map(|_| ())
    }

    /// Compile a single expression in `module`, run it and return its value
    pub fn interpret_expression(&mut self, module: &str, source: &str) -> VmResult<Value> {
        let closure = self.compile_source(module, source, true, false)?;
        self.run_closure(closure)
    }

    /// Compile `source` into a closure for the named module without running it
    pub fn compile_source(
        &mut self,
        module: &str,
        source: &str,
        is_expression: bool,
        print_errors: bool,
    ) -> VmResult<ObjRef> {
        let module = self.module_or_new(module);
        self.compile_in_module(module, source, is_expression, print_errors)
            .map_err(VmError::Compile)
    }

    pub(crate) fn compile_in_module(
        &mut self,
        module: ObjRef,
        source: &str,
        is_expression: bool,
        print_errors: bool,
    ) -> Result<ObjRef, Vec<CompileError>> {
        let function = compiler::compile(self, module, source, is_expression, print_errors)?;

        self.push_root(function);
        let closure = self.allocate(
            None,
            Obj::Closure(ObjClosure {
                function,
                upvalues: Vec::new(),
                owner: None,
            }),
        );
        self.pop_root(function);
        Ok(closure)
    }

    /// Run `closure` in a new root fiber to completion
    pub(crate) fn run_closure(&mut self, closure: ObjRef) -> VmResult<Value> {
        self.push_root(closure);
        let fiber = self.new_fiber(Some(closure));
        self.pop_root(closure);

        self.api_stack = None;
        self.run_interpreter(fiber)
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// The loaded module called `name`
    pub(crate) fn module(&self, name: &str) -> Option<ObjRef> {
        self.modules.get(name).copied()
    }

    /// Find the module called `name`, creating it with the core variables
    /// imported if it does not exist yet
    pub(crate) fn module_or_new(&mut self, name: &str) -> ObjRef {
        if let Some(module) = self.module(name) {
            return module;
        }

        let name_string = self.new_string_obj(name.as_bytes());
        self.push_root(name_string);
        let module = self.allocate(
            None,
            Obj::Module(ObjModule {
                name: Some(name_string),
                ..Default::default()
            }),
        );
        self.pop_root(name_string);
        self.modules.insert(name.to_string(), module);

        // Every module sees the core variables.
        let core = self.heap.module(self.core_module);
        let names: Vec<String> = core.variable_names.iter().map(str::to_string).collect();
        let values = core.variables.clone();

        let target = self.heap.module_mut(module);
        for (name, value) in names.iter().zip(values) {
            target.variable_names.ensure(name);
            target.variables.push(value);
        }

        log::debug!("created module '{}'", name);
        module
    }

    /// Whether a module with this name has been loaded
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Whether `module` defines a top-level variable `name`
    pub fn has_variable(&self, module: &str, name: &str) -> bool {
        self.get_variable(module, name).is_some()
    }

    /// Value of a top-level variable
    pub fn get_variable(&self, module: &str, name: &str) -> Option<Value> {
        let module = self.heap.module(self.module(module)?);
        let symbol = module.variable_names.find(name)?;
        module.variables.get(symbol).copied()
    }

    /// Display name of a module object
    pub(crate) fn module_name(&self, module: ObjRef) -> String {
        match self.heap.module(module).name {
            Some(name) => self.heap.str_lossy(name),
            None => "core".to_string(),
        }
    }

    // ========================================================================
    // Memory
    // ========================================================================

    /// Move `obj` onto the heap, collecting first if the heap is due.
    ///
    /// The new object is rooted during that collection. Anything else the
    /// caller holds outside the heap must be rooted with
    /// [`push_root`](Self::push_root).
    pub(crate) fn allocate(&mut self, class: Option<ObjRef>, obj: Obj) -> ObjRef {
        let obj = self.heap.insert(class, obj);
        if self.gc.should_collect(&self.heap) {
            self.temp_roots.push(obj);
            self.collect_garbage();
            self.temp_roots.pop(obj);
        }
        obj
    }

    /// Allocate a string object
    pub(crate) fn new_string_obj(&mut self, bytes: &[u8]) -> ObjRef {
        self.allocate(None, Obj::String(ObjString::new(bytes)))
    }

    /// Allocate a string and return it as a value
    pub(crate) fn string_value(&mut self, text: &str) -> Value {
        Value::from(self.new_string_obj(text.as_bytes()))
    }

    /// Protect `obj` from collection until the matching [`pop_root`](Self::pop_root)
    #[inline]
    pub(crate) fn push_root(&mut self, obj: ObjRef) {
        self.temp_roots.push(obj);
    }

    /// Release the most recent temporary root, which must be `obj`
    #[inline]
    pub(crate) fn pop_root(&mut self, obj: ObjRef) {
        self.temp_roots.pop(obj);
    }

    /// Run a full collection now
    pub fn collect_garbage(&mut self) {
        let bytes_before = self.heap.bytes_allocated();
        let started = self.gc.begin();

        for class in self.core.all() {
            self.gc.mark_object(&mut self.heap, class);
        }
        for module in self.modules.values() {
            self.gc.mark_object(&mut self.heap, *module);
        }
        self.gc.mark_object(&mut self.heap, self.core_module);
        for obj in [self.last_module, self.fiber].into_iter().flatten() {
            self.gc.mark_object(&mut self.heap, obj);
        }
        if let Some(api) = self.api_stack {
            self.gc.mark_object(&mut self.heap, api.fiber);
        }
        for fiber in &self.suspended_fibers {
            self.gc.mark_object(&mut self.heap, *fiber);
        }
        for value in self.handles.iter() {
            self.gc.mark_value(&mut self.heap, value);
        }
        for root in self.temp_roots.iter() {
            self.gc.mark_object(&mut self.heap, root);
        }
        for root in &self.compiler_roots {
            self.gc.mark_object(&mut self.heap, *root);
        }

        self.gc.trace(&mut self.heap);
        let freed = self.gc.sweep(&mut self.heap);
        self.gc.finish(&self.heap, started, freed);

        log::debug!(
            "gc: {} bytes before, {} after",
            bytes_before,
            self.heap.bytes_allocated()
        );
    }

    /// Collector statistics
    pub fn gc_stats(&self) -> &GcStats {
        self.gc.stats()
    }

    /// Estimated bytes currently allocated
    pub fn bytes_allocated(&self) -> usize {
        self.heap.bytes_allocated()
    }

    /// Number of live heap objects
    pub fn object_count(&self) -> usize {
        self.heap.len()
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Class of any value
    pub(crate) fn class_of(&self, value: Value) -> ObjRef {
        if value.is_num() {
            return self.core.num;
        }
        if value.is_bool() {
            return self.core.bool_class;
        }
        let Some(obj) = value.try_obj() else {
            return self.core.null;
        };

        let entry = self.heap.entry(obj);
        if let Some(class) = entry.header.class {
            return class;
        }
        match entry.kind() {
            ObjKind::Closure => self.core.fn_class,
            ObjKind::Fiber => self.core.fiber,
            ObjKind::List => self.core.list,
            ObjKind::Map => self.core.map,
            ObjKind::Range => self.core.range,
            ObjKind::String => self.core.string,
            _ => self.core.object,
        }
    }

    /// Whether `class` is `ancestor` or inherits from it
    pub(crate) fn is_subclass(&self, class: ObjRef, ancestor: ObjRef) -> bool {
        let mut current = Some(class);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = self.heap.class(class).superclass;
        }
        false
    }

    // ========================================================================
    // Host hooks
    // ========================================================================

    /// Pass an error to the host's error hook, if any
    pub(crate) fn report_error(&mut self, kind: ErrorKind, module: Option<&str>, line: i32, message: &str) {
        if let Some(hook) = self.options.error.as_mut() {
            hook(kind, module, line, message);
        }
    }

    /// Pass text to the host's write hook, if any
    pub(crate) fn write(&mut self, text: &str) {
        if let Some(hook) = self.options.write.as_mut() {
            hook(text);
        }
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        // Foreign objects still alive get their finalizers run.
        let finalizers: Vec<(ObjRef, object::FinalizerFn)> = self
            .heap
            .iter()
            .filter(|(_, entry)| entry.kind() == ObjKind::Foreign)
            .filter_map(|(obj, entry)| {
                let class = entry.header.class?;
                let finalize = self.heap.class(class).foreign?.finalize?;
                Some((obj, finalize))
            })
            .collect();

        for (obj, finalize) in finalizers {
            finalize(&mut self.heap.foreign_mut(obj).data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_classes_are_defined() {
        let vm = Vm::new(VmOptions::default());
        let core = vm.core;

        assert_eq!(vm.heap.class_name(core.object), "Object");
        assert_eq!(vm.heap.class_name(core.num), "Num");
        assert_eq!(vm.heap.class_name(core.string), "String");
        assert_eq!(vm.heap.class(core.class).superclass, Some(core.object));
    }

    #[test]
    fn test_class_of_values() {
        let mut vm = Vm::new(VmOptions::default());
        let core = vm.core;

        assert_eq!(vm.class_of(Value::num(1.0)), core.num);
        assert_eq!(vm.class_of(Value::TRUE), core.bool_class);
        assert_eq!(vm.class_of(Value::NULL), core.null);

        let text = vm.string_value("hi");
        assert_eq!(vm.class_of(text), core.string);

        // A class's class is its metaclass, whose class is Class.
        let metaclass = vm.class_of(Value::from(core.list));
        assert_eq!(vm.heap.class_name(metaclass), "List metaclass");
        assert_eq!(vm.class_of(Value::from(metaclass)), core.class);
    }

    #[test]
    fn test_modules_import_core_variables() {
        let mut vm = Vm::new(VmOptions::default());
        assert!(!vm.has_module("main"));

        vm.module_or_new("main");
        assert!(vm.has_module("main"));
        assert!(vm.has_variable("main", "System"));
        assert!(vm.get_variable("main", "Nope").is_none());
    }

    #[test]
    fn test_collect_keeps_core_alive() {
        let mut vm = Vm::new(VmOptions::default());
        vm.collect_garbage();
        let live = vm.object_count();

        vm.string_value("garbage");
        vm.collect_garbage();
        assert_eq!(vm.object_count(), live);
        assert!(vm.gc_stats().collections >= 2);
    }
}
