//! Object model
//!
//! Every heap object is one variant of [`Obj`]. Objects are addressed by
//! [`ObjRef`], an index into the VM's heap arena, so references stay valid
//! for as long as the object is reachable no matter how the arena grows.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use crate::vm::fiber::ObjFiber;
use crate::vm::interpreter::PrimitiveResult;
use crate::vm::map::ObjMap;
use crate::vm::symbol::SymbolTable;
use crate::vm::value::Value;
use crate::vm::Vm;

/// Reference to a heap object (arena index)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(u32);

impl ObjRef {
    #[inline]
    pub(crate) fn from_index(index: u32) -> Self {
        ObjRef(index)
    }

    /// Arena slot of this object
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type tag of a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    /// Class or metaclass
    Class,
    /// Function plus captured upvalues
    Closure,
    /// Coroutine
    Fiber,
    /// Compiled function prototype
    Fn,
    /// Host-owned byte payload
    Foreign,
    /// Instance of a script class
    Instance,
    /// Growable array
    List,
    /// Hash table
    Map,
    /// Module
    Module,
    /// Numeric range
    Range,
    /// Immutable byte string
    String,
    /// Captured variable
    Upvalue,
}

/// A primitive method implemented in Rust.
///
/// `args[0]` is the receiver; the remaining entries are the arguments. The
/// slice is a copy, so the primitive may allocate freely: the originals stay
/// rooted on the fiber's stack until the call completes.
pub type Primitive = fn(&mut Vm, &[Value]) -> PrimitiveResult;

/// A host function bound to a `foreign` method. Reads its arguments and
/// writes its result through the slot API.
pub type ForeignMethodFn = fn(&mut Vm);

/// Runs just before a foreign object's memory is released.
pub type FinalizerFn = fn(&mut [u8]);

/// Allocation hooks for a foreign class
#[derive(Clone, Copy)]
pub struct ForeignClassMethods {
    /// Called for every construction; must fill slot 0 with a new foreign object
    pub allocate: ForeignMethodFn,
    /// Called when an instance is collected
    pub finalize: Option<FinalizerFn>,
}

impl fmt::Debug for ForeignClassMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignClassMethods")
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}

/// One cell of a class's method table
#[derive(Clone, Copy, Default)]
pub enum Method {
    /// No method for this symbol
    #[default]
    None,
    /// Built-in method
    Primitive(Primitive),
    /// `Fn.call(...)`: invoke the receiver closure directly
    FunctionCall,
    /// Host-bound foreign method
    Foreign(ForeignMethodFn),
    /// Method compiled from source (a closure)
    Block(ObjRef),
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::None => write!(f, "None"),
            Method::Primitive(_) => write!(f, "Primitive"),
            Method::FunctionCall => write!(f, "FunctionCall"),
            Method::Foreign(_) => write!(f, "Foreign"),
            Method::Block(closure) => write!(f, "Block({:?})", closure),
        }
    }
}

// ============================================================================
// Strings
// ============================================================================

/// Immutable byte string with a cached FNV-1a hash.
///
/// Contents are usually UTF-8 but need not be: `String.fromByte` and byte
/// subscripts can produce arbitrary bytes.
#[derive(Debug, Clone)]
pub struct ObjString {
    bytes: Box<[u8]>,
    hash: u32,
}

impl ObjString {
    /// Create a string, computing its hash
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        let bytes = bytes.into();
        let hash = fnv1a(&bytes);
        Self { bytes, hash }
    }

    /// Raw bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Contents as text, replacing invalid UTF-8
    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Cached hash
    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the string has no bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 32-bit FNV-1a
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

// ============================================================================
// Containers
// ============================================================================

/// Growable array of values
#[derive(Debug, Clone, Default)]
pub struct ObjList {
    /// Elements in order
    pub elements: Vec<Value>,
}

/// Immutable numeric range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjRange {
    /// Start value
    pub from: f64,
    /// End value
    pub to: f64,
    /// Whether `to` is part of the range (`..` vs `...`)
    pub is_inclusive: bool,
}

// ============================================================================
// Modules and classes
// ============================================================================

/// A loaded module: its top-level variables and their names
#[derive(Debug, Clone, Default)]
pub struct ObjModule {
    /// Module name. `None` for the core module.
    pub name: Option<ObjRef>,

    /// Values of top-level variables, parallel to `variable_names`
    pub variables: Vec<Value>,

    /// Names of top-level variables
    pub variable_names: SymbolTable,
}

/// A class or metaclass
#[derive(Debug, Clone)]
pub struct ObjClass {
    /// Name string
    pub name: ObjRef,

    /// Superclass, `None` only for `Object`
    pub superclass: Option<ObjRef>,

    /// Number of instance fields including inherited ones
    pub num_fields: usize,

    /// Whether instances are host-owned byte buffers
    pub is_foreign: bool,

    /// Method table indexed by global method symbol
    pub methods: Vec<Method>,

    /// Runtime-visible attributes (`ClassAttributes` instance or null)
    pub attributes: Value,

    /// Allocation hooks for foreign classes
    pub foreign: Option<ForeignClassMethods>,
}

impl ObjClass {
    /// Create a class with no methods and no superclass
    pub fn new(name: ObjRef, num_fields: usize, is_foreign: bool) -> Self {
        Self {
            name,
            superclass: None,
            num_fields,
            is_foreign,
            methods: Vec::new(),
            attributes: Value::NULL,
            foreign: None,
        }
    }

    /// Look up the method bound to `symbol`
    #[inline]
    pub fn method(&self, symbol: usize) -> Method {
        self.methods.get(symbol).copied().unwrap_or(Method::None)
    }

    /// Bind `method` to `symbol`, growing the table as needed
    pub fn bind_method(&mut self, symbol: usize, method: Method) {
        if symbol >= self.methods.len() {
            self.methods.resize(symbol + 1, Method::None);
        }
        self.methods[symbol] = method;
    }
}

// ============================================================================
// Functions and closures
// ============================================================================

/// Debug information for a function
#[derive(Debug, Clone, Default)]
pub struct FnDebug {
    /// Name shown in stack traces
    pub name: String,

    /// Source line of each bytecode byte
    pub source_lines: Vec<u32>,
}

/// A compiled function prototype
#[derive(Debug, Clone)]
pub struct ObjFn {
    /// Bytecode. Shared with running call frames.
    pub code: Rc<[u8]>,

    /// Constant pool
    pub constants: Vec<Value>,

    /// Module whose variables this function reads and writes
    pub module: ObjRef,

    /// Most stack slots the function needs at once, receiver included
    pub max_slots: usize,

    /// Number of upvalues captured by closures of this function
    pub num_upvalues: usize,

    /// Number of declared parameters
    pub arity: usize,

    /// Name and line table
    pub debug: FnDebug,
}

impl ObjFn {
    /// Source line for the instruction that starts at or covers `ip`
    pub fn line_at(&self, ip: usize) -> Option<u32> {
        self.debug.source_lines.get(ip).copied()
    }
}

/// A function together with its captured upvalues. The only callable object.
#[derive(Debug, Clone)]
pub struct ObjClosure {
    /// Function prototype
    pub function: ObjRef,

    /// Captured upvalues, in the order the function declares them
    pub upvalues: Vec<ObjRef>,

    /// Class this closure was bound into as a method, inherited by closures
    /// created while it runs. Field offsets and `super` resolve against it.
    pub owner: Option<ObjRef>,
}

/// Where an upvalue's variable currently lives
#[derive(Debug, Clone, Copy)]
pub enum UpvalueState {
    /// Still on a fiber's stack
    Open {
        /// Fiber owning the stack
        fiber: ObjRef,
        /// Absolute slot index
        slot: usize,
    },
    /// Hoisted into the upvalue itself
    Closed(Value),
}

/// A variable captured by a closure
#[derive(Debug, Clone, Copy)]
pub struct ObjUpvalue {
    /// Open or closed storage
    pub state: UpvalueState,

    /// Next open upvalue on the same fiber (lower slot)
    pub next: Option<ObjRef>,
}

impl ObjUpvalue {
    /// Stack slot if the upvalue is still open
    #[inline]
    pub fn open_slot(&self) -> Option<usize> {
        match self.state {
            UpvalueState::Open { slot, .. } => Some(slot),
            UpvalueState::Closed(_) => None,
        }
    }
}

// ============================================================================
// Instances
// ============================================================================

/// Host-owned payload of a foreign class instance
#[derive(Debug, Clone)]
pub struct ObjForeign {
    /// Raw bytes managed by host code
    pub data: Box<[u8]>,
}

/// Instance of a script-defined class
#[derive(Debug, Clone)]
pub struct ObjInstance {
    /// Field values, sized by the class's field count
    pub fields: Box<[Value]>,
}

// ============================================================================
// The object enum
// ============================================================================

/// A heap object
#[derive(Debug)]
pub enum Obj {
    /// See [`ObjClass`]
    Class(ObjClass),
    /// See [`ObjClosure`]
    Closure(ObjClosure),
    /// See [`ObjFiber`]
    Fiber(ObjFiber),
    /// See [`ObjFn`]
    Fn(ObjFn),
    /// See [`ObjForeign`]
    Foreign(ObjForeign),
    /// See [`ObjInstance`]
    Instance(ObjInstance),
    /// See [`ObjList`]
    List(ObjList),
    /// See [`ObjMap`]
    Map(ObjMap),
    /// See [`ObjModule`]
    Module(ObjModule),
    /// See [`ObjRange`]
    Range(ObjRange),
    /// See [`ObjString`]
    String(ObjString),
    /// See [`ObjUpvalue`]
    Upvalue(ObjUpvalue),
}

impl Obj {
    /// Type tag
    pub fn kind(&self) -> ObjKind {
        match self {
            Obj::Class(_) => ObjKind::Class,
            Obj::Closure(_) => ObjKind::Closure,
            Obj::Fiber(_) => ObjKind::Fiber,
            Obj::Fn(_) => ObjKind::Fn,
            Obj::Foreign(_) => ObjKind::Foreign,
            Obj::Instance(_) => ObjKind::Instance,
            Obj::List(_) => ObjKind::List,
            Obj::Map(_) => ObjKind::Map,
            Obj::Module(_) => ObjKind::Module,
            Obj::Range(_) => ObjKind::Range,
            Obj::String(_) => ObjKind::String,
            Obj::Upvalue(_) => ObjKind::Upvalue,
        }
    }

    /// Approximate bytes owned by this object, used for GC pacing
    pub fn size_in_bytes(&self) -> usize {
        use std::mem::size_of;

        let payload = match self {
            Obj::Class(c) => c.methods.capacity() * size_of::<Method>(),
            Obj::Closure(c) => c.upvalues.capacity() * size_of::<ObjRef>(),
            Obj::Fiber(f) => {
                f.stack.capacity() * size_of::<Value>()
                    + f.frames.capacity() * size_of::<crate::vm::fiber::CallFrame>()
            }
            Obj::Fn(f) => {
                f.code.len()
                    + f.constants.capacity() * size_of::<Value>()
                    + f.debug.source_lines.capacity() * size_of::<u32>()
                    + f.debug.name.capacity()
            }
            Obj::Foreign(f) => f.data.len(),
            Obj::Instance(i) => i.fields.len() * size_of::<Value>(),
            Obj::List(l) => l.elements.capacity() * size_of::<Value>(),
            Obj::Map(m) => m.capacity() * size_of::<crate::vm::map::MapEntry>(),
            Obj::Module(m) => m.variables.capacity() * size_of::<Value>() + m.variable_names.len() * 16,
            Obj::Range(_) | Obj::Upvalue(_) => 0,
            Obj::String(s) => s.len(),
        };
        size_of::<Obj>() + payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(b""), 2_166_136_261);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(ObjString::new(&b"foobar"[..]).hash(), 0xbf9c_f968);
    }

    #[test]
    fn test_class_method_table_grows() {
        let mut class = ObjClass::new(ObjRef::from_index(0), 0, false);
        assert!(matches!(class.method(10), Method::None));

        class.bind_method(10, Method::FunctionCall);
        assert_eq!(class.methods.len(), 11);
        assert!(matches!(class.method(10), Method::FunctionCall));
        assert!(matches!(class.method(3), Method::None));
    }
}
