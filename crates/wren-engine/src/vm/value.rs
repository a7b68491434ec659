//! NaN-tagged value representation
//!
//! Every Wren value fits in 64 bits. Doubles are stored as themselves; all
//! other values live inside the quiet-NaN space that arithmetic never
//! produces once NaNs are canonicalised:
//!
//! ```text
//!  63  62..52 (exp)  51 50  49..32        31..0
//! ┌──┬────────────┬──┬──┬────────────┬──────────────┐
//! │ S│ 11111111111│ 1│ 1│ 0 ........ │ tag / index  │
//! └──┴────────────┴──┴──┴────────────┴──────────────┘
//!   S = 1  -> heap object, low 32 bits are the arena index
//!   S = 0  -> singleton, low 3 bits are the tag
//! ```

use std::fmt;

use super::object::ObjRef;

const SIGN_BIT: u64 = 1 << 63;
const QNAN: u64 = 0x7ffc_0000_0000_0000;

const TAG_NAN: u64 = 0;
const TAG_NULL: u64 = 1;
const TAG_FALSE: u64 = 2;
const TAG_TRUE: u64 = 3;
const TAG_UNDEFINED: u64 = 4;

const OBJ_MASK: u64 = SIGN_BIT | QNAN;

/// A dynamically typed Wren value.
///
/// `PartialEq` compares bit patterns, i.e. identity. Language-level equality
/// (strings and ranges by content) lives in [`Heap::values_equal`].
///
/// [`Heap::values_equal`]: crate::vm::gc::Heap::values_equal
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(u64);

impl Value {
    /// `null`
    pub const NULL: Value = Value(QNAN | TAG_NULL);
    /// `false`
    pub const FALSE: Value = Value(QNAN | TAG_FALSE);
    /// `true`
    pub const TRUE: Value = Value(QNAN | TAG_TRUE);
    /// Internal sentinel marking empty map slots. Never visible to scripts.
    pub const UNDEFINED: Value = Value(QNAN | TAG_UNDEFINED);

    /// Wrap a double. NaNs are canonicalised so they stay out of the tag space.
    #[inline]
    pub fn num(n: f64) -> Self {
        if n.is_nan() {
            Value(f64::NAN.to_bits())
        } else {
            Value(n.to_bits())
        }
    }

    /// Wrap a boolean
    #[inline]
    pub fn bool(b: bool) -> Self {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    /// Raw bit pattern
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Is this a double?
    #[inline]
    pub fn is_num(self) -> bool {
        (self.0 & QNAN) != QNAN
    }

    /// Is this a heap object reference?
    #[inline]
    pub fn is_obj(self) -> bool {
        (self.0 & OBJ_MASK) == OBJ_MASK
    }

    /// Is this `null`?
    #[inline]
    pub fn is_null(self) -> bool {
        self == Value::NULL
    }

    /// Is this `true` or `false`?
    #[inline]
    pub fn is_bool(self) -> bool {
        self == Value::TRUE || self == Value::FALSE
    }

    /// Is this the internal undefined sentinel?
    #[inline]
    pub fn is_undefined(self) -> bool {
        self == Value::UNDEFINED
    }

    /// Only `false` and `null` are falsy
    #[inline]
    pub fn is_falsy(self) -> bool {
        self == Value::FALSE || self == Value::NULL
    }

    /// The double inside. Caller must have checked [`is_num`](Self::is_num).
    #[inline]
    pub fn as_num(self) -> f64 {
        debug_assert!(self.is_num(), "value is not a number");
        f64::from_bits(self.0)
    }

    /// The boolean inside. Caller must have checked [`is_bool`](Self::is_bool).
    #[inline]
    pub fn as_bool(self) -> bool {
        self == Value::TRUE
    }

    /// The object reference inside. Caller must have checked [`is_obj`](Self::is_obj).
    #[inline]
    pub fn as_obj(self) -> ObjRef {
        debug_assert!(self.is_obj(), "value is not an object");
        ObjRef::from_index((self.0 & !OBJ_MASK) as u32)
    }

    /// The double inside, if any
    #[inline]
    pub fn try_num(self) -> Option<f64> {
        if self.is_num() {
            Some(self.as_num())
        } else {
            None
        }
    }

    /// The object reference inside, if any
    #[inline]
    pub fn try_obj(self) -> Option<ObjRef> {
        if self.is_obj() {
            Some(self.as_obj())
        } else {
            None
        }
    }

    /// Identity comparison
    #[inline]
    pub fn same(a: Value, b: Value) -> bool {
        a.0 == b.0
    }
}

impl From<ObjRef> for Value {
    #[inline]
    fn from(obj: ObjRef) -> Self {
        Value(OBJ_MASK | obj.index() as u64)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(n: f64) -> Self {
        Value::num(n)
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::NULL
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_num() {
            write!(f, "Num({})", self.as_num())
        } else if self.is_obj() {
            write!(f, "Obj(#{})", self.as_obj().index())
        } else {
            match self.0 & 7 {
                TAG_NAN => write!(f, "NaN"),
                TAG_NULL => write!(f, "Null"),
                TAG_FALSE => write!(f, "False"),
                TAG_TRUE => write!(f, "True"),
                TAG_UNDEFINED => write!(f, "Undefined"),
                tag => write!(f, "Invalid(tag {})", tag),
            }
        }
    }
}
