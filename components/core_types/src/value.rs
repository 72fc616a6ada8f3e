//! NaN-boxed value representation.
//!
//! A [`Value`] packs nil, booleans, IEEE-754 doubles and heap references into
//! a single `u64`. Any bit pattern that is not a quiet NaN with the reserved
//! tag bits set is a plain double. Quiet NaNs carry either a small singleton
//! tag (nil/false/true) or, with the sign bit set, an [`ObjRef`] payload in
//! the low 48 bits.
//!
//! Callers that want to branch on the kind of a value should use
//! [`Value::kind`], which returns the [`ValueKind`] sum type.

use std::fmt;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;
const QNAN: u64 = 0x7ffc_0000_0000_0000;
const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;
const PAYLOAD_MASK: u64 = 0x0000_ffff_ffff_ffff;

const TAG_NIL: u64 = 1;
const TAG_FALSE: u64 = 2;
const TAG_TRUE: u64 = 3;

/// Handle to a heap object.
///
/// An `ObjRef` is an arena index plus the generation of the slot at the time
/// the object was allocated. The heap bumps a slot's generation when it frees
/// the object, so a handle that outlived its object is detectable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    index: u32,
    generation: u16,
}

impl ObjRef {
    /// Creates a handle from an arena slot index and generation.
    pub const fn new(index: u32, generation: u16) -> Self {
        Self { index, generation }
    }

    /// Arena slot index.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when the handle was issued.
    pub fn generation(self) -> u16 {
        self.generation
    }

    fn to_payload(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    fn from_payload(payload: u64) -> Self {
        Self {
            index: payload as u32,
            generation: (payload >> 32) as u16,
        }
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Sum-type view of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    /// The absence of a value
    Nil,
    /// A boolean
    Bool(bool),
    /// A double-precision number
    Number(f64),
    /// A reference to a heap object
    Object(ObjRef),
}

/// The interpreter's universal tagged scalar.
///
/// # Examples
///
/// ```
/// use core_types::{Value, ValueKind};
///
/// let v = Value::number(1.5);
/// assert!(v.is_number());
/// assert_eq!(v.kind(), ValueKind::Number(1.5));
/// assert!(Value::NIL.is_falsey());
/// assert!(!Value::number(0.0).is_falsey());
/// ```
#[derive(Clone, Copy)]
pub struct Value(u64);

impl Value {
    /// The nil singleton.
    pub const NIL: Value = Value(QNAN | TAG_NIL);
    /// Boolean `true`.
    pub const TRUE: Value = Value(QNAN | TAG_TRUE);
    /// Boolean `false`.
    pub const FALSE: Value = Value(QNAN | TAG_FALSE);

    /// Boxes a number. Every NaN is stored as the canonical quiet NaN so it
    /// can never alias a tagged pattern.
    pub fn number(n: f64) -> Value {
        if n.is_nan() {
            Value(CANONICAL_NAN)
        } else {
            Value(n.to_bits())
        }
    }

    /// Boxes a boolean.
    pub fn bool(b: bool) -> Value {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    /// Boxes an object reference.
    pub fn object(obj: ObjRef) -> Value {
        Value(SIGN_BIT | QNAN | obj.to_payload())
    }

    /// Returns `true` for nil.
    pub fn is_nil(self) -> bool {
        self.0 == Value::NIL.0
    }

    /// Returns `true` for either boolean.
    pub fn is_bool(self) -> bool {
        (self.0 | 1) == Value::TRUE.0
    }

    /// Returns `true` for numbers, including the canonical NaN.
    pub fn is_number(self) -> bool {
        (self.0 & QNAN) != QNAN
    }

    /// Returns `true` for object references.
    pub fn is_object(self) -> bool {
        (self.0 & (QNAN | SIGN_BIT)) == (QNAN | SIGN_BIT)
    }

    /// Only `nil` and `false` are falsey.
    pub fn is_falsey(self) -> bool {
        self.is_nil() || self.0 == Value::FALSE.0
    }

    /// Unboxes a number.
    pub fn as_number(self) -> Option<f64> {
        if self.is_number() {
            Some(f64::from_bits(self.0))
        } else {
            None
        }
    }

    /// Unboxes a boolean.
    pub fn as_bool(self) -> Option<bool> {
        if self.is_bool() {
            Some(self.0 == Value::TRUE.0)
        } else {
            None
        }
    }

    /// Unboxes an object reference.
    pub fn as_object(self) -> Option<ObjRef> {
        if self.is_object() {
            Some(ObjRef::from_payload(self.0 & PAYLOAD_MASK))
        } else {
            None
        }
    }

    /// Decodes the value into its [`ValueKind`].
    pub fn kind(self) -> ValueKind {
        if let Some(n) = self.as_number() {
            ValueKind::Number(n)
        } else if let Some(obj) = self.as_object() {
            ValueKind::Object(obj)
        } else if let Some(b) = self.as_bool() {
            ValueKind::Bool(b)
        } else {
            ValueKind::Nil
        }
    }

    /// Raw boxed bits.
    pub fn to_bits(self) -> u64 {
        self.0
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::NIL
    }
}

/// Numbers compare numerically (so `NaN != NaN` and `0 == -0`); every other
/// value compares by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self.0 == other.0,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::object(obj)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ValueKind::Nil => write!(f, "nil"),
            ValueKind::Bool(b) => write!(f, "{}", b),
            ValueKind::Number(n) => write!(f, "{}", crate::format_number(n)),
            ValueKind::Object(obj) => write!(f, "<obj {:?}>", obj),
        }
    }
}
